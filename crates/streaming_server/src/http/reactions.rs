#![forbid(unsafe_code)]

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use streaming_domain::{Identity, RoomId, StreamingError};

use crate::fanout::FanoutItem;
use crate::reactions::ReactionEvent;
use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct SendBody {
	room_name: String,
	user_id: String,
	user_name: String,
	reaction_type: String,
	#[serde(default)]
	x: Option<f64>,
	#[serde(default)]
	y: Option<f64>,
}

fn room_id(s: &str) -> ApiResult<RoomId> {
	RoomId::new(s).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))
}

fn identity(s: &str, field: &str) -> ApiResult<Identity> {
	Identity::new(s).map_err(|_| ApiError(StreamingError::InvalidArgument(field.to_string())))
}

pub async fn send(state: web::Data<AppState>, body: web::Json<SendBody>) -> ApiResult<HttpResponse> {
	let room = room_id(&body.room_name)?;
	let sender = identity(&body.user_id, "user_id")?;
	let reaction = state.reactions.send(&room, &sender, body.user_name.clone(), body.reaction_type.clone(), body.x, body.y).await?;
	Ok(HttpResponse::Ok().json(reaction))
}

#[derive(Deserialize)]
pub struct RoomQuery {
	room_name: String,
}

pub async fn stats(state: web::Data<AppState>, query: web::Query<RoomQuery>) -> ApiResult<HttpResponse> {
	let room = room_id(&query.room_name)?;
	Ok(HttpResponse::Ok().json(state.reactions.stats(&room).await?))
}

pub async fn recent(state: web::Data<AppState>, query: web::Query<RoomQuery>) -> ApiResult<HttpResponse> {
	let room = room_id(&query.room_name)?;
	Ok(HttpResponse::Ok().json(state.reactions.recent(&room, 50).await?))
}

#[derive(Deserialize)]
pub struct WsQuery {
	room_name: String,
	#[allow(dead_code)]
	identity: String,
}

pub async fn ws_endpoint(req: HttpRequest, stream: web::Payload, state: web::Data<AppState>, query: web::Query<WsQuery>) -> ApiResult<HttpResponse> {
	let room = room_id(&query.room_name)?;
	let rx = state.reactions.subscribe(&room).await;
	let resp = ws::start(ReactionPushActor { rx: Some(rx) }, &req, stream).map_err(|e| ApiError(StreamingError::Internal(e.to_string())))?;
	Ok(resp)
}

struct ReactionPushActor {
	rx: Option<tokio::sync::mpsc::Receiver<FanoutItem<ReactionEvent>>>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Push(String);

#[derive(Serialize)]
#[serde(tag = "type")]
enum WsEnvelope<'a> {
	#[serde(rename = "reaction")]
	Reaction { reaction: &'a crate::reactions::Reaction },
	#[serde(rename = "lagged")]
	Lagged { dropped: u64 },
}

impl Actor for ReactionPushActor {
	type Context = ws::WebsocketContext<Self>;

	fn started(&mut self, ctx: &mut Self::Context) {
		let mut rx = self.rx.take().expect("receiver set once at construction");
		let addr = ctx.address();
		actix::spawn(async move {
			while let Some(item) = rx.recv().await {
				let body = match &item {
					FanoutItem::Item(ReactionEvent { reaction }) => serde_json::to_string(&WsEnvelope::Reaction { reaction }),
					FanoutItem::Lagged { dropped } => serde_json::to_string(&WsEnvelope::Lagged { dropped: *dropped }),
				};
				if let Ok(body) = body {
					addr.do_send(Push(body));
				}
			}
		});
	}
}

impl Handler<Push> for ReactionPushActor {
	type Result = ();

	fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
		ctx.text(msg.0);
	}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ReactionPushActor {
	fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
		match msg {
			Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
			Ok(ws::Message::Close(reason)) => {
				ctx.close(reason);
				ctx.stop();
			}
			_ => {}
		}
	}
}
