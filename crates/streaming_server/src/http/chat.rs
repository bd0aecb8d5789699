#![forbid(unsafe_code)]

use std::time::Duration;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use streaming_domain::{Identity, RoomId};

use crate::chat::{ChatEvent, MessageKind};
use crate::fanout::FanoutItem;
use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct CreateRoomBody {
	room_name: String,
}

pub async fn create(state: web::Data<AppState>, body: web::Json<CreateRoomBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	// chat room creation is idempotent at the public surface (spec §6, §8).
	match state.chat.create_room(room, None).await {
		Ok(()) | Err(streaming_domain::StreamingError::AlreadyExists) => Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true}))),
		Err(e) => Err(ApiError(e)),
	}
}

#[derive(Deserialize)]
pub struct SendBody {
	room_name: String,
	sender_id: String,
	content: String,
	#[serde(default)]
	message_type: Option<String>,
	#[serde(default)]
	mentioned_users: Vec<String>,
}

pub async fn send(state: web::Data<AppState>, body: web::Json<SendBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	let sender = Identity::new(&body.sender_id).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("sender_id".to_string())))?;
	let mentions: Result<Vec<Identity>, _> = body.mentioned_users.iter().map(|s| Identity::new(s)).collect();
	let mentions = mentions.map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("mentioned_users".to_string())))?;
	let kind = match body.message_type.as_deref() {
		Some("emoji") => MessageKind::Emoji,
		Some("system") => MessageKind::System,
		Some("gift") => MessageKind::Gift,
		Some("join_leave") => MessageKind::JoinLeave,
		_ => MessageKind::Text,
	};

	let message = state.chat.send(&room, &sender, &body.content, kind, mentions, None).await?;
	Ok(HttpResponse::Ok().json(message))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
	room_name: String,
	#[serde(default)]
	before_ts: Option<u64>,
}

pub async fn messages(state: web::Data<AppState>, query: web::Query<MessagesQuery>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&query.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	let messages = state.chat.get(&room, 50, query.before_ts).await?;
	Ok(HttpResponse::Ok().json(messages))
}

#[derive(Deserialize)]
pub struct ModerationBody {
	room_name: String,
	participant_id: String,
	moderator_id: String,
	duration_secs: u64,
}

pub async fn mute(state: web::Data<AppState>, body: web::Json<ModerationBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	let target = Identity::new(&body.participant_id).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("participant_id".to_string())))?;
	let moderator = Identity::new(&body.moderator_id).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("moderator_id".to_string())))?;
	state.chat.mute(&room, &target, &moderator, Duration::from_secs(body.duration_secs)).await?;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}

pub async fn ban(state: web::Data<AppState>, body: web::Json<ModerationBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	let target = Identity::new(&body.participant_id).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("participant_id".to_string())))?;
	let moderator = Identity::new(&body.moderator_id).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("moderator_id".to_string())))?;
	state.chat.ban(&room, &target, &moderator, Duration::from_secs(body.duration_secs)).await?;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct WsQuery {
	room_name: String,
	#[allow(dead_code)]
	identity: String,
}

pub async fn ws_endpoint(req: HttpRequest, stream: web::Payload, state: web::Data<AppState>, query: web::Query<WsQuery>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&query.room_name).map_err(|_| ApiError(streaming_domain::StreamingError::InvalidArgument("room_name".to_string())))?;
	let rx = state.chat.subscribe(&room).await?;
	let resp = ws::start(ChatPushActor { rx: Some(rx) }, &req, stream).map_err(|e| ApiError(streaming_domain::StreamingError::Internal(e.to_string())))?;
	Ok(resp)
}

struct ChatPushActor {
	rx: Option<tokio::sync::mpsc::Receiver<FanoutItem<ChatEvent>>>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Push(String);

#[derive(Serialize)]
#[serde(tag = "type")]
enum WsEnvelope<'a> {
	#[serde(rename = "chat_message")]
	ChatMessage { message: &'a crate::chat::ChatMessage },
	#[serde(rename = "lagged")]
	Lagged { dropped: u64 },
}

impl Actor for ChatPushActor {
	type Context = ws::WebsocketContext<Self>;

	fn started(&mut self, ctx: &mut Self::Context) {
		let mut rx = self.rx.take().expect("receiver set once at construction");
		let addr = ctx.address();
		actix::spawn(async move {
			while let Some(item) = rx.recv().await {
				let body = match &item {
					FanoutItem::Item(ChatEvent { message }) => serde_json::to_string(&WsEnvelope::ChatMessage { message }),
					FanoutItem::Lagged { dropped } => serde_json::to_string(&WsEnvelope::Lagged { dropped: *dropped }),
				};
				if let Ok(body) = body {
					addr.do_send(Push(body));
				}
			}
		});
	}
}

impl Handler<Push> for ChatPushActor {
	type Result = ();

	fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
		ctx.text(msg.0);
	}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatPushActor {
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
