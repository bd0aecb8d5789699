#![forbid(unsafe_code)]

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;

use crate::fanout::FanoutItem;
use crate::notifications::NotificationEvent;
use crate::state::AppState;

use super::errors::ApiResult;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 128;

pub async fn ws_endpoint(req: HttpRequest, stream: web::Payload, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
	let rx = state.notifications.subscribe(SUBSCRIBER_QUEUE_CAPACITY).await;
	let resp = ws::start(NotificationPushActor { rx: Some(rx) }, &req, stream)
		.map_err(|e| super::errors::ApiError(streaming_domain::StreamingError::Internal(e.to_string())))?;
	Ok(resp)
}

struct NotificationPushActor {
	rx: Option<tokio::sync::mpsc::Receiver<FanoutItem<NotificationEvent>>>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Push(String);

impl Actor for NotificationPushActor {
	type Context = ws::WebsocketContext<Self>;

	fn started(&mut self, ctx: &mut Self::Context) {
		let mut rx = self.rx.take().expect("receiver set once at construction");
		let addr = ctx.address();
		actix::spawn(async move {
			while let Some(item) = rx.recv().await {
				let body = match &item {
					FanoutItem::Item(event) => serde_json::to_string(event),
					FanoutItem::Lagged { dropped } => serde_json::to_string(&serde_json::json!({"kind": "lagged", "dropped": dropped})),
				};
				if let Ok(body) = body {
					addr.do_send(Push(body));
				}
			}
		});
	}
}

impl Handler<Push> for NotificationPushActor {
	type Result = ();

	fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
		ctx.text(msg.0);
	}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for NotificationPushActor {
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
