#![forbid(unsafe_code)]

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use streaming_domain::{RoomId, StreamingError};

use crate::registry::StreamRegistryEntry;
use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

pub async fn list(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
	Ok(HttpResponse::Ok().json(state.registry.list().await))
}

#[derive(Deserialize)]
pub struct RegisterBody {
	room_name: String,
	title: String,
	streamer: String,
	#[serde(default)]
	avatar: String,
	#[serde(default)]
	viewers: u64,
	start_time_unix: u64,
}

pub async fn register(state: web::Data<AppState>, body: web::Json<RegisterBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))?;
	state
		.registry
		.register(StreamRegistryEntry {
			id: room,
			title: body.title.clone(),
			streamer: body.streamer.clone(),
			avatar: body.avatar.clone(),
			viewers: body.viewers,
			start_time_unix: body.start_time_unix,
		})
		.await;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct UnregisterBody {
	room_name: String,
}

pub async fn unregister(state: web::Data<AppState>, body: web::Json<UnregisterBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))?;
	state.registry.unregister(&room).await;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}
