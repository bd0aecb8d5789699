#![forbid(unsafe_code)]

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use streaming_domain::{Identity, PlaybackSessionId, RecordingId, RoomId, StreamingError};

use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

fn identity(s: &str, field: &str) -> ApiResult<Identity> {
	Identity::new(s).map_err(|_| ApiError(StreamingError::InvalidArgument(field.to_string())))
}

#[derive(Deserialize)]
pub struct StartBody {
	room_name: String,
	streamer_id: String,
	streamer_name: String,
	title: String,
}

pub async fn start(state: web::Data<AppState>, body: web::Json<StartBody>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&body.room_name).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))?;
	let streamer = identity(&body.streamer_id, "streamer_id")?;
	let record = state.recording.start(room, streamer, body.streamer_name.clone(), body.title.clone()).await?;
	Ok(HttpResponse::Ok().json(record))
}

#[derive(Deserialize)]
pub struct StopBody {
	recording_id: uuid::Uuid,
	#[serde(default)]
	egress_id: Option<String>,
	#[serde(default)]
	duration_secs: Option<u64>,
	#[serde(default)]
	file_size_bytes: Option<u64>,
}

pub async fn stop(state: web::Data<AppState>, body: web::Json<StopBody>) -> ApiResult<HttpResponse> {
	let _ = &body.egress_id;
	let id = RecordingId(body.recording_id);
	let record = state.recording.stop(id, body.duration_secs, body.file_size_bytes).await?;
	Ok(HttpResponse::Ok().json(record))
}

#[derive(Deserialize)]
pub struct ListQuery {
	streamer_id: String,
	#[serde(default)]
	limit: Option<usize>,
	#[serde(default)]
	offset: Option<usize>,
}

pub async fn list(state: web::Data<AppState>, query: web::Query<ListQuery>) -> ApiResult<HttpResponse> {
	let limit = query.limit.unwrap_or(50);
	let offset = query.offset.unwrap_or(0);
	if query.streamer_id == "ALL" {
		return Ok(HttpResponse::Ok().json(state.recording.list_all(limit, offset).await));
	}
	let owner = identity(&query.streamer_id, "streamer_id")?;
	Ok(HttpResponse::Ok().json(state.recording.list_by_streamer(&owner, limit, offset).await))
}

pub async fn publish(state: web::Data<AppState>, path: web::Path<uuid::Uuid>) -> ApiResult<HttpResponse> {
	let record = state.recording.publish(RecordingId(path.into_inner())).await?;
	Ok(HttpResponse::Ok().json(record))
}

#[derive(Deserialize)]
pub struct PlaybackStartBody {
	recording_id: uuid::Uuid,
	user_id: String,
	#[serde(default = "default_quality")]
	quality: String,
}

fn default_quality() -> String {
	"source".to_string()
}

pub async fn playback_start(state: web::Data<AppState>, body: web::Json<PlaybackStartBody>) -> ApiResult<HttpResponse> {
	let user = identity(&body.user_id, "user_id")?;
	let session = state.playback.start(RecordingId(body.recording_id), user, body.quality.clone()).await?;
	Ok(HttpResponse::Ok().json(session))
}

#[derive(Deserialize)]
pub struct PlaybackHeartbeatBody {
	session_id: uuid::Uuid,
	position_secs: f64,
}

pub async fn playback_heartbeat(state: web::Data<AppState>, body: web::Json<PlaybackHeartbeatBody>) -> ApiResult<HttpResponse> {
	let session = state.playback.heartbeat(PlaybackSessionId(body.session_id), body.position_secs).await?;
	Ok(HttpResponse::Ok().json(session))
}

#[derive(Deserialize)]
pub struct PlaybackEndBody {
	session_id: uuid::Uuid,
}

pub async fn playback_end(state: web::Data<AppState>, body: web::Json<PlaybackEndBody>) -> ApiResult<HttpResponse> {
	state.playback.end(PlaybackSessionId(body.session_id)).await?;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}
