#![forbid(unsafe_code)]

use std::time::Duration;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use streaming_domain::{Identity, RoomId, StreamingError};

use crate::credential::StreamKeyPermissions;
use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

fn identity(s: &str, field: &str) -> ApiResult<Identity> {
	Identity::new(s).map_err(|_| ApiError(StreamingError::InvalidArgument(field.to_string())))
}

fn room_id(s: &str) -> ApiResult<RoomId> {
	RoomId::new(s).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))
}

#[derive(Deserialize)]
pub struct TokenBody {
	room_name: String,
	identity: String,
	is_publisher: bool,
}

pub async fn token(state: web::Data<AppState>, body: web::Json<TokenBody>) -> ApiResult<HttpResponse> {
	let room = room_id(&body.room_name)?;
	let identity = identity(&body.identity, "identity")?;
	let grant = state.credential.issue_grant(&room, &identity, body.is_publisher);
	Ok(HttpResponse::Ok().json(serde_json::json!({
		"token": grant.token,
		"url": grant.media_plane_url,
		"can_publish": grant.capabilities.publish,
		"can_subscribe": grant.capabilities.subscribe,
		"expires_at": grant.expires_at_unix,
	})))
}

#[derive(Deserialize)]
pub struct GenerateKeyBody {
	streamer_id: String,
	room_name: String,
	#[serde(default)]
	expires_in: Option<u64>,
	#[serde(default)]
	permissions: Option<StreamKeyPermissions>,
}

pub async fn generate_key(state: web::Data<AppState>, body: web::Json<GenerateKeyBody>) -> ApiResult<HttpResponse> {
	let owner = identity(&body.streamer_id, "streamer_id")?;
	let room = room_id(&body.room_name)?;
	let ttl = body.expires_in.map(Duration::from_secs);
	let key = state.credential.generate_key(owner, room, body.permissions, ttl).await;
	Ok(HttpResponse::Ok().json(key))
}

#[derive(Deserialize)]
pub struct KeyBody {
	key: String,
}

pub async fn validate_key(state: web::Data<AppState>, body: web::Json<KeyBody>) -> ApiResult<HttpResponse> {
	let key = state.credential.validate_key(&body.key).await?;
	state.credential.mark_used(&body.key).await?;
	Ok(HttpResponse::Ok().json(serde_json::json!({"valid": true, "key": key})))
}

pub async fn revoke_key(state: web::Data<AppState>, body: web::Json<KeyBody>) -> ApiResult<HttpResponse> {
	state.credential.revoke_key(&body.key).await?;
	Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct ListKeysQuery {
	streamer_id: String,
}

pub async fn list_keys(state: web::Data<AppState>, query: web::Query<ListKeysQuery>) -> ApiResult<HttpResponse> {
	let owner = identity(&query.streamer_id, "streamer_id")?;
	Ok(HttpResponse::Ok().json(state.credential.list_keys(&owner).await))
}
