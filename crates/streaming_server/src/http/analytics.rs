#![forbid(unsafe_code)]

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use streaming_domain::{RoomId, StreamingError};

use crate::state::AppState;

use super::errors::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct RoomQuery {
	room_name: String,
}

pub async fn stream_snapshot(state: web::Data<AppState>, query: web::Query<RoomQuery>) -> ApiResult<HttpResponse> {
	let room = RoomId::new(&query.room_name).map_err(|_| ApiError(StreamingError::InvalidArgument("room_name".to_string())))?;
	Ok(HttpResponse::Ok().json(state.analytics.snapshot(&room).await?))
}
