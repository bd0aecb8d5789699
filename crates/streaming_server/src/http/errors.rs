#![forbid(unsafe_code)]

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use streaming_domain::StreamingError;

/// Wraps a `StreamingError` so it can be returned directly from actix-web
/// handlers via `?`. The public surface is the only layer that maps engine
/// errors to an HTTP status and a `{"error": "..."}` body (spec §7).
#[derive(Debug)]
pub struct ApiError(pub StreamingError);

impl From<StreamingError> for ApiError {
	fn from(e: StreamingError) -> Self {
		ApiError(e)
	}
}

impl std::fmt::Display for ApiError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
	message: String,
}

impl ResponseError for ApiError {
	fn status_code(&self) -> StatusCode {
		match &self.0 {
			StreamingError::NotFound => StatusCode::NOT_FOUND,
			StreamingError::AlreadyExists => StatusCode::CONFLICT,
			StreamingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
			StreamingError::Unauthorized => StatusCode::UNAUTHORIZED,
			StreamingError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
			StreamingError::Conflict(_) => StatusCode::CONFLICT,
			StreamingError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
			StreamingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn error_response(&self) -> HttpResponse {
		HttpResponse::build(self.status_code()).json(ErrorBody { error: self.0.kind_str().to_string(), message: self.0.to_string() })
	}
}

pub type ApiResult<T> = Result<T, ApiError>;
