#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
}

/// Opaque room identifier; the unit of multiplexing for every engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
	/// Create a non-empty `RoomId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for RoomId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		RoomId::new(s.to_string())
	}
}

/// Opaque identity naming a user/participant; attested by the Credential
/// Issuer, not authenticated by the core itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for Identity {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Identity::new(s.to_string())
	}
}

/// Server-assigned chat message identifier: the construction pair
/// `(high-resolution timestamp, sender)` from spec §4.B's tie-break rule.
/// The derived `Ord` is monotonically non-decreasing in `ts_nanos`, so a
/// room's message log sorts the way spec §8's invariant requires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChatMessageId {
	pub ts_nanos: u128,
	pub sender: Identity,
}

impl ChatMessageId {
	pub fn new(ts_nanos: u128, sender: Identity) -> Self {
		Self { ts_nanos, sender }
	}
}

impl fmt::Display for ChatMessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.ts_nanos, self.sender)
	}
}

/// Server-assigned reaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionId(pub uuid::Uuid);

impl ReactionId {
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4())
	}
}

impl fmt::Display for ReactionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Server-assigned VOD recording identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub uuid::Uuid);

impl RecordingId {
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4())
	}
}

impl fmt::Display for RecordingId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Server-assigned playback session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackSessionId(pub uuid::Uuid);

impl PlaybackSessionId {
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4())
	}
}

impl fmt::Display for PlaybackSessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Error kinds surfaced by the engines to the public surface (spec §7).
/// Engines return these as values; only the public surface maps them to
/// an HTTP status and serializes the `{"error": "..."}` body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamingError {
	#[error("not found")]
	NotFound,

	#[error("already exists")]
	AlreadyExists,

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("unauthorized")]
	Unauthorized,

	#[error("rate limited: {0}")]
	RateLimited(RateLimitKind),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("upstream failed: {0}")]
	UpstreamFailed(String),

	#[error("internal: {0}")]
	Internal(String),
}

/// Distinguishing kind for a `RateLimited` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
	TooManyMessages,
	SlowMode,
	TooManyReactionsPerSecond,
	TooManyReactionsPerMinute,
}

impl fmt::Display for RateLimitKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			RateLimitKind::TooManyMessages => "rate_limited",
			RateLimitKind::SlowMode => "slow_mode",
			RateLimitKind::TooManyReactionsPerSecond => "rate_limited_per_second",
			RateLimitKind::TooManyReactionsPerMinute => "rate_limited_per_minute",
		};
		f.write_str(s)
	}
}

impl StreamingError {
	/// Stable string tag for the `{"error": "..."}` response body (spec §7).
	pub fn kind_str(&self) -> &'static str {
		match self {
			StreamingError::NotFound => "not_found",
			StreamingError::AlreadyExists => "already_exists",
			StreamingError::InvalidArgument(_) => "invalid_argument",
			StreamingError::Unauthorized => "unauthorized",
			StreamingError::RateLimited(_) => "rate_limited",
			StreamingError::Conflict(_) => "conflict",
			StreamingError::UpstreamFailed(_) => "upstream_failed",
			StreamingError::Internal(_) => "internal",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_ids() {
		assert!(RoomId::new("").is_err());
		assert!(Identity::new("   ").is_err());
		assert!("".parse::<RoomId>().is_err());
	}

	#[test]
	fn chat_message_id_orders_by_timestamp_then_sender() {
		let a = ChatMessageId::new(100, Identity::new("alice").unwrap());
		let b = ChatMessageId::new(100, Identity::new("bob").unwrap());
		let c = ChatMessageId::new(200, Identity::new("alice").unwrap());
		assert!(a < b);
		assert!(b < c);
	}

	#[test]
	fn error_kind_str_matches_spec_tags() {
		assert_eq!(StreamingError::NotFound.kind_str(), "not_found");
		assert_eq!(StreamingError::AlreadyExists.kind_str(), "already_exists");
		assert_eq!(
			StreamingError::RateLimited(RateLimitKind::SlowMode).kind_str(),
			"rate_limited"
		);
	}
}
