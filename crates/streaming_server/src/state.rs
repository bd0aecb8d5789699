#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::analytics::AnalyticsEngine;
use crate::chat::ChatEngine;
use crate::credential::CredentialIssuer;
use crate::notifications::NotificationHub;
use crate::reactions::ReactionEngine;
use crate::recording::{PlaybackSessionManager, RecordingCoordinator};
use crate::registry::StreamRegistry;

/// Aggregates the five engines plus the stream registry behind a single
/// `actix_web::web::Data` handle (spec §4). Each engine guards its own
/// state; this struct is just the wiring.
pub struct AppState {
	pub credential: Arc<CredentialIssuer>,
	pub chat: ChatEngine,
	pub reactions: ReactionEngine,
	pub recording: Arc<RecordingCoordinator>,
	pub playback: Arc<PlaybackSessionManager>,
	pub analytics: AnalyticsEngine,
	pub registry: StreamRegistry,
	pub notifications: Arc<NotificationHub>,
}
