#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use streaming_domain::{Identity, PlaybackSessionId, RecordingId, StreamingError};
use tokio::sync::RwLock;

use super::coordinator::{RecordingCoordinator, VodStatus};

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSession {
	pub id: PlaybackSessionId,
	pub recording_id: RecordingId,
	pub user: Identity,
	pub quality: String,
	pub started_at_unix: u64,
	pub last_heartbeat_unix: u64,
	pub watch_duration_secs: u64,
	pub position_secs: f64,
	pub completed: bool,
}

/// Manages playback sessions against recordings tracked by the coordinator
/// (spec §4.D). Kept separate from `RecordingCoordinator` because a session
/// is a distinct lifetime from the VOD record it watches.
pub struct PlaybackSessionManager {
	sessions: RwLock<HashMap<PlaybackSessionId, PlaybackSession>>,
	coordinator: Arc<RecordingCoordinator>,
	session_timeout: Duration,
	watch_completion_threshold: f64,
}

impl PlaybackSessionManager {
	pub fn new(coordinator: Arc<RecordingCoordinator>, session_timeout: Duration, watch_completion_threshold: f64) -> Self {
		Self { sessions: RwLock::new(HashMap::new()), coordinator, session_timeout, watch_completion_threshold }
	}

	pub async fn start(&self, recording_id: RecordingId, user: Identity, quality: String) -> Result<PlaybackSession, StreamingError> {
		let record = self.coordinator.get(recording_id).await?;
		if record.status != VodStatus::Ready || !record.is_public {
			return Err(StreamingError::Conflict("recording not published".to_string()));
		}

		let now = unix_secs_now();
		let session = PlaybackSession {
			id: PlaybackSessionId::new_v4(),
			recording_id,
			user,
			quality,
			started_at_unix: now,
			last_heartbeat_unix: now,
			watch_duration_secs: 0,
			position_secs: 0.0,
			completed: false,
		};

		self.coordinator.bump_view_count(recording_id).await?;
		self.sessions.write().await.insert(session.id, session.clone());
		Ok(session)
	}

	pub async fn heartbeat(&self, session_id: PlaybackSessionId, position_secs: f64) -> Result<PlaybackSession, StreamingError> {
		let mut sessions = self.sessions.write().await;
		let session = sessions.get_mut(&session_id).ok_or(StreamingError::NotFound)?;

		let now = unix_secs_now();
		session.last_heartbeat_unix = now;
		session.watch_duration_secs = now.saturating_sub(session.started_at_unix);
		session.position_secs = position_secs;

		if let Ok(record) = self.coordinator.get(session.recording_id).await {
			if let Some(duration) = record.duration_secs {
				if duration > 0 && position_secs >= duration as f64 * self.watch_completion_threshold {
					session.completed = true;
				}
			}
		}

		Ok(session.clone())
	}

	pub async fn end(&self, session_id: PlaybackSessionId) -> Result<(), StreamingError> {
		let session = self.sessions.write().await.remove(&session_id).ok_or(StreamingError::NotFound)?;
		self.coordinator.update_avg_watch_duration(session.recording_id, session.watch_duration_secs as f64).await?;
		Ok(())
	}

	/// Remove sessions idle longer than `session_timeout`.
	pub async fn sweep_stale_sessions(&self) -> usize {
		let now = unix_secs_now();
		let timeout_secs = self.session_timeout.as_secs();
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();
		sessions.retain(|_, s| now.saturating_sub(s.last_heartbeat_unix) <= timeout_secs);
		before - sessions.len()
	}
}

fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::super::encoder::NullEncoderClient;
	use super::super::projector::RecordingProjector;
	use streaming_domain::RoomId;

	async fn ready_recording(coordinator: &Arc<RecordingCoordinator>) -> RecordingId {
		let record = coordinator.start(RoomId::new("r1").unwrap(), Identity::new("alice").unwrap(), "Alice".into(), "Title".into()).await.unwrap();
		coordinator.stop(record.id, Some(100), None).await.unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;
		coordinator.publish(record.id).await.unwrap();
		record.id
	}

	#[tokio::test]
	async fn start_requires_published_recording() {
		let coordinator = Arc::new(RecordingCoordinator::new(Arc::new(NullEncoderClient), RecordingProjector::disabled(), "/tmp/vod".to_string(), Duration::from_secs(10), Duration::from_secs(5)));
		let record = coordinator.start(RoomId::new("r1").unwrap(), Identity::new("alice").unwrap(), "Alice".into(), "Title".into()).await.unwrap();
		let manager = PlaybackSessionManager::new(coordinator.clone(), Duration::from_secs(300), 0.95);
		let result = manager.start(record.id, Identity::new("viewer").unwrap(), "1080p".into()).await;
		assert!(matches!(result, Err(StreamingError::Conflict(_))));
	}

	#[tokio::test]
	async fn heartbeat_completes_past_threshold() {
		let coordinator = Arc::new(RecordingCoordinator::new(Arc::new(NullEncoderClient), RecordingProjector::disabled(), "/tmp/vod".to_string(), Duration::from_secs(10), Duration::from_secs(5)));
		let recording_id = ready_recording(&coordinator).await;
		let manager = PlaybackSessionManager::new(coordinator.clone(), Duration::from_secs(300), 0.95);
		let session = manager.start(recording_id, Identity::new("viewer").unwrap(), "1080p".into()).await.unwrap();
		let updated = manager.heartbeat(session.id, 96.0).await.unwrap();
		assert!(updated.completed);
	}
}
