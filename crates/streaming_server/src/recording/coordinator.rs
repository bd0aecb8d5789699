#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use streaming_domain::{Identity, RecordingId, RoomId, StreamingError};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::encoder::{EncoderClient, EncoderOutput};
use super::projector::RecordingProjector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VodStatus {
	Recording,
	Processing,
	Ready,
	Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct VodRecording {
	pub id: RecordingId,
	pub room: RoomId,
	pub streamer: Identity,
	pub streamer_name: String,
	pub title: String,
	pub status: VodStatus,
	pub video_path: String,
	pub thumbnail_path: Option<String>,
	pub duration_secs: Option<u64>,
	pub file_size_bytes: Option<u64>,
	pub is_public: bool,
	pub published_at_unix: Option<u64>,
	pub expires_at_unix: Option<u64>,
	pub egress_id: Option<String>,
	pub view_count: u64,
	pub avg_watch_duration_secs: f64,
	pub created_at_unix: u64,
	pub updated_at_unix: u64,
}

/// Recording Coordinator (spec §4.D): couples an in-process VOD catalog with
/// an out-of-process encoder. The catalog is authoritative for live
/// semantics; any database projection is an eventually-consistent mirror.
pub struct RecordingCoordinator {
	recordings: RwLock<HashMap<RecordingId, Arc<RwLock<VodRecording>>>>,
	encoder: Arc<dyn EncoderClient>,
	projector: RecordingProjector,
	storage_root: String,
	start_timeout: Duration,
	stop_timeout: Duration,
}

impl RecordingCoordinator {
	pub fn new(encoder: Arc<dyn EncoderClient>, projector: RecordingProjector, storage_root: String, start_timeout: Duration, stop_timeout: Duration) -> Self {
		Self { recordings: RwLock::new(HashMap::new()), encoder, projector, storage_root, start_timeout, stop_timeout }
	}

	/// Best-effort mirror into the external `recordings` table; failures are
	/// logged, not propagated, since the in-memory catalog stays authoritative.
	async fn project(&self, record: &VodRecording) {
		if let Err(e) = self.projector.upsert(record).await {
			warn!(recording_id = %record.id, error = %e, "recording projector upsert failed");
		}
	}

	pub async fn start(&self, room: RoomId, streamer: Identity, streamer_name: String, title: String) -> Result<VodRecording, StreamingError> {
		let id = RecordingId::new_v4();
		let video_path = format!("{}/{id}.mp4", self.storage_root);
		let now = unix_secs_now();

		let outputs = vec![EncoderOutput { path: video_path.clone() }];
		let egress_id = tokio::time::timeout(self.start_timeout, self.encoder.start_room_composite(&room, "room-composite", &outputs))
			.await
			.map_err(|_| StreamingError::UpstreamFailed("encoder start timed out".to_string()))?
			.map_err(|e| StreamingError::UpstreamFailed(e.to_string()))?;

		let record = VodRecording {
			id,
			room,
			streamer,
			streamer_name,
			title,
			status: VodStatus::Recording,
			video_path,
			thumbnail_path: None,
			duration_secs: None,
			file_size_bytes: None,
			is_public: false,
			published_at_unix: None,
			expires_at_unix: None,
			egress_id: Some(egress_id),
			view_count: 0,
			avg_watch_duration_secs: 0.0,
			created_at_unix: now,
			updated_at_unix: now,
		};

		self.recordings.write().await.insert(id, Arc::new(RwLock::new(record.clone())));
		self.project(&record).await;
		Ok(record)
	}

	async fn handle(&self, id: RecordingId) -> Result<Arc<RwLock<VodRecording>>, StreamingError> {
		self.recordings.read().await.get(&id).cloned().ok_or(StreamingError::NotFound)
	}

	pub async fn stop(self: &Arc<Self>, id: RecordingId, duration_secs: Option<u64>, file_size_bytes: Option<u64>) -> Result<VodRecording, StreamingError> {
		let handle = self.handle(id).await?;
		let egress_id = {
			let mut record = handle.write().await;
			if record.status != VodStatus::Recording {
				return Err(StreamingError::Conflict("not recording".to_string()));
			}
			record.status = VodStatus::Processing;
			record.duration_secs = duration_secs;
			record.file_size_bytes = file_size_bytes;
			record.updated_at_unix = unix_secs_now();
			record.egress_id.clone()
		};

		self.project(&handle.read().await.clone()).await;

		let this = self.clone();
		let handle_for_task = handle.clone();
		tokio::spawn(async move {
			if let Some(egress_id) = egress_id {
				let result = tokio::time::timeout(this.stop_timeout, this.encoder.stop(&egress_id)).await;
				match result {
					Ok(Ok(())) => {}
					Ok(Err(e)) => warn!(%egress_id, error = %e, "encoder stop failed, continuing VOD reconciliation"),
					Err(_) => warn!(%egress_id, "encoder stop timed out, continuing VOD reconciliation"),
				}
			}

			// post-processing: thumbnail generation and URL assignment.
			tokio::time::sleep(Duration::from_millis(50)).await;
			let record = {
				let mut record = handle_for_task.write().await;
				record.thumbnail_path = Some(format!("{}.thumb.jpg", record.video_path));
				record.status = VodStatus::Ready;
				record.updated_at_unix = unix_secs_now();
				info!(recording_id = %record.id, "vod: post-processing complete");
				record.clone()
			};
			this.project(&record).await;
		});

		Ok(handle.read().await.clone())
	}

	pub async fn publish(&self, id: RecordingId) -> Result<VodRecording, StreamingError> {
		let handle = self.handle(id).await?;
		let record = {
			let mut record = handle.write().await;
			if record.status != VodStatus::Ready {
				return Err(StreamingError::Conflict("not ready".to_string()));
			}
			record.is_public = true;
			record.published_at_unix = Some(unix_secs_now());
			record.updated_at_unix = unix_secs_now();
			record.clone()
		};
		self.project(&record).await;
		Ok(record)
	}

	pub async fn get(&self, id: RecordingId) -> Result<VodRecording, StreamingError> {
		let handle = self.handle(id).await?;
		Ok(handle.read().await.clone())
	}

	pub async fn bump_view_count(&self, id: RecordingId) -> Result<(), StreamingError> {
		let handle = self.handle(id).await?;
		let mut record = handle.write().await;
		record.view_count += 1;
		record.updated_at_unix = unix_secs_now();
		Ok(())
	}

	/// Update `avg_watch_duration` with an incremental mean weighted by the
	/// current `view_count` (spec §4.D: "running mean ... weighted by
	/// view_count").
	pub async fn update_avg_watch_duration(&self, id: RecordingId, sample_secs: f64) -> Result<(), StreamingError> {
		let handle = self.handle(id).await?;
		let mut record = handle.write().await;
		let n = record.view_count.max(1) as f64;
		record.avg_watch_duration_secs += (sample_secs - record.avg_watch_duration_secs) / n;
		record.updated_at_unix = unix_secs_now();
		Ok(())
	}

	pub async fn delete(&self, id: RecordingId) -> Result<(), StreamingError> {
		let handle = self.handle(id).await?;
		let mut record = handle.write().await;
		record.status = VodStatus::Deleted;
		record.updated_at_unix = unix_secs_now();
		Ok(())
	}

	pub async fn list_by_streamer(&self, owner: &Identity, limit: usize, offset: usize) -> Vec<VodRecording> {
		let recordings = self.recordings.read().await;
		let mut all = Vec::new();
		for handle in recordings.values() {
			let record = handle.read().await;
			if &record.streamer == owner {
				all.push(record.clone());
			}
		}
		all.sort_by(|a, b| b.created_at_unix.cmp(&a.created_at_unix));
		all.into_iter().skip(offset).take(limit).collect()
	}

	pub async fn list_all(&self, limit: usize, offset: usize) -> Vec<VodRecording> {
		let recordings = self.recordings.read().await;
		let mut all = Vec::new();
		for handle in recordings.values() {
			all.push(handle.read().await.clone());
		}
		all.sort_by(|a, b| b.created_at_unix.cmp(&a.created_at_unix));
		all.into_iter().skip(offset).take(limit).collect()
	}

	/// Mark expired recordings as deleted (spec §4.D invariant).
	pub async fn sweep_expired(&self) -> usize {
		let recordings = self.recordings.read().await;
		let now = unix_secs_now();
		let mut swept = 0usize;
		for handle in recordings.values() {
			let mut record = handle.write().await;
			if record.status != VodStatus::Deleted && matches!(record.expires_at_unix, Some(exp) if exp <= now) {
				record.status = VodStatus::Deleted;
				record.updated_at_unix = now;
				swept += 1;
			}
		}
		swept
	}
}

fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::super::encoder::NullEncoderClient;

	fn coordinator() -> Arc<RecordingCoordinator> {
		Arc::new(RecordingCoordinator::new(Arc::new(NullEncoderClient), RecordingProjector::disabled(), "/tmp/vod".to_string(), Duration::from_secs(10), Duration::from_secs(5)))
	}

	#[tokio::test]
	async fn start_then_stop_reaches_ready_after_postprocess() {
		let coordinator = coordinator();
		let record = coordinator.start(RoomId::new("r1").unwrap(), Identity::new("alice").unwrap(), "Alice".into(), "Title".into()).await.unwrap();
		assert_eq!(record.status, VodStatus::Recording);
		coordinator.stop(record.id, Some(120), Some(1024)).await.unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;
		let fetched = coordinator.get(record.id).await.unwrap();
		assert_eq!(fetched.status, VodStatus::Ready);
		assert!(fetched.thumbnail_path.is_some());
	}

	#[tokio::test]
	async fn stop_on_non_recording_fails() {
		let coordinator = coordinator();
		let record = coordinator.start(RoomId::new("r1").unwrap(), Identity::new("alice").unwrap(), "Alice".into(), "Title".into()).await.unwrap();
		coordinator.stop(record.id, None, None).await.unwrap();
		let second_stop = coordinator.stop(record.id, None, None).await;
		assert!(matches!(second_stop, Err(StreamingError::Conflict(_))));
	}

	#[tokio::test]
	async fn publish_requires_ready() {
		let coordinator = coordinator();
		let record = coordinator.start(RoomId::new("r1").unwrap(), Identity::new("alice").unwrap(), "Alice".into(), "Title".into()).await.unwrap();
		assert!(matches!(coordinator.publish(record.id).await, Err(StreamingError::Conflict(_))));
		coordinator.stop(record.id, None, None).await.unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;
		let published = coordinator.publish(record.id).await.unwrap();
		assert!(published.is_public);
	}
}
