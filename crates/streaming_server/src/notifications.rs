#![forbid(unsafe_code)]

use serde::Serialize;
use streaming_domain::RoomId;
use tokio::sync::{Mutex, mpsc};

use crate::fanout::{FanoutItem, ListenerSet};

/// Process-wide lifecycle notifications: a stream going live or a recording
/// becoming ready. Distinct from the per-room chat/reaction fan-outs (spec
/// §4.F lists it as its own push endpoint).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
	StreamLive { room: RoomId, title: String },
	StreamEnded { room: RoomId },
	RecordingReady { room: RoomId, recording_id: String },
}

#[derive(Default)]
pub struct NotificationHub {
	listeners: Mutex<ListenerSet<NotificationEvent>>,
}

impl NotificationHub {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn subscribe(&self, queue_capacity: usize) -> mpsc::Receiver<FanoutItem<NotificationEvent>> {
		self.listeners.lock().await.subscribe(queue_capacity)
	}

	pub async fn publish(&self, event: NotificationEvent) {
		self.listeners.lock().await.publish(event);
	}
}
