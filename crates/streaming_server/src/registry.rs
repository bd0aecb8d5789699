#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streaming_domain::RoomId;
use tokio::sync::RwLock;

/// The public "what's live" listing entry (spec §3, §4.F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRegistryEntry {
	pub id: RoomId,
	pub title: String,
	pub streamer: String,
	pub avatar: String,
	pub viewers: u64,
	pub start_time_unix: u64,
}

/// Process-wide registry of currently-listed streams (spec §4.F). Used by
/// the discovery page; owns no cross-engine state.
#[derive(Clone, Default)]
pub struct StreamRegistry {
	entries: Arc<RwLock<HashMap<RoomId, StreamRegistryEntry>>>,
}

impl StreamRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn register(&self, entry: StreamRegistryEntry) {
		self.entries.write().await.insert(entry.id.clone(), entry);
	}

	pub async fn unregister(&self, id: &RoomId) {
		self.entries.write().await.remove(id);
	}

	pub async fn list(&self) -> Vec<StreamRegistryEntry> {
		self.entries.read().await.values().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn register_then_list_then_unregister() {
		let registry = StreamRegistry::new();
		let room = RoomId::new("r1").unwrap();
		registry.register(StreamRegistryEntry { id: room.clone(), title: "Title".into(), streamer: "alice".into(), avatar: "".into(), viewers: 0, start_time_unix: 0 }).await;
		assert_eq!(registry.list().await.len(), 1);

		registry.register(StreamRegistryEntry { id: room.clone(), title: "Updated".into(), streamer: "alice".into(), avatar: "".into(), viewers: 3, start_time_unix: 0 }).await;
		let entries = registry.list().await;
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].title, "Updated");

		registry.unregister(&room).await;
		assert!(registry.list().await.is_empty());
	}
}
