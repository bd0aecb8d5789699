#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use streaming_domain::{Identity, RoomId, StreamingError};

/// Bundle of permissions carried by a stream key (spec §4.A). Defaults to
/// publish video+audio+screen, recording disabled, chat/reactions enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamKeyPermissions {
	pub publish_video: bool,
	pub publish_audio: bool,
	pub publish_screen: bool,
	pub record: bool,
	pub chat: bool,
	pub reactions: bool,
}

impl Default for StreamKeyPermissions {
	fn default() -> Self {
		Self { publish_video: true, publish_audio: true, publish_screen: true, record: false, chat: true, reactions: true }
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamKey {
	pub key: String,
	pub owner: Identity,
	pub room: RoomId,
	pub permissions: StreamKeyPermissions,
	pub active: bool,
	pub usage_count: u64,
	pub created_at_unix: u64,
	pub expires_at_unix: Option<u64>,
	pub last_used_at_unix: Option<u64>,
}

impl StreamKey {
	fn is_expired(&self, now: u64) -> bool {
		matches!(self.expires_at_unix, Some(exp) if exp <= now)
	}
}

/// In-memory stream-key store, indexed by key and by owner (spec §4.A).
/// Guarded by the caller (the credential engine holds this behind a lock);
/// this type itself assumes exclusive access to its methods.
#[derive(Default)]
pub struct StreamKeyStore {
	keys: HashMap<String, StreamKey>,
	by_owner: HashMap<Identity, Vec<String>>,
}

impl StreamKeyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn generate(&mut self, owner: Identity, room: RoomId, permissions: Option<StreamKeyPermissions>, ttl: Option<Duration>) -> StreamKey {
		let now = unix_secs_now();
		let key = generate_key_material();
		let entry = StreamKey {
			key: key.clone(),
			owner: owner.clone(),
			room,
			permissions: permissions.unwrap_or_default(),
			active: true,
			usage_count: 0,
			created_at_unix: now,
			expires_at_unix: ttl.map(|d| now + d.as_secs()),
			last_used_at_unix: None,
		};

		self.by_owner.entry(owner).or_default().push(key.clone());
		self.keys.insert(key, entry.clone());
		entry
	}

	pub fn validate(&self, key: &str) -> Result<&StreamKey, StreamingError> {
		let entry = self.keys.get(key).ok_or(StreamingError::NotFound)?;
		if !entry.active {
			return Err(StreamingError::Unauthorized);
		}
		if entry.is_expired(unix_secs_now()) {
			return Err(StreamingError::Unauthorized);
		}
		Ok(entry)
	}

	pub fn mark_used(&mut self, key: &str) -> Result<(), StreamingError> {
		let entry = self.keys.get_mut(key).ok_or(StreamingError::NotFound)?;
		entry.usage_count += 1;
		entry.last_used_at_unix = Some(unix_secs_now());
		Ok(())
	}

	pub fn revoke(&mut self, key: &str) -> Result<(), StreamingError> {
		let entry = self.keys.get_mut(key).ok_or(StreamingError::NotFound)?;
		entry.active = false;
		Ok(())
	}

	pub fn delete(&mut self, key: &str) -> Result<(), StreamingError> {
		let entry = self.keys.remove(key).ok_or(StreamingError::NotFound)?;
		if let Some(owned) = self.by_owner.get_mut(&entry.owner) {
			owned.retain(|k| k != key);
			if owned.is_empty() {
				self.by_owner.remove(&entry.owner);
			}
		}
		Ok(())
	}

	pub fn list_by_owner(&self, owner: &Identity) -> Vec<StreamKey> {
		self.by_owner.get(owner).map(|keys| keys.iter().filter_map(|k| self.keys.get(k)).cloned().collect()).unwrap_or_default()
	}

	/// Remove all keys whose `expires_at` lies in the past; returns the count swept.
	pub fn sweep_expired(&mut self) -> usize {
		let now = unix_secs_now();
		let expired: Vec<String> = self.keys.values().filter(|k| k.is_expired(now)).map(|k| k.key.clone()).collect();
		for key in &expired {
			let _ = self.delete(key);
		}
		expired.len()
	}

	/// Count keys marked active with `last_used_at` within `liveness_window`.
	pub fn count_active(&self, liveness_window: Duration) -> usize {
		let now = unix_secs_now();
		let window = liveness_window.as_secs();
		self.keys
			.values()
			.filter(|k| k.active && matches!(k.last_used_at_unix, Some(t) if now.saturating_sub(t) <= window))
			.count()
	}
}

fn generate_key_material() -> String {
	let mut bytes = [0u8; 32];
	OsRng.fill_bytes(&mut bytes);
	hex::encode(bytes)
}

fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn owner() -> Identity {
		Identity::new("alice").unwrap()
	}

	fn room() -> RoomId {
		RoomId::new("room-1").unwrap()
	}

	#[test]
	fn generate_then_validate_succeeds() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, None);
		assert_eq!(key.key.len(), 64);
		assert!(store.validate(&key.key).is_ok());
	}

	#[test]
	fn validate_unknown_key_not_found() {
		let store = StreamKeyStore::new();
		assert!(matches!(store.validate("deadbeef"), Err(StreamingError::NotFound)));
	}

	#[test]
	fn revoke_then_validate_fails() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, None);
		store.revoke(&key.key).unwrap();
		assert!(store.validate(&key.key).is_err());
	}

	#[test]
	fn mark_used_increments_usage() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, None);
		store.mark_used(&key.key).unwrap();
		store.mark_used(&key.key).unwrap();
		assert_eq!(store.validate(&key.key).unwrap().usage_count, 2);
	}

	#[test]
	fn sweep_expired_removes_past_keys() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, Some(Duration::from_secs(0)));
		std::thread::sleep(Duration::from_millis(1100));
		let swept = store.sweep_expired();
		assert_eq!(swept, 1);
		assert!(matches!(store.validate(&key.key), Err(StreamingError::NotFound)));
	}

	#[test]
	fn count_active_requires_recent_use() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, None);
		assert_eq!(store.count_active(Duration::from_secs(300)), 0);
		store.mark_used(&key.key).unwrap();
		assert_eq!(store.count_active(Duration::from_secs(300)), 1);
	}

	#[test]
	fn delete_cleans_owner_index() {
		let mut store = StreamKeyStore::new();
		let key = store.generate(owner(), room(), None, None);
		store.delete(&key.key).unwrap();
		assert!(!store.by_owner.contains_key(&owner()));
	}
}
