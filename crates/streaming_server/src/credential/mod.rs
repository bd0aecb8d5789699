#![forbid(unsafe_code)]

pub mod signer;
pub mod stream_key;

use std::time::Duration;

use streaming_domain::{Identity, RoomId, StreamingError};
use tokio::sync::RwLock;

pub use signer::{Capabilities, RoomGrant, Signer};
pub use stream_key::{StreamKey, StreamKeyPermissions, StreamKeyStore};

/// Credential Issuer (spec §4.A): issues short-lived room grants and manages
/// the longer-lived stream-key store. The signer has no internal mutable
/// state so it lives outside the lock; the stream-key store does, so it's
/// guarded by a single `RwLock`.
pub struct CredentialIssuer {
	signer: Signer,
	keys: RwLock<StreamKeyStore>,
	stream_key_liveness_window: Duration,
}

impl CredentialIssuer {
	pub fn new(signer: Signer, stream_key_liveness_window: Duration) -> Self {
		Self { signer, keys: RwLock::new(StreamKeyStore::new()), stream_key_liveness_window }
	}

	pub fn issue_grant(&self, room: &RoomId, identity: &Identity, is_publisher: bool) -> RoomGrant {
		self.signer.issue(room, identity, is_publisher)
	}

	pub fn verify_grant(&self, token: &str) -> Result<(RoomId, Identity, bool), StreamingError> {
		self.signer.verify(token)
	}

	pub async fn generate_key(
		&self,
		owner: Identity,
		room: RoomId,
		permissions: Option<StreamKeyPermissions>,
		ttl: Option<Duration>,
	) -> StreamKey {
		self.keys.write().await.generate(owner, room, permissions, ttl)
	}

	pub async fn validate_key(&self, key: &str) -> Result<StreamKey, StreamingError> {
		self.keys.read().await.validate(key).cloned()
	}

	pub async fn mark_used(&self, key: &str) -> Result<(), StreamingError> {
		self.keys.write().await.mark_used(key)
	}

	pub async fn revoke_key(&self, key: &str) -> Result<(), StreamingError> {
		self.keys.write().await.revoke(key)
	}

	pub async fn delete_key(&self, key: &str) -> Result<(), StreamingError> {
		self.keys.write().await.delete(key)
	}

	pub async fn sweep_expired(&self) -> usize {
		self.keys.write().await.sweep_expired()
	}

	pub async fn list_keys(&self, owner: &Identity) -> Vec<StreamKey> {
		self.keys.read().await.list_by_owner(owner)
	}

	pub async fn count_active(&self) -> usize {
		self.keys.read().await.count_active(self.stream_key_liveness_window)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use streaming_util::SecretString;

	fn issuer() -> CredentialIssuer {
		let signer = Signer::new("key".into(), SecretString::new("secret"), "wss://media.invalid/sfu".into(), Duration::from_secs(3600));
		CredentialIssuer::new(signer, Duration::from_secs(300))
	}

	#[tokio::test]
	async fn generate_validate_mark_used_round_trip() {
		let issuer = issuer();
		let room = RoomId::new("room-1").unwrap();
		let owner = Identity::new("alice").unwrap();
		let key = issuer.generate_key(owner, room, None, None).await;
		issuer.mark_used(&key.key).await.unwrap();
		let fetched = issuer.validate_key(&key.key).await.unwrap();
		assert_eq!(fetched.usage_count, 1);
	}

	#[tokio::test]
	async fn revoke_then_validate_fails() {
		let issuer = issuer();
		let room = RoomId::new("room-1").unwrap();
		let owner = Identity::new("alice").unwrap();
		let key = issuer.generate_key(owner, room, None, None).await;
		issuer.revoke_key(&key.key).await.unwrap();
		assert!(matches!(issuer.validate_key(&key.key).await, Err(StreamingError::Unauthorized)));
	}
}
