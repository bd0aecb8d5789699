#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use streaming_domain::{Identity, RoomId};
use streaming_util::SecretString;

use crate::analytics::{AnalyticsConfig, AnalyticsEngine};
use crate::chat::{ChatEngine, ChatRoomSettings, MessageKind};
use crate::credential::{CredentialIssuer, Signer};
use crate::reactions::{ReactionEngine, ReactionEngineConfig};
use crate::recording::{NullEncoderClient, PlaybackSessionManager, RecordingCoordinator, RecordingProjector};

fn id(s: &str) -> Identity {
	Identity::new(s).unwrap()
}

fn room(s: &str) -> RoomId {
	RoomId::new(s).unwrap()
}

fn issuer() -> CredentialIssuer {
	let signer = Signer::new("dev-api-key".into(), SecretString::new("dev-api-secret"), "wss://media.invalid/sfu".into(), Duration::from_secs(3600));
	CredentialIssuer::new(signer, Duration::from_secs(300))
}

/// Scenario 1: publisher grant.
#[tokio::test]
async fn publisher_grant_carries_publish_and_subscribe_capabilities() {
	let issuer = issuer();
	let grant = issuer.issue_grant(&room("r1"), &id("alice"), true);
	assert!(!grant.token.is_empty());
	assert_eq!(grant.media_plane_url, "wss://media.invalid/sfu");
	assert!(grant.capabilities.publish);
	assert!(grant.capabilities.subscribe);

	let (room, identity, is_publisher) = issuer.verify_grant(&grant.token).unwrap();
	assert_eq!(room.as_str(), "r1");
	assert_eq!(identity.as_str(), "alice");
	assert!(is_publisher);
}

/// Scenario 2: stream-key lifecycle.
#[tokio::test]
async fn stream_key_lifecycle_generate_validate_revoke() {
	let issuer = issuer();
	let key = issuer.generate_key(id("alice"), room("r1"), None, Some(Duration::from_secs(3600))).await;
	assert_eq!(key.key.len(), 64);

	issuer.mark_used(&key.key).await.unwrap();
	let validated = issuer.validate_key(&key.key).await.unwrap();
	assert_eq!(validated.usage_count, 1);

	issuer.revoke_key(&key.key).await.unwrap();
	assert!(matches!(issuer.validate_key(&key.key).await, Err(streaming_domain::StreamingError::Unauthorized)));
}

/// Scenario 3: chat slow mode.
#[tokio::test]
async fn chat_slow_mode_blocks_then_allows_after_delay() {
	let chat = ChatEngine::new(ChatRoomSettings::default());
	let room = room("r2");
	chat.create_room(room.clone(), Some(ChatRoomSettings { slow_mode_delay_secs: 2, ..Default::default() })).await.unwrap();

	chat.send(&room, &id("bob"), "hi", MessageKind::Text, vec![], None).await.unwrap();
	let immediate = chat.send(&room, &id("bob"), "again", MessageKind::Text, vec![], None).await;
	assert!(matches!(immediate, Err(streaming_domain::StreamingError::RateLimited(streaming_domain::RateLimitKind::SlowMode))));

	tokio::time::sleep(Duration::from_secs(2)).await;
	assert!(chat.send(&room, &id("bob"), "third", MessageKind::Text, vec![], None).await.is_ok());
}

/// Scenario 4: reaction per-second limit.
#[tokio::test]
async fn reaction_per_second_limit_allows_three_rejects_fourth() {
	let reactions = ReactionEngine::new(ReactionEngineConfig { max_per_second: 3, ..Default::default() });
	let room = room("r-reactions");

	let mut ok = 0;
	let mut limited = 0;
	for _ in 0..4 {
		match reactions.send(&room, &id("alice"), "Alice".to_string(), "heart".to_string(), None, None).await {
			Ok(_) => ok += 1,
			Err(streaming_domain::StreamingError::RateLimited(_)) => limited += 1,
			Err(e) => panic!("unexpected error: {e}"),
		}
	}
	assert_eq!(ok, 3);
	assert_eq!(limited, 1);
}

/// Scenario 5: recording stop reconciliation.
#[tokio::test]
async fn recording_stop_reconciles_to_ready_with_thumbnail() {
	let coordinator = Arc::new(RecordingCoordinator::new(Arc::new(NullEncoderClient), RecordingProjector::disabled(), "/tmp/vod".to_string(), Duration::from_secs(10), Duration::from_secs(5)));

	let started = coordinator.start(room("r5"), id("alice"), "Alice".to_string(), "Launch stream".to_string()).await.unwrap();
	assert_eq!(started.status, crate::recording::VodStatus::Recording);
	assert!(started.egress_id.is_some());

	coordinator.stop(started.id, Some(600), Some(4096)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	let reconciled = coordinator.get(started.id).await.unwrap();
	assert_eq!(reconciled.status, crate::recording::VodStatus::Ready);
	assert!(reconciled.thumbnail_path.is_some());

	let published = coordinator.publish(started.id).await.unwrap();
	assert!(published.is_public);

	let playback = PlaybackSessionManager::new(Arc::clone(&coordinator), Duration::from_secs(300), 0.95);
	let session = playback.start(started.id, id("viewer"), "source".to_string()).await.unwrap();
	assert_eq!(session.recording_id, started.id);
}

/// Scenario 6: analytics unique viewer count across a rejoin.
#[tokio::test]
async fn analytics_unique_count_across_rejoin() {
	let analytics = AnalyticsEngine::new(AnalyticsConfig::default());
	let room = room("r3");
	analytics.start(room.clone(), id("streamer")).await.unwrap();

	analytics.viewer_join(&room, id("alice"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
	analytics.viewer_join(&room, id("bob"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
	analytics.viewer_leave(&room, &id("alice")).await.unwrap();
	analytics.viewer_join(&room, id("alice"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();

	let snapshot = analytics.snapshot(&room).await.unwrap();
	assert_eq!(snapshot.total, 4);
	assert_eq!(snapshot.unique, 2);
	assert_eq!(snapshot.current, 2);
	assert_eq!(snapshot.peak, 2);
}
