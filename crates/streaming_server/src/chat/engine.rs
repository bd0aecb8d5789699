#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use streaming_domain::{ChatMessageId, Identity, RoomId, StreamingError};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use crate::fanout::FanoutItem;

use super::room::{ChatEvent, ChatMessage, ChatRoomSettings, ChatRoomState, MessageKind, mask_badwords, unix_nanos_now, unix_secs_now};

/// Default subscriber queue depth for chat push endpoints.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// Chat Engine (spec §4.B): one coarse lock over the `rooms` map, one
/// reader/writer lock per room.
#[derive(Clone)]
pub struct ChatEngine {
	rooms: Arc<RwLock<HashMap<RoomId, Arc<RwLock<ChatRoomState>>>>>,
	default_settings: ChatRoomSettings,
}

impl Default for ChatEngine {
	fn default() -> Self {
		Self::new(ChatRoomSettings::default())
	}
}

impl ChatEngine {
	/// `default_settings` backs any room created without an explicit override,
	/// sourced from the configured `ChatSettings` (spec §4.B).
	pub fn new(default_settings: ChatRoomSettings) -> Self {
		Self { rooms: Arc::new(RwLock::new(HashMap::new())), default_settings }
	}

	pub async fn create_room(&self, room: RoomId, settings: Option<ChatRoomSettings>) -> Result<(), StreamingError> {
		let mut rooms = self.rooms.write().await;
		if rooms.contains_key(&room) {
			return Err(StreamingError::AlreadyExists);
		}
		rooms.insert(room, Arc::new(RwLock::new(ChatRoomState::new(settings.unwrap_or_else(|| self.default_settings.clone())))));
		Ok(())
	}

	async fn room_handle(&self, room: &RoomId) -> Result<Arc<RwLock<ChatRoomState>>, StreamingError> {
		let rooms = self.rooms.read().await;
		rooms.get(room).cloned().ok_or(StreamingError::NotFound)
	}

	pub async fn join(&self, room: &RoomId, identity: Identity, name: String, is_moderator: bool) -> Result<(), StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;

		let now = unix_secs_now();
		if let Some(&expiry) = state.banned.get(&identity) {
			if expiry > now {
				return Err(StreamingError::InvalidArgument(format!("banned_until({expiry})")));
			}
			state.banned.remove(&identity);
		}

		state.participants.insert(
			identity.clone(),
			super::room::Participant { identity: identity.clone(), name: name.clone(), is_moderator, is_muted: false, joined_at_unix: now },
		);

		append_system_message(&mut state, &identity, format!("{name} joined"));
		Ok(())
	}

	pub async fn leave(&self, room: &RoomId, identity: &Identity) -> Result<(), StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;
		let name = state.participants.remove(identity).map(|p| p.name).unwrap_or_else(|| identity.as_str().to_string());
		append_system_message(&mut state, identity, format!("{name} left"));
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	pub async fn send(
		&self,
		room: &RoomId,
		sender: &Identity,
		content: &str,
		kind: MessageKind,
		mentions: Vec<Identity>,
		reply_to: Option<ChatMessageId>,
	) -> Result<ChatMessage, StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;

		if content.len() > state.settings.max_length {
			return Err(StreamingError::InvalidArgument("too_long".to_string()));
		}

		let now = unix_secs_now();

		let window = state.recent_send_times.entry(sender.clone()).or_default();
		window.retain(|&t| now.saturating_sub(t) < 60);
		if window.len() as u32 >= state.settings.max_per_minute {
			return Err(StreamingError::RateLimited(streaming_domain::RateLimitKind::TooManyMessages));
		}

		if state.settings.slow_mode_delay_secs > 0 {
			if let Some(&last) = state.last_message_at.get(sender) {
				if now.saturating_sub(last) < state.settings.slow_mode_delay_secs {
					return Err(StreamingError::RateLimited(streaming_domain::RateLimitKind::SlowMode));
				}
			}
		}

		// auto-registration: sending without a prior join creates an implicit
		// participant record. Preserved intentionally (spec §9).
		state.participants.entry(sender.clone()).or_insert_with(|| super::room::Participant {
			identity: sender.clone(),
			name: sender.as_str().to_string(),
			is_moderator: false,
			is_muted: false,
			joined_at_unix: now,
		});

		let body = if state.settings.enable_badwords { mask_badwords(content) } else { content.to_string() };

		let id = ChatMessageId::new(unix_nanos_now(), sender.clone());
		let message = ChatMessage { id: id.clone(), sender: sender.clone(), content: body, kind, mentions, reply_to, is_deleted: false, created_at_unix: now };

		state.messages.push(message.clone());
		state.last_message_at.insert(sender.clone(), now);
		state.recent_send_times.entry(sender.clone()).or_default().push(now);
		state.listeners.publish(ChatEvent { message: message.clone() });

		Ok(message)
	}

	pub async fn delete(&self, room: &RoomId, message_id: &ChatMessageId, moderator: &Identity) -> Result<(), StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;
		if !state.is_moderator(moderator) {
			return Err(StreamingError::Unauthorized);
		}
		let msg = state.messages.iter_mut().find(|m| &m.id == message_id).ok_or(StreamingError::NotFound)?;
		msg.is_deleted = true;
		Ok(())
	}

	pub async fn mute(&self, room: &RoomId, target: &Identity, moderator: &Identity, duration: Duration) -> Result<(), StreamingError> {
		let handle = self.room_handle(room).await?;
		{
			let mut state = handle.write().await;
			if !state.is_moderator(moderator) {
				return Err(StreamingError::Unauthorized);
			}
			let participant = state.participants.get_mut(target).ok_or(StreamingError::NotFound)?;
			participant.is_muted = true;
		}

		if !duration.is_zero() {
			let handle = handle.clone();
			let target = target.clone();
			tokio::spawn(async move {
				tokio::time::sleep(duration).await;
				let mut state = handle.write().await;
				if let Some(p) = state.participants.get_mut(&target) {
					p.is_muted = false;
				}
			});
		}

		Ok(())
	}

	pub async fn ban(&self, room: &RoomId, target: &Identity, moderator: &Identity, duration: Duration) -> Result<(), StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;
		if !state.is_moderator(moderator) {
			return Err(StreamingError::Unauthorized);
		}
		let expiry = unix_secs_now() + duration.as_secs();
		state.banned.insert(target.clone(), expiry);
		state.participants.remove(target);
		Ok(())
	}

	pub async fn get(&self, room: &RoomId, limit: usize, before_ts: Option<u64>) -> Result<Vec<ChatMessage>, StreamingError> {
		let handle = self.room_handle(room).await?;
		let state = handle.read().await;
		let mut out: Vec<ChatMessage> = state
			.messages
			.iter()
			.filter(|m| !m.is_deleted)
			.filter(|m| before_ts.is_none_or(|before| m.created_at_unix < before))
			.cloned()
			.collect();
		out.reverse();
		out.truncate(limit);
		Ok(out)
	}

	pub async fn subscribe(&self, room: &RoomId) -> Result<mpsc::Receiver<FanoutItem<ChatEvent>>, StreamingError> {
		let handle = self.room_handle(room).await?;
		let mut state = handle.write().await;
		debug!(room = %room, "chat: listener subscribed");
		Ok(state.listeners.subscribe(SUBSCRIBER_QUEUE_CAPACITY))
	}
}

fn append_system_message(state: &mut ChatRoomState, actor: &Identity, text: String) {
	let id = ChatMessageId::new(unix_nanos_now(), actor.clone());
	let message = ChatMessage { id, sender: actor.clone(), content: text, kind: MessageKind::JoinLeave, mentions: Vec::new(), reply_to: None, is_deleted: false, created_at_unix: unix_secs_now() };
	state.messages.push(message.clone());
	state.listeners.publish(ChatEvent { message });
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(s: &str) -> Identity {
		Identity::new(s).unwrap()
	}

	fn room() -> RoomId {
		RoomId::new("room-1").unwrap()
	}

	#[tokio::test]
	async fn create_room_then_duplicate_fails() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		engine.create_room(room(), None).await.unwrap();
		assert!(matches!(engine.create_room(room(), None).await, Err(StreamingError::AlreadyExists)));
	}

	#[tokio::test]
	async fn send_without_join_auto_registers() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		engine.create_room(room(), None).await.unwrap();
		let msg = engine.send(&room(), &id("alice"), "hi", MessageKind::Text, vec![], None).await.unwrap();
		assert_eq!(msg.content, "hi");
	}

	#[tokio::test]
	async fn content_too_long_fails() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		let settings = ChatRoomSettings { max_length: 5, ..Default::default() };
		engine.create_room(room(), Some(settings)).await.unwrap();
		let result = engine.send(&room(), &id("alice"), "way too long", MessageKind::Text, vec![], None).await;
		assert!(matches!(result, Err(StreamingError::InvalidArgument(_))));
	}

	#[tokio::test]
	async fn slow_mode_blocks_then_allows_after_delay() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		let settings = ChatRoomSettings { slow_mode_delay_secs: 1, ..Default::default() };
		engine.create_room(room(), Some(settings)).await.unwrap();
		engine.send(&room(), &id("alice"), "hi", MessageKind::Text, vec![], None).await.unwrap();
		let immediate = engine.send(&room(), &id("alice"), "again", MessageKind::Text, vec![], None).await;
		assert!(matches!(immediate, Err(StreamingError::RateLimited(streaming_domain::RateLimitKind::SlowMode))));
		tokio::time::sleep(Duration::from_secs(2)).await;
		assert!(engine.send(&room(), &id("alice"), "third", MessageKind::Text, vec![], None).await.is_ok());
	}

	#[tokio::test]
	async fn rate_limit_per_minute_trips_then_recovers_conceptually() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		let settings = ChatRoomSettings { max_per_minute: 2, ..Default::default() };
		engine.create_room(room(), Some(settings)).await.unwrap();
		engine.send(&room(), &id("alice"), "one", MessageKind::Text, vec![], None).await.unwrap();
		engine.send(&room(), &id("alice"), "two", MessageKind::Text, vec![], None).await.unwrap();
		let third = engine.send(&room(), &id("alice"), "three", MessageKind::Text, vec![], None).await;
		assert!(matches!(third, Err(StreamingError::RateLimited(streaming_domain::RateLimitKind::TooManyMessages))));
	}

	#[tokio::test]
	async fn delete_requires_moderator() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		engine.create_room(room(), None).await.unwrap();
		let msg = engine.send(&room(), &id("alice"), "hi", MessageKind::Text, vec![], None).await.unwrap();
		let result = engine.delete(&room(), &msg.id, &id("alice")).await;
		assert!(matches!(result, Err(StreamingError::Unauthorized)));
	}

	#[tokio::test]
	async fn ban_blocks_rejoin_until_expiry() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		engine.create_room(room(), None).await.unwrap();
		engine.join(&room(), id("mod"), "mod".to_string(), true).await.unwrap();
		engine.ban(&room(), &id("alice"), &id("mod"), Duration::from_secs(1)).await.unwrap();
		let rejoin = engine.join(&room(), id("alice"), "alice".to_string(), false).await;
		assert!(rejoin.is_err());
		tokio::time::sleep(Duration::from_secs(2)).await;
		assert!(engine.join(&room(), id("alice"), "alice".to_string(), false).await.is_ok());
	}

	#[tokio::test]
	async fn get_orders_newest_first_and_excludes_deleted() {
		let engine = ChatEngine::new(ChatRoomSettings::default());
		engine.create_room(room(), None).await.unwrap();
		engine.send(&room(), &id("alice"), "first", MessageKind::Text, vec![], None).await.unwrap();
		let second = engine.send(&room(), &id("alice"), "second", MessageKind::Text, vec![], None).await.unwrap();
		engine.join(&room(), id("mod"), "mod".to_string(), true).await.unwrap();
		engine.delete(&room(), &second.id, &id("mod")).await.unwrap();
		let messages = engine.get(&room(), 10, None).await.unwrap();
		assert!(messages.iter().all(|m| m.content != "second"));
	}

	proptest::proptest! {
		/// Whatever order sends are issued from a single sender (slow mode and
		/// per-minute limits disabled), `messages[i].ts <= messages[j].ts` for
		/// i < j once the room's history is read back.
		#[test]
		fn messages_are_stored_in_non_decreasing_timestamp_order(bodies in proptest::collection::vec("[a-z ]{0,24}", 1..20)) {
			let rt = tokio::runtime::Runtime::new().unwrap();
			let result: Result<(), proptest::test_runner::TestCaseError> = rt.block_on(async {
				let engine = ChatEngine::new(ChatRoomSettings::default());
				let settings = ChatRoomSettings { max_per_minute: u32::MAX, slow_mode_delay_secs: 0, ..Default::default() };
				engine.create_room(room(), Some(settings)).await.unwrap();
				for body in &bodies {
					engine.send(&room(), &id("alice"), body, MessageKind::Text, vec![], None).await.unwrap();
				}
				let history = engine.get(&room(), bodies.len(), None).await.unwrap();
				for pair in history.windows(2) {
					// `get` returns newest-first, so timestamps are non-increasing.
					proptest::prop_assert!(pair[0].created_at_unix >= pair[1].created_at_unix);
				}
				Ok(())
			});
			result?;
		}
	}
}
