#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use streaming_domain::{Identity, RateLimitKind, ReactionId, RoomId, StreamingError};
use tokio::sync::{RwLock, mpsc};

use crate::fanout::FanoutItem;

use super::room::{Reaction, ReactionEvent, ReactionRoomState, ReactionStats, SenderLimiter, TopReactor, unix_millis_now, unix_secs_now};

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ReactionEngineConfig {
	pub max_per_second: u32,
	pub max_per_minute: u32,
	pub max_recent: usize,
	pub ttl: Duration,
}

impl Default for ReactionEngineConfig {
	fn default() -> Self {
		Self { max_per_second: 3, max_per_minute: 60, max_recent: 100, ttl: Duration::from_secs(300) }
	}
}

/// Reaction Engine (spec §4.C). Rooms are lazily created on first reaction.
#[derive(Clone)]
pub struct ReactionEngine {
	rooms: Arc<RwLock<HashMap<RoomId, Arc<RwLock<ReactionRoomState>>>>>,
	config: ReactionEngineConfig,
}

impl ReactionEngine {
	pub fn new(config: ReactionEngineConfig) -> Self {
		Self { rooms: Arc::new(RwLock::new(HashMap::new())), config }
	}

	async fn room_handle(&self, room: &RoomId) -> Arc<RwLock<ReactionRoomState>> {
		{
			let rooms = self.rooms.read().await;
			if let Some(handle) = rooms.get(room) {
				return handle.clone();
			}
		}
		let mut rooms = self.rooms.write().await;
		rooms.entry(room.clone()).or_insert_with(|| Arc::new(RwLock::new(ReactionRoomState::new(self.config.max_recent)))).clone()
	}

	async fn existing_room_handle(&self, room: &RoomId) -> Result<Arc<RwLock<ReactionRoomState>>, StreamingError> {
		let rooms = self.rooms.read().await;
		rooms.get(room).cloned().ok_or(StreamingError::NotFound)
	}

	#[allow(clippy::too_many_arguments)]
	pub async fn send(
		&self,
		room: &RoomId,
		sender: &Identity,
		sender_name: String,
		reaction_type: String,
		x: Option<f64>,
		y: Option<f64>,
	) -> Result<Reaction, StreamingError> {
		let handle = self.room_handle(room).await;
		let mut state = handle.write().await;

		let now_ms = unix_millis_now();
		let now_s = unix_secs_now();

		let limiter = state.limiters.entry(sender.clone()).or_insert_with(SenderLimiter::default);

		if now_ms.saturating_sub(limiter.second_window_start_millis) >= 1000 {
			limiter.second_window_start_millis = now_ms;
			limiter.second_count = 0;
		}
		if limiter.second_count >= self.config.max_per_second {
			return Err(StreamingError::RateLimited(RateLimitKind::TooManyReactionsPerSecond));
		}

		if now_s.saturating_sub(limiter.minute_window_start_secs) >= 60 {
			limiter.minute_window_start_secs = now_s;
			limiter.minute_count = 0;
		}
		if limiter.minute_count >= self.config.max_per_minute {
			return Err(StreamingError::RateLimited(RateLimitKind::TooManyReactionsPerMinute));
		}

		let reaction = Reaction { id: ReactionId::new_v4(), sender: sender.clone(), sender_name, reaction_type: reaction_type.clone(), x, y, created_at_unix: now_s };

		state.reactions.push(reaction.clone());
		state.recent.push_front(reaction.clone());
		if state.recent.len() > state.max_recent {
			state.recent.truncate(state.max_recent);
		}
		state.stats.total += 1;
		*state.stats.per_type.entry(reaction_type).or_insert(0) += 1;
		state.bump_leaderboard(sender);
		state.listeners.publish(ReactionEvent { reaction: reaction.clone() });

		let limiter = state.limiters.get_mut(sender).expect("limiter just inserted");
		limiter.second_count += 1;
		limiter.minute_count += 1;

		Ok(reaction)
	}

	pub async fn recent(&self, room: &RoomId, limit: usize) -> Result<Vec<Reaction>, StreamingError> {
		let handle = self.existing_room_handle(room).await?;
		let state = handle.read().await;
		Ok(state.recent.iter().take(limit).cloned().collect())
	}

	pub async fn user(&self, room: &RoomId, identity: &Identity) -> Result<Vec<Reaction>, StreamingError> {
		let handle = self.existing_room_handle(room).await?;
		let state = handle.read().await;
		Ok(state.reactions.iter().filter(|r| &r.sender == identity).cloned().collect())
	}

	pub async fn stats(&self, room: &RoomId) -> Result<ReactionStats, StreamingError> {
		let handle = self.existing_room_handle(room).await?;
		let state = handle.read().await;
		Ok(state.stats.clone())
	}

	pub async fn top(&self, room: &RoomId, limit: usize) -> Result<Vec<TopReactor>, StreamingError> {
		let handle = self.existing_room_handle(room).await?;
		let state = handle.read().await;
		Ok(state.top(limit))
	}

	pub async fn subscribe(&self, room: &RoomId) -> mpsc::Receiver<FanoutItem<ReactionEvent>> {
		let handle = self.room_handle(room).await;
		let mut state = handle.write().await;
		state.listeners.subscribe(SUBSCRIBER_QUEUE_CAPACITY)
	}

	/// Remove reactions older than `ttl` from every room's log. Stats are a
	/// running total and are not retroactively decremented (spec §4.C).
	pub async fn sweep_old(&self) -> usize {
		let rooms = self.rooms.read().await;
		let mut swept = 0usize;
		let now = unix_secs_now();
		let ttl_secs = self.config.ttl.as_secs();
		for handle in rooms.values() {
			let mut state = handle.write().await;
			let before = state.reactions.len();
			state.reactions.retain(|r| now.saturating_sub(r.created_at_unix) <= ttl_secs);
			swept += before - state.reactions.len();
		}
		swept
	}
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
	async fn lazily_creates_room_on_first_reaction() {
		let engine = ReactionEngine::new(ReactionEngineConfig::default());
		let reaction = engine.send(&room(), &id("alice"), "alice".into(), "heart".into(), None, None).await.unwrap();
		assert_eq!(reaction.reaction_type, "heart");
	}

	#[tokio::test]
	async fn per_second_limit_allows_up_to_max_then_blocks_rapid_fire() {
		let config = ReactionEngineConfig { max_per_second: 3, ..Default::default() };
		let engine = ReactionEngine::new(config);
		let mut ok_count = 0;
		let mut limited_count = 0;
		for _ in 0..4 {
			match engine.send(&room(), &id("alice"), "alice".into(), "heart".into(), None, None).await {
				Ok(_) => ok_count += 1,
				Err(StreamingError::RateLimited(RateLimitKind::TooManyReactionsPerSecond)) => limited_count += 1,
				Err(e) => panic!("unexpected error: {e:?}"),
			}
		}
		assert_eq!(ok_count, 3);
		assert_eq!(limited_count, 1);
	}

	#[tokio::test]
	async fn stats_total_matches_log_length() {
		let engine = ReactionEngine::new(ReactionEngineConfig::default());
		engine.send(&room(), &id("alice"), "alice".into(), "heart".into(), None, None).await.unwrap();
		tokio::time::sleep(Duration::from_millis(400)).await;
		engine.send(&room(), &id("alice"), "alice".into(), "star".into(), None, None).await.unwrap();
		let stats = engine.stats(&room()).await.unwrap();
		assert_eq!(stats.total, 2);
	}

	#[tokio::test]
	async fn top_orders_by_count_descending() {
		let engine = ReactionEngine::new(ReactionEngineConfig::default());
		for _ in 0..3 {
			engine.send(&room(), &id("alice"), "alice".into(), "heart".into(), None, None).await.ok();
			tokio::time::sleep(Duration::from_millis(350)).await;
		}
		engine.send(&room(), &id("bob"), "bob".into(), "heart".into(), None, None).await.unwrap();
		let top = engine.top(&room(), 10).await.unwrap();
		assert_eq!(top[0].identity, id("alice"));
	}
}
