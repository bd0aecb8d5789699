#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use streaming_domain::{Identity, RoomId, StreamingError};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct ViewerSession {
	pub identity: Identity,
	pub platform: String,
	pub device: String,
	pub country: String,
	pub region: String,
	pub joined_at_unix: u64,
	pub left_at_unix: Option<u64>,
	pub watch_duration_secs: Option<u64>,
	pub messages_sent: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DerivedMetrics {
	pub average_watch_time_secs: f64,
	pub unique_messagers: u64,
	pub messages_per_minute: f64,
	pub reactions_per_minute: f64,
	pub viewer_retention_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSample {
	pub ts_unix: u64,
	pub current_viewers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamAnalyticsSnapshot {
	pub room: RoomId,
	pub streamer: Identity,
	pub current: i64,
	pub total: u64,
	pub peak: i64,
	pub unique: u64,
	pub messages_total: u64,
	pub reactions_total: u64,
	pub reactions_per_type: HashMap<String, u64>,
	pub bitrate_peak: u64,
	pub by_platform: HashMap<String, u64>,
	pub by_device: HashMap<String, u64>,
	pub by_country: HashMap<String, u64>,
	pub by_region: HashMap<String, u64>,
	pub timeline: Vec<TimelineSample>,
	pub derived: DerivedMetrics,
	pub started_at_unix: u64,
	pub ended_at_unix: Option<u64>,
}

pub(crate) struct RoomAnalyticsState {
	streamer: Identity,
	current: i64,
	total: u64,
	peak: i64,
	unique: u64,
	seen_identities: HashSet<Identity>,
	open_sessions: HashMap<Identity, ViewerSession>,
	closed_sessions: Vec<ViewerSession>,
	messages_total: u64,
	messagers: HashSet<Identity>,
	reactions_total: u64,
	reactions_per_type: HashMap<String, u64>,
	bitrate_peak: u64,
	by_platform: HashMap<String, u64>,
	by_device: HashMap<String, u64>,
	by_country: HashMap<String, u64>,
	by_region: HashMap<String, u64>,
	timeline: VecDeque<TimelineSample>,
	max_series_len: usize,
	derived: DerivedMetrics,
	started_at_unix: u64,
	ended_at_unix: Option<u64>,
}

impl RoomAnalyticsState {
	fn new(streamer: Identity, max_series_len: usize) -> Self {
		Self {
			streamer,
			current: 0,
			total: 0,
			peak: 0,
			unique: 0,
			seen_identities: HashSet::new(),
			open_sessions: HashMap::new(),
			closed_sessions: Vec::new(),
			messages_total: 0,
			messagers: HashSet::new(),
			reactions_total: 0,
			reactions_per_type: HashMap::new(),
			bitrate_peak: 0,
			by_platform: HashMap::new(),
			by_device: HashMap::new(),
			by_country: HashMap::new(),
			by_region: HashMap::new(),
			timeline: VecDeque::new(),
			max_series_len,
			derived: DerivedMetrics::default(),
			started_at_unix: unix_secs_now(),
			ended_at_unix: None,
		}
	}

	fn recompute_derived(&mut self) {
		let closed = self.closed_sessions.len() as f64;
		self.derived.average_watch_time_secs = if closed > 0.0 {
			self.closed_sessions.iter().filter_map(|s| s.watch_duration_secs).sum::<u64>() as f64 / closed
		} else {
			0.0
		};
		self.derived.unique_messagers = self.messagers.len() as u64;

		let duration_minutes = (unix_secs_now().saturating_sub(self.started_at_unix) as f64 / 60.0).max(1.0 / 60.0);
		self.derived.messages_per_minute = self.messages_total as f64 / duration_minutes;
		self.derived.reactions_per_minute = self.reactions_total as f64 / duration_minutes;
		self.derived.viewer_retention_pct = if self.total > 0 { (self.closed_sessions.len() as f64 / self.total as f64) * 100.0 } else { 0.0 };
	}

	fn snapshot(&self, room: RoomId) -> StreamAnalyticsSnapshot {
		StreamAnalyticsSnapshot {
			room,
			streamer: self.streamer.clone(),
			current: self.current,
			total: self.total,
			peak: self.peak,
			unique: self.unique,
			messages_total: self.messages_total,
			reactions_total: self.reactions_total,
			reactions_per_type: self.reactions_per_type.clone(),
			bitrate_peak: self.bitrate_peak,
			by_platform: self.by_platform.clone(),
			by_device: self.by_device.clone(),
			by_country: self.by_country.clone(),
			by_region: self.by_region.clone(),
			timeline: self.timeline.iter().cloned().collect(),
			derived: self.derived.clone(),
			started_at_unix: self.started_at_unix,
			ended_at_unix: self.ended_at_unix,
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyticsConfig {
	pub sample_period: Duration,
	pub max_series_len: usize,
	pub retention: Duration,
}

impl Default for AnalyticsConfig {
	fn default() -> Self {
		Self { sample_period: Duration::from_secs(10), max_series_len: 360, retention: Duration::from_secs(90 * 24 * 3600) }
	}
}

/// Analytics Aggregator (spec §4.E): one long-lived per-room aggregator
/// between `start` and `stop`, fed by event calls from the other engines
/// and by a periodic sampling ticker.
#[derive(Clone)]
pub struct AnalyticsEngine {
	rooms: Arc<RwLock<HashMap<RoomId, Arc<RwLock<RoomAnalyticsState>>>>>,
	config: AnalyticsConfig,
}

impl AnalyticsEngine {
	pub fn new(config: AnalyticsConfig) -> Self {
		Self { rooms: Arc::new(RwLock::new(HashMap::new())), config }
	}

	pub async fn start(&self, room: RoomId, streamer: Identity) -> Result<(), StreamingError> {
		let mut rooms = self.rooms.write().await;
		if rooms.contains_key(&room) {
			return Err(StreamingError::AlreadyExists);
		}
		rooms.insert(room, Arc::new(RwLock::new(RoomAnalyticsState::new(streamer, self.config.max_series_len))));
		Ok(())
	}

	async fn handle(&self, room: &RoomId) -> Result<Arc<RwLock<RoomAnalyticsState>>, StreamingError> {
		self.rooms.read().await.get(room).cloned().ok_or(StreamingError::NotFound)
	}

	pub async fn stop(&self, room: &RoomId) -> Result<StreamAnalyticsSnapshot, StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;
		state.ended_at_unix = Some(unix_secs_now());
		state.recompute_derived();
		Ok(state.snapshot(room.clone()))
	}

	#[allow(clippy::too_many_arguments)]
	pub async fn viewer_join(&self, room: &RoomId, identity: Identity, platform: String, device: String, country: String, region: String) -> Result<(), StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;

		state.total += 1;
		// A rejoin while a session is still open for this identity doesn't
		// add a second concurrent viewer.
		if !state.open_sessions.contains_key(&identity) {
			state.current += 1;
		}
		if state.peak < state.current {
			state.peak = state.current;
		}
		if state.seen_identities.insert(identity.clone()) {
			state.unique += 1;
		}

		*state.by_platform.entry(platform.clone()).or_insert(0) += 1;
		*state.by_device.entry(device.clone()).or_insert(0) += 1;
		*state.by_country.entry(country.clone()).or_insert(0) += 1;
		*state.by_region.entry(region.clone()).or_insert(0) += 1;

		state.open_sessions.insert(
			identity.clone(),
			ViewerSession { identity, platform, device, country, region, joined_at_unix: unix_secs_now(), left_at_unix: None, watch_duration_secs: None, messages_sent: 0 },
		);
		Ok(())
	}

	pub async fn viewer_leave(&self, room: &RoomId, identity: &Identity) -> Result<(), StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;

		if let Some(mut session) = state.open_sessions.remove(identity) {
			let now = unix_secs_now();
			session.left_at_unix = Some(now);
			session.watch_duration_secs = Some(now.saturating_sub(session.joined_at_unix));
			state.closed_sessions.push(session);
		}
		state.current = (state.current - 1).max(0);
		Ok(())
	}

	pub async fn chat_message(&self, room: &RoomId, sender: &Identity) -> Result<(), StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;
		state.messages_total += 1;
		state.messagers.insert(sender.clone());
		if let Some(session) = state.open_sessions.get_mut(sender) {
			session.messages_sent += 1;
		}
		Ok(())
	}

	pub async fn reaction(&self, room: &RoomId, _sender: &Identity, reaction_type: &str) -> Result<(), StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;
		state.reactions_total += 1;
		*state.reactions_per_type.entry(reaction_type.to_string()).or_insert(0) += 1;
		Ok(())
	}

	pub async fn bitrate_update(&self, room: &RoomId, bitrate: u64) -> Result<(), StreamingError> {
		let handle = self.handle(room).await?;
		let mut state = handle.write().await;
		if bitrate > state.bitrate_peak {
			state.bitrate_peak = bitrate;
		}
		Ok(())
	}

	pub async fn snapshot(&self, room: &RoomId) -> Result<StreamAnalyticsSnapshot, StreamingError> {
		let handle = self.handle(room).await?;
		let state = handle.read().await;
		Ok(state.snapshot(room.clone()))
	}

	/// Periodic sampling: append a `{ts, current}` point, truncate from the
	/// front past `max_series_len`, and recompute derived metrics.
	pub async fn sample_all(&self) {
		let rooms = self.rooms.read().await;
		for (room, handle) in rooms.iter() {
			let mut state = handle.write().await;
			let sample = TimelineSample { ts_unix: unix_secs_now(), current_viewers: state.current };
			state.timeline.push_back(sample);
			while state.timeline.len() > state.max_series_len {
				state.timeline.pop_front();
			}
			state.recompute_derived();
			let _ = room;
		}
	}

	/// Drop analytics records whose `ended_at` is older than the retention
	/// horizon (spec §4.E).
	pub async fn sweep_old(&self) -> usize {
		let mut rooms = self.rooms.write().await;
		let now = unix_secs_now();
		let retention_secs = self.config.retention.as_secs();
		let before = rooms.len();
		let mut to_remove = Vec::new();
		for (room, handle) in rooms.iter() {
			let state = handle.read().await;
			if matches!(state.ended_at_unix, Some(end) if now.saturating_sub(end) > retention_secs) {
				to_remove.push(room.clone());
			}
		}
		for room in &to_remove {
			rooms.remove(room);
		}
		before - rooms.len()
	}
}

fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(s: &str) -> Identity {
		Identity::new(s).unwrap()
	}

	fn room() -> RoomId {
		RoomId::new("r3").unwrap()
	}

	#[tokio::test]
	async fn start_twice_fails_already_exists() {
		let engine = AnalyticsEngine::new(AnalyticsConfig::default());
		engine.start(room(), id("streamer")).await.unwrap();
		assert!(matches!(engine.start(room(), id("streamer")).await, Err(StreamingError::AlreadyExists)));
	}

	#[tokio::test]
	async fn unique_count_matches_distinct_identities_across_rejoin() {
		let engine = AnalyticsEngine::new(AnalyticsConfig::default());
		engine.start(room(), id("streamer")).await.unwrap();
		engine.viewer_join(&room(), id("alice"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
		engine.viewer_join(&room(), id("bob"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
		engine.viewer_join(&room(), id("alice"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
		engine.viewer_leave(&room(), &id("alice")).await.unwrap();
		engine.viewer_join(&room(), id("alice"), "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();

		let snapshot = engine.snapshot(&room()).await.unwrap();
		assert_eq!(snapshot.total, 4);
		assert_eq!(snapshot.unique, 2);
		assert_eq!(snapshot.current, 2);
		assert_eq!(snapshot.peak, 2);
	}

	#[tokio::test]
	async fn current_never_goes_negative() {
		let engine = AnalyticsEngine::new(AnalyticsConfig::default());
		engine.start(room(), id("streamer")).await.unwrap();
		engine.viewer_leave(&room(), &id("ghost")).await.unwrap();
		let snapshot = engine.snapshot(&room()).await.unwrap();
		assert_eq!(snapshot.current, 0);
	}

	proptest::proptest! {
		/// For any interleaving of joins and leaves across a small pool of
		/// identities, `0 <= current <= peak` and `total >= unique` hold.
		#[test]
		fn viewer_counters_stay_consistent(ops in proptest::collection::vec((0..4u8, proptest::bool::ANY), 0..40)) {
			let rt = tokio::runtime::Runtime::new().unwrap();
			let result: Result<(), proptest::test_runner::TestCaseError> = rt.block_on(async {
				let engine = AnalyticsEngine::new(AnalyticsConfig::default());
				engine.start(room(), id("streamer")).await.unwrap();
				for (who, join) in ops {
					let identity = id(&format!("viewer-{who}"));
					if join {
						engine.viewer_join(&room(), identity, "web".into(), "desktop".into(), "US".into(), "CA".into()).await.unwrap();
					} else {
						engine.viewer_leave(&room(), &identity).await.unwrap();
					}
					let snapshot = engine.snapshot(&room()).await.unwrap();
					proptest::prop_assert!(snapshot.current >= 0);
					proptest::prop_assert!(snapshot.current <= snapshot.peak);
					proptest::prop_assert!(snapshot.total >= snapshot.unique);
				}
				Ok(())
			});
			result?;
		}
	}
}
