#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use streaming_domain::{Identity, ReactionId};

use crate::fanout::ListenerSet;

#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
	pub id: ReactionId,
	pub sender: Identity,
	pub sender_name: String,
	pub reaction_type: String,
	pub x: Option<f64>,
	pub y: Option<f64>,
	pub created_at_unix: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionEvent {
	pub reaction: Reaction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionStats {
	pub total: u64,
	pub per_type: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopReactor {
	pub identity: Identity,
	pub count: u64,
}

/// Rolling rate-limit counters for a single sender (spec §4.C: two windows).
#[derive(Debug, Clone, Default)]
pub(crate) struct SenderLimiter {
	pub second_window_start_millis: u64,
	pub second_count: u32,
	pub minute_window_start_secs: u64,
	pub minute_count: u32,
}

pub struct ReactionRoomState {
	/// Authoritative append-ordered log; sweeping removes entries in place.
	pub reactions: Vec<Reaction>,
	pub recent: std::collections::VecDeque<Reaction>,
	pub max_recent: usize,
	pub stats: ReactionStats,
	pub(crate) leaderboard_counts: HashMap<Identity, u64>,
	pub(crate) leaderboard_order: Vec<Identity>,
	pub(crate) limiters: HashMap<Identity, SenderLimiter>,
	pub(crate) listeners: ListenerSet<ReactionEvent>,
}

impl ReactionRoomState {
	pub fn new(max_recent: usize) -> Self {
		Self {
			reactions: Vec::new(),
			recent: std::collections::VecDeque::new(),
			max_recent,
			stats: ReactionStats { total: 0, per_type: HashMap::new() },
			leaderboard_counts: HashMap::new(),
			leaderboard_order: Vec::new(),
			limiters: HashMap::new(),
			listeners: ListenerSet::default(),
		}
	}

	pub(crate) fn bump_leaderboard(&mut self, sender: &Identity) {
		let count = self.leaderboard_counts.entry(sender.clone()).or_insert(0);
		*count += 1;
		if !self.leaderboard_order.contains(sender) {
			self.leaderboard_order.push(sender.clone());
		}
	}

	/// Top 10 by count descending, ties broken by first-seen (stable) order.
	pub fn top(&self, limit: usize) -> Vec<TopReactor> {
		let mut entries: Vec<TopReactor> = self
			.leaderboard_order
			.iter()
			.map(|identity| TopReactor { identity: identity.clone(), count: *self.leaderboard_counts.get(identity).unwrap_or(&0) })
			.collect();
		entries.sort_by(|a, b| b.count.cmp(&a.count));
		entries.truncate(limit.min(10));
		entries
	}
}

pub fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub fn unix_millis_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
