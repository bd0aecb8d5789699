#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use streaming_domain::{ChatMessageId, Identity};

use crate::fanout::ListenerSet;

/// Per-room configuration (spec §4.B). Defaults mirror the spec's stated
/// constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoomSettings {
	pub max_length: usize,
	pub max_per_minute: u32,
	pub slow_mode_delay_secs: u64,
	pub enable_moderation: bool,
	pub enable_badwords: bool,
}

impl Default for ChatRoomSettings {
	fn default() -> Self {
		Self { max_length: 500, max_per_minute: 20, slow_mode_delay_secs: 0, enable_moderation: true, enable_badwords: true }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
	Text,
	Emoji,
	System,
	Gift,
	JoinLeave,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
	pub id: ChatMessageId,
	pub sender: Identity,
	pub content: String,
	pub kind: MessageKind,
	pub mentions: Vec<Identity>,
	pub reply_to: Option<ChatMessageId>,
	pub is_deleted: bool,
	pub created_at_unix: u64,
}

#[derive(Debug, Clone)]
pub struct Participant {
	pub identity: Identity,
	pub name: String,
	pub is_moderator: bool,
	pub is_muted: bool,
	pub joined_at_unix: u64,
}

/// Event shape delivered to fan-out listeners: every appended message,
/// including system `join_leave` ones (spec §4.B).
#[derive(Debug, Clone, Serialize)]
pub struct ChatEvent {
	pub message: ChatMessage,
}

/// The per-room state for the Chat Engine; guarded by its own lock so the
/// engine's top-level map lock can be released before a caller touches a
/// specific room (spec §5).
pub struct ChatRoomState {
	pub settings: ChatRoomSettings,
	pub participants: HashMap<Identity, Participant>,
	pub banned: HashMap<Identity, u64>,
	pub messages: Vec<ChatMessage>,
	pub(crate) last_message_at: HashMap<Identity, u64>,
	pub(crate) recent_send_times: HashMap<Identity, Vec<u64>>,
	pub(crate) listeners: ListenerSet<ChatEvent>,
}

impl ChatRoomState {
	pub fn new(settings: ChatRoomSettings) -> Self {
		Self {
			settings,
			participants: HashMap::new(),
			banned: HashMap::new(),
			messages: Vec::new(),
			last_message_at: HashMap::new(),
			recent_send_times: HashMap::new(),
			listeners: ListenerSet::default(),
		}
	}

	pub fn is_moderator(&self, identity: &Identity) -> bool {
		self.participants.get(identity).map(|p| p.is_moderator).unwrap_or(false)
	}
}

/// Fixed bad-word list and substitution glyph (spec §9: the source leaves
/// this a stub; this is the documented policy knob). Case-insensitive,
/// whole-word match, masked with `*` repeated to the matched word's length.
const BAD_WORDS: &[&str] = &["damn", "hell", "crap"];
const MASK_GLYPH: char = '*';

pub fn mask_badwords(content: &str) -> String {
	let mut out = String::with_capacity(content.len());
	for (i, word) in split_keep_whitespace(content).into_iter().enumerate() {
		if i > 0 {
			// separators are re-emitted verbatim by split_keep_whitespace
		}
		let lower = word.to_lowercase();
		if BAD_WORDS.contains(&lower.as_str()) {
			out.extend(std::iter::repeat_n(MASK_GLYPH, word.chars().count()));
		} else {
			out.push_str(&word);
		}
	}
	out
}

/// Splits on whitespace boundaries while keeping the whitespace itself as
/// separate tokens, so masking doesn't disturb original spacing.
fn split_keep_whitespace(s: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut current = String::new();
	let mut current_is_ws = None;

	for c in s.chars() {
		let is_ws = c.is_whitespace();
		if current_is_ws == Some(is_ws) || current_is_ws.is_none() {
			current.push(c);
			current_is_ws = Some(is_ws);
		} else {
			tokens.push(std::mem::take(&mut current));
			current.push(c);
			current_is_ws = Some(is_ws);
		}
	}
	if !current.is_empty() {
		tokens.push(current);
	}
	tokens
}

pub fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub fn unix_nanos_now() -> u128 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn masks_bad_words_preserving_length_and_spacing() {
		let masked = mask_badwords("well damn it all");
		assert_eq!(masked, "well **** it all");
	}

	#[test]
	fn leaves_clean_content_untouched() {
		assert_eq!(mask_badwords("hello world"), "hello world");
	}
}
