#![forbid(unsafe_code)]

pub mod engine;
pub mod room;

pub use engine::ChatEngine;
pub use room::{ChatEvent, ChatMessage, ChatRoomSettings, MessageKind, Participant};
