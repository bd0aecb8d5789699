#![forbid(unsafe_code)]

pub mod engine;
pub mod room;

pub use engine::{ReactionEngine, ReactionEngineConfig};
pub use room::{Reaction, ReactionEvent, ReactionStats, TopReactor};
