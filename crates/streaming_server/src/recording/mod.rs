#![forbid(unsafe_code)]

pub mod coordinator;
pub mod encoder;
pub mod playback;
pub mod projector;

pub use coordinator::{RecordingCoordinator, VodRecording, VodStatus};
pub use encoder::{EncoderClient, EncoderOutput, NullEncoderClient};
pub use playback::{PlaybackSession, PlaybackSessionManager};
pub use projector::RecordingProjector;
