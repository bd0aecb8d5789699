#![forbid(unsafe_code)]

use async_trait::async_trait;
use streaming_domain::RoomId;
use tracing::warn;

/// Output target the composited room is rendered to.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
	pub path: String,
}

/// Client for the out-of-process encoder (spec §4.D). The Recording
/// Coordinator never composites media itself; it only drives this RPC
/// surface and reconciles the result into its in-memory VOD catalog.
#[async_trait]
pub trait EncoderClient: Send + Sync + 'static {
	async fn start_room_composite(&self, room: &RoomId, layout: &str, outputs: &[EncoderOutput]) -> anyhow::Result<String>;
	async fn stop(&self, egress_id: &str) -> anyhow::Result<()>;
}

/// No-op encoder standing in for the out-of-scope media-composition process.
/// Mirrors the teacher's pattern of a trivial stand-in adapter for an
/// external collaborator that isn't part of this crate.
pub struct NullEncoderClient;

#[async_trait]
impl EncoderClient for NullEncoderClient {
	async fn start_room_composite(&self, room: &RoomId, _layout: &str, _outputs: &[EncoderOutput]) -> anyhow::Result<String> {
		Ok(format!("egress-{room}-{}", uuid::Uuid::new_v4()))
	}

	async fn stop(&self, egress_id: &str) -> anyhow::Result<()> {
		warn!(egress_id, "null encoder: stop is a no-op");
		Ok(())
	}
}
