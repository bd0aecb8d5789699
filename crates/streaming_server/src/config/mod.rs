#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use streaming_util::SecretString;
use tracing::info;

/// Default config path: `~/.streaming-control/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".streaming-control").join("config.toml"))
}

/// Load the server config from TOML and env overrides.
#[allow(dead_code)]
pub fn load_server_config() -> anyhow::Result<ServerConfig> {
	let path = default_config_path()?;
	load_server_config_from_path(&path)
}

/// Same as `load_server_config` but with an explicit config path.
pub fn load_server_config_from_path(path: &Path) -> anyhow::Result<ServerConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ServerConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

/// Server config (v1).
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub server: ServerSettings,
	pub signer: SignerSettings,
	pub chat: ChatSettings,
	pub reactions: ReactionSettings,
	pub recording: RecordingSettings,
	pub analytics: AnalyticsSettings,
	pub persistence: PersistenceSettings,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig::from_file(FileConfig::default())
	}
}

/// HTTP/WS bind and process-level settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
	/// HTTP bind address (host:port).
	pub http_bind: String,
	/// Optional metrics exporter bind address (host:port). `None` disables it.
	pub metrics_bind: Option<String>,
	/// Media-plane URL returned alongside issued grants (spec §9 open question:
	/// hard-coded in the source; made configurable here).
	pub media_plane_url: String,
}

/// Credential Issuer settings (spec §4.A).
#[derive(Debug, Clone)]
pub struct SignerSettings {
	/// Signer key id, returned as `api_key` context for the media plane.
	pub api_key: String,
	/// HMAC secret backing the signer; never logged (`SecretString`).
	pub api_secret: SecretString,
	/// Grant validity window.
	pub grant_ttl: Duration,
	/// Default stream-key TTL when the caller doesn't specify one.
	pub stream_key_default_ttl: Option<Duration>,
	/// Liveness window for `count_active` (spec §4.A).
	pub stream_key_liveness_window: Duration,
}

/// Chat Engine defaults (spec §4.B).
#[derive(Debug, Clone)]
pub struct ChatSettings {
	pub max_length: usize,
	pub max_per_minute: u32,
	pub slow_mode_delay: Duration,
	pub enable_moderation: bool,
	pub enable_badwords: bool,
}

/// Reaction Engine defaults (spec §4.C).
#[derive(Debug, Clone)]
pub struct ReactionSettings {
	pub max_per_second: u32,
	pub max_per_minute: u32,
	pub max_recent: usize,
	pub ttl: Duration,
}

/// Recording Coordinator defaults (spec §4.D).
#[derive(Debug, Clone)]
pub struct RecordingSettings {
	pub storage_root: String,
	pub encoder_start_timeout: Duration,
	pub encoder_stop_timeout: Duration,
	pub session_timeout: Duration,
	pub watch_completion_threshold: f64,
}

/// Analytics Aggregator defaults (spec §4.E).
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
	pub sample_period: Duration,
	pub max_series_len: usize,
	pub retention: Duration,
}

/// Persistence settings for the VOD projector (ambient, spec §6).
#[derive(Debug, Clone, Default)]
pub struct PersistenceSettings {
	pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	server: FileServerSettings,
	#[serde(default)]
	signer: FileSignerSettings,
	#[serde(default)]
	chat: FileChatSettings,
	#[serde(default)]
	reactions: FileReactionSettings,
	#[serde(default)]
	recording: FileRecordingSettings,
	#[serde(default)]
	analytics: FileAnalyticsSettings,
	#[serde(default)]
	persistence: FilePersistenceSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	http_bind: Option<String>,
	metrics_bind: Option<String>,
	media_plane_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSignerSettings {
	api_key: Option<String>,
	api_secret: Option<String>,
	grant_ttl_secs: Option<u64>,
	stream_key_default_ttl_secs: Option<u64>,
	stream_key_liveness_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileChatSettings {
	max_length: Option<usize>,
	max_per_minute: Option<u32>,
	slow_mode_delay_secs: Option<u64>,
	enable_moderation: Option<bool>,
	enable_badwords: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileReactionSettings {
	max_per_second: Option<u32>,
	max_per_minute: Option<u32>,
	max_recent: Option<usize>,
	ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileRecordingSettings {
	storage_root: Option<String>,
	encoder_start_timeout_secs: Option<u64>,
	encoder_stop_timeout_secs: Option<u64>,
	session_timeout_secs: Option<u64>,
	watch_completion_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileAnalyticsSettings {
	sample_period_secs: Option<u64>,
	max_series_len: Option<usize>,
	retention_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FilePersistenceSettings {
	database_url: Option<String>,
}

impl ServerConfig {
	fn from_file(file: FileConfig) -> Self {
		Self {
			server: ServerSettings {
				http_bind: file.server.http_bind.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "127.0.0.1:8080".to_string()),
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				media_plane_url: file
					.server
					.media_plane_url
					.filter(|s| !s.trim().is_empty())
					.unwrap_or_else(|| "wss://media.invalid/sfu".to_string()),
			},
			signer: SignerSettings {
				api_key: file.signer.api_key.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "dev-api-key".to_string()),
				api_secret: SecretString::new(
					file.signer
						.api_secret
						.filter(|s| !s.trim().is_empty())
						.unwrap_or_else(|| "dev-api-secret-change-me".to_string()),
				),
				grant_ttl: Duration::from_secs(file.signer.grant_ttl_secs.unwrap_or(24 * 3600)),
				stream_key_default_ttl: file.signer.stream_key_default_ttl_secs.map(Duration::from_secs),
				stream_key_liveness_window: Duration::from_secs(file.signer.stream_key_liveness_window_secs.unwrap_or(300)),
			},
			chat: ChatSettings {
				max_length: file.chat.max_length.unwrap_or(500),
				max_per_minute: file.chat.max_per_minute.unwrap_or(20),
				slow_mode_delay: Duration::from_secs(file.chat.slow_mode_delay_secs.unwrap_or(0)),
				enable_moderation: file.chat.enable_moderation.unwrap_or(true),
				enable_badwords: file.chat.enable_badwords.unwrap_or(true),
			},
			reactions: ReactionSettings {
				max_per_second: file.reactions.max_per_second.unwrap_or(3),
				max_per_minute: file.reactions.max_per_minute.unwrap_or(60),
				max_recent: file.reactions.max_recent.unwrap_or(100),
				ttl: Duration::from_secs(file.reactions.ttl_secs.unwrap_or(300)),
			},
			recording: RecordingSettings {
				storage_root: file.recording.storage_root.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "/var/lib/streaming/vod".to_string()),
				encoder_start_timeout: Duration::from_secs(file.recording.encoder_start_timeout_secs.unwrap_or(10)),
				encoder_stop_timeout: Duration::from_secs(file.recording.encoder_stop_timeout_secs.unwrap_or(5)),
				session_timeout: Duration::from_secs(file.recording.session_timeout_secs.unwrap_or(300)),
				watch_completion_threshold: file.recording.watch_completion_threshold.unwrap_or(0.95),
			},
			analytics: AnalyticsSettings {
				sample_period: Duration::from_secs(file.analytics.sample_period_secs.unwrap_or(10)),
				max_series_len: file.analytics.max_series_len.unwrap_or(360),
				retention: Duration::from_secs(file.analytics.retention_secs.unwrap_or(90 * 24 * 3600)),
			},
			persistence: PersistenceSettings {
				database_url: file.persistence.database_url.filter(|s| !s.trim().is_empty()),
			},
		}
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ServerConfig) {
	if let Ok(v) = std::env::var("STREAMING_HTTP_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.http_bind = v;
			info!("server config: http_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("STREAMING_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("STREAMING_MEDIA_PLANE_URL") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.media_plane_url = v;
			info!("server config: media_plane_url overridden by env");
		}
	}

	if let Ok(v) = std::env::var("STREAMING_SIGNER_API_KEY") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.signer.api_key = v;
			info!("signer config: api_key overridden by env");
		}
	}

	if let Ok(v) = std::env::var("STREAMING_SIGNER_API_SECRET") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.signer.api_secret = SecretString::new(v);
			info!("signer config: api_secret overridden by env");
		}
	}

	// `DATABASE_URL` selects the persistent store URL per spec §6; an unset
	// value keeps the projector in disabled no-op mode (local file-based
	// fallback is just "no durable projection configured").
	if let Ok(v) = std::env::var("DATABASE_URL") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.persistence.database_url = Some(v);
			info!("persistence config: database_url overridden by env (DATABASE_URL)");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_spec_defaults() {
		let cfg = ServerConfig::default();
		assert_eq!(cfg.chat.max_length, 500);
		assert_eq!(cfg.chat.max_per_minute, 20);
		assert_eq!(cfg.reactions.max_per_second, 3);
		assert_eq!(cfg.reactions.max_per_minute, 60);
		assert_eq!(cfg.reactions.max_recent, 100);
		assert_eq!(cfg.recording.watch_completion_threshold, 0.95);
		assert_eq!(cfg.analytics.sample_period, Duration::from_secs(10));
		assert_eq!(cfg.signer.grant_ttl, Duration::from_secs(24 * 3600));
	}

	#[test]
	fn env_override_applies() {
		// SAFETY: test-only, single-threaded env mutation scoped to this test.
		unsafe {
			std::env::set_var("STREAMING_HTTP_BIND", "0.0.0.0:9999");
		}
		let mut cfg = ServerConfig::default();
		apply_env_overrides(&mut cfg);
		assert_eq!(cfg.server.http_bind, "0.0.0.0:9999");
		unsafe {
			std::env::remove_var("STREAMING_HTTP_BIND");
		}
	}
}
