#![forbid(unsafe_code)]

mod analytics;
mod chat;
mod config;
mod credential;
mod fanout;
mod http;
mod notifications;
mod reactions;
mod recording;
mod registry;
mod state;

#[cfg(test)]
mod scenario_tests;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::analytics::{AnalyticsConfig, AnalyticsEngine};
use crate::chat::ChatEngine;
use crate::credential::{CredentialIssuer, Signer};
use crate::http::health::HealthState;
use crate::notifications::NotificationHub;
use crate::reactions::{ReactionEngine, ReactionEngineConfig};
use crate::recording::{NullEncoderClient, PlaybackSessionManager, RecordingCoordinator, RecordingProjector};
use crate::registry::StreamRegistry;
use crate::state::AppState;

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,streaming_server=debug".to_string());

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
	let base = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter)).with(tracing_subscriber::fmt::layer().with_target(false));

	if let Some(endpoint) = otlp_endpoint {
		use opentelemetry::global;
		use opentelemetry::trace::TracerProvider as _;
		use opentelemetry_otlp::WithExportConfig;

		match opentelemetry_otlp::SpanExporter::builder().with_tonic().with_endpoint(endpoint.clone()).build() {
			Ok(exporter) => {
				let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_batch_exporter(exporter).build();
				let tracer = tracer_provider.tracer("streaming_server");
				global::set_tracer_provider(tracer_provider);

				let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
				base.with(otel_layer).init();
				info!(endpoint = %endpoint, "otlp tracing enabled");
			}
			Err(e) => {
				base.init();
				warn!(error = %e, "failed to initialize otlp tracing");
			}
		}
	} else {
		base.init();
	}
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<std::net::SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr).install() {
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)"),
	}
}

/// Spawns a periodic sweep loop; errors inside `tick` are expected to be
/// handled/logged by the callback itself.
fn spawn_sweep<F, Fut>(period: Duration, mut tick: F)
where
	F: FnMut() -> Fut + Send + 'static,
	Fut: std::future::Future<Output = ()> + Send,
{
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		loop {
			interval.tick().await;
			tick().await;
		}
	});
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let config_path = crate::config::default_config_path()?;
	let server_cfg = crate::config::load_server_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded server config (toml + env overrides)");

	init_metrics(server_cfg.server.metrics_bind.as_deref());

	let signer = Signer::new(server_cfg.signer.api_key.clone(), server_cfg.signer.api_secret.clone(), server_cfg.server.media_plane_url.clone(), server_cfg.signer.grant_ttl);
	let credential = Arc::new(CredentialIssuer::new(signer, server_cfg.signer.stream_key_liveness_window));

	let chat = ChatEngine::new(crate::chat::ChatRoomSettings {
		max_length: server_cfg.chat.max_length,
		max_per_minute: server_cfg.chat.max_per_minute,
		slow_mode_delay_secs: server_cfg.chat.slow_mode_delay.as_secs(),
		enable_moderation: server_cfg.chat.enable_moderation,
		enable_badwords: server_cfg.chat.enable_badwords,
	});

	let reactions = ReactionEngine::new(ReactionEngineConfig {
		max_per_second: server_cfg.reactions.max_per_second,
		max_per_minute: server_cfg.reactions.max_per_minute,
		max_recent: server_cfg.reactions.max_recent,
		ttl: server_cfg.reactions.ttl,
	});

	let projector = match server_cfg.persistence.database_url.as_deref() {
		Some(url) => RecordingProjector::connect(url).await?,
		None => RecordingProjector::disabled(),
	};

	let encoder = Arc::new(NullEncoderClient);
	let recording = Arc::new(RecordingCoordinator::new(encoder, projector, server_cfg.recording.storage_root.clone(), server_cfg.recording.encoder_start_timeout, server_cfg.recording.encoder_stop_timeout));
	let playback = Arc::new(PlaybackSessionManager::new(Arc::clone(&recording), server_cfg.recording.session_timeout, server_cfg.recording.watch_completion_threshold));

	let analytics = AnalyticsEngine::new(AnalyticsConfig {
		sample_period: server_cfg.analytics.sample_period,
		max_series_len: server_cfg.analytics.max_series_len,
		retention: server_cfg.analytics.retention,
	});

	let registry = StreamRegistry::new();
	let notifications = Arc::new(NotificationHub::new());

	let app_state = web::Data::new(AppState { credential: Arc::clone(&credential), chat: chat.clone(), reactions: reactions.clone(), recording: Arc::clone(&recording), playback: Arc::clone(&playback), analytics: analytics.clone(), registry: registry.clone(), notifications: Arc::clone(&notifications) });

	let health_state = web::Data::new(HealthState::new());

	{
		let credential = Arc::clone(&credential);
		spawn_sweep(Duration::from_secs(60), move || {
			let credential = Arc::clone(&credential);
			async move {
				let n = credential.sweep_expired().await;
				if n > 0 {
					info!(swept = n, "stream key sweep");
				}
			}
		});
	}

	{
		let reactions = reactions.clone();
		spawn_sweep(server_cfg.reactions.ttl, move || {
			let reactions = reactions.clone();
			async move {
				let n = reactions.sweep_old().await;
				if n > 0 {
					info!(swept = n, "reaction sweep");
				}
			}
		});
	}

	{
		let recording = Arc::clone(&recording);
		spawn_sweep(Duration::from_secs(60), move || {
			let recording = Arc::clone(&recording);
			async move {
				let n = recording.sweep_expired().await;
				if n > 0 {
					info!(swept = n, "recording sweep");
				}
			}
		});
	}

	{
		let playback = Arc::clone(&playback);
		spawn_sweep(server_cfg.recording.session_timeout, move || {
			let playback = Arc::clone(&playback);
			async move {
				let n = playback.sweep_stale_sessions().await;
				if n > 0 {
					info!(swept = n, "playback session sweep");
				}
			}
		});
	}

	{
		let analytics = analytics.clone();
		spawn_sweep(server_cfg.analytics.sample_period, move || {
			let analytics = analytics.clone();
			async move {
				analytics.sample_all().await;
			}
		});
	}

	{
		let analytics = analytics.clone();
		spawn_sweep(Duration::from_secs(3600), move || {
			let analytics = analytics.clone();
			async move {
				let n = analytics.sweep_old().await;
				if n > 0 {
					info!(swept = n, "analytics retention sweep");
				}
			}
		});
	}

	health_state.mark_ready();

	let http_bind = server_cfg.server.http_bind.clone();
	streaming_util::HttpEndpoint::parse(&http_bind).map_err(|e| anyhow::anyhow!(e))?;
	info!(bind = %http_bind, "starting streaming control plane");

	HttpServer::new(move || {
		App::new()
			.wrap(tracing_actix_web::TracingLogger::default())
			.wrap(Cors::permissive())
			.app_data(app_state.clone())
			.app_data(health_state.clone())
			.configure(http::configure)
	})
	.bind(&http_bind)?
	.run()
	.await?;

	Ok(())
}
