#![forbid(unsafe_code)]

pub mod analytics;
pub mod chat;
pub mod credential;
pub mod errors;
pub mod health;
pub mod notifications;
pub mod reactions;
pub mod recording;
pub mod registry;

use actix_web::web;

/// Wires every handler onto its path under `/api/streaming`, matching the
/// selected HTTP surface (spec §6). Kept as one function so `main` stays a
/// thin bootstrap.
pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(
		web::scope("/api/streaming")
			.route("/token", web::post().to(credential::token))
			.route("/token", web::get().to(credential::token))
			.route("/keys/generate", web::post().to(credential::generate_key))
			.route("/keys/validate", web::post().to(credential::validate_key))
			.route("/keys/revoke", web::post().to(credential::revoke_key))
			.route("/keys/list", web::get().to(credential::list_keys))
			.route("/chat/create", web::post().to(chat::create))
			.route("/chat/send", web::post().to(chat::send))
			.route("/chat/messages", web::get().to(chat::messages))
			.route("/chat/mute", web::post().to(chat::mute))
			.route("/chat/ban", web::post().to(chat::ban))
			.route("/chat/ws", web::get().to(chat::ws_endpoint))
			.route("/reactions/send", web::post().to(reactions::send))
			.route("/reactions/stats", web::get().to(reactions::stats))
			.route("/reactions/recent", web::get().to(reactions::recent))
			.route("/reactions/ws", web::get().to(reactions::ws_endpoint))
			.route("/vod/start", web::post().to(recording::start))
			.route("/vod/stop", web::post().to(recording::stop))
			.route("/vod/list", web::get().to(recording::list))
			.route("/vod/publish/{recording_id}", web::post().to(recording::publish))
			.route("/vod/playback/start", web::post().to(recording::playback_start))
			.route("/vod/playback/heartbeat", web::post().to(recording::playback_heartbeat))
			.route("/vod/playback/end", web::post().to(recording::playback_end))
			.route("/analytics/stream", web::get().to(analytics::stream_snapshot))
			.route("/list", web::get().to(registry::list))
			.route("/register", web::post().to(registry::register))
			.route("/unregister", web::post().to(registry::unregister))
			.route("/notifications/ws", web::get().to(notifications::ws_endpoint)),
	)
	.route("/healthz", web::get().to(health::healthz))
	.route("/readyz", web::get().to(health::readyz));
}
