#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, web};

/// Tracks whether startup has finished wiring every engine (spec §7). Exposed
/// as `/readyz`; `/healthz` just confirms the process is alive.
#[derive(Clone, Default)]
pub struct HealthState {
	ready: Arc<AtomicBool>,
}

impl HealthState {
	pub fn new() -> Self {
		Self { ready: Arc::new(AtomicBool::new(false)) }
	}

	pub fn mark_ready(&self) {
		self.ready.store(true, Ordering::Relaxed);
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Relaxed)
	}
}

pub async fn healthz() -> HttpResponse {
	HttpResponse::Ok().body("ok")
}

pub async fn readyz(state: web::Data<HealthState>) -> HttpResponse {
	if state.is_ready() {
		HttpResponse::Ok().body("ready")
	} else {
		HttpResponse::ServiceUnavailable().body("not-ready")
	}
}
