use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

/// Flipped once every watch cache has completed its initial listing.
#[derive(Clone, Default)]
pub struct CacheSynced(Arc<AtomicBool>);

impl CacheSynced {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_synced(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub async fn healthz_handler(State(synced): State<CacheSynced>) -> (StatusCode, &'static str) {
    if synced.is_synced() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
    }
}

pub fn probe_router(recorder_handle: PrometheusHandle, synced: CacheSynced) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .with_state(synced)
}
