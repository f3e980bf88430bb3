//! Health check endpoint
//!
//! `/health` returns 200 while the process is up and reports the engine chain resolved
//! at startup. The flat file is always last, so the service is never without storage.

use chrono::Utc;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::db::EngineKind;
use crate::routes::response::{json_response, FullBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Engine serving requests while reachable
    pub primary: EngineKind,
    /// Resolved chain, highest priority first
    pub engines: Vec<EngineKind>,
    pub mode: &'static str,
    pub timestamp: String,
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        primary: state.store.primary(),
        engines: state.store.engine_status(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        timestamp: Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}
