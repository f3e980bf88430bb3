//! Admin endpoints
//!
//! ## Endpoints
//!
//! - `POST /admin/notifications/broadcast` - Notify every user
//! - `GET /admin/dashboard` - Totals, applications by status, revenue
//!
//! ## Authentication
//!
//! Admin requests carry `X-Api-Key` matching `API_KEY_ADMIN`. The acting admin is
//! taken from `X-Admin-Id` (default `admin`) and recorded as `changed_by`.
//! Dev mode skips the key check.

use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::routes::response::{created, ok, ApiRequest, HandlerResult};
use crate::server::AppState;
use crate::types::{RecordError, Result};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ADMIN_ID_HEADER: &str = "x-admin-id";
const DEFAULT_ADMIN_ID: &str = "admin";

/// Validate admin access and return the acting admin id
pub fn require_admin(state: &AppState, req: &ApiRequest) -> Result<String> {
    let admin_id = req
        .header(ADMIN_ID_HEADER)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(DEFAULT_ADMIN_ID)
        .to_string();

    if state.args.dev_mode {
        return Ok(admin_id);
    }

    let expected = state
        .args
        .api_key_admin
        .as_deref()
        .ok_or_else(|| RecordError::Unauthorized("Admin access not configured".into()))?;

    match req.header(API_KEY_HEADER) {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => Ok(admin_id),
        Some(_) => Err(RecordError::Unauthorized("Invalid API key".into())),
        None => Err(RecordError::Unauthorized("No API key provided".into())),
    }
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    title: String,
    message: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_category() -> String {
    "announcement".to_string()
}

pub async fn handle_broadcast(state: &AppState, req: &ApiRequest) -> HandlerResult {
    require_admin(state, req)?;
    let request: BroadcastRequest = req.json()?;

    let notification = state
        .services
        .notifications
        .broadcast(&request.title, &request.message, &request.category)
        .await?;
    created(&notification)
}

pub async fn handle_dashboard(state: &AppState, req: &ApiRequest) -> HandlerResult {
    require_admin(state, req)?;
    let stats = state.services.dashboard.stats().await?;
    ok(&stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::db::{FlatFileStore, UnifiedStore};
    use clap::Parser;
    use hyper::Method;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn state(flags: &[&str]) -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let mut argv = vec!["seva-records"];
        argv.extend_from_slice(flags);
        let args = Args::try_parse_from(argv).unwrap();
        let fallback = Arc::new(FlatFileStore::open(dir.path()).await.unwrap());
        let store = Arc::new(UnifiedStore::flat_file_only(fallback));
        (dir, AppState::new(args, store))
    }

    fn request(key: Option<&str>) -> ApiRequest {
        let req = ApiRequest::new(Method::GET, "/admin/dashboard", "");
        match key {
            Some(key) => req.with_header(API_KEY_HEADER, key),
            None => req,
        }
    }

    #[tokio::test]
    async fn test_admin_key_must_match_exactly() {
        let (_dir, state) = state(&["--api-key-admin", "s3cret"]).await;

        assert_eq!(require_admin(&state, &request(Some("s3cret"))).unwrap(), "admin");
        for key in [Some("s3cre"), Some("s3cret!"), Some("S3CRET"), Some(""), None] {
            let err = require_admin(&state, &request(key)).unwrap_err();
            assert!(matches!(err, RecordError::Unauthorized(_)));
        }
    }

    #[tokio::test]
    async fn test_admin_id_header_and_dev_mode() {
        let (_dir, state) = state(&["--dev-mode"]).await;
        let req = request(None).with_header(ADMIN_ID_HEADER, "officer-7");
        assert_eq!(require_admin(&state, &req).unwrap(), "officer-7");
    }
}
