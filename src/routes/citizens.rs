//! Citizen endpoints
//!
//! - `GET /api/citizens` - List (optional `district`, `status`, pagination)
//! - `POST /api/citizens` - Register
//! - `GET /api/citizens/{id}` - Get by citizen id or native id
//! - `PUT /api/citizens/{id}` - Partial update
//! - `DELETE /api/citizens/{id}` - Delete (admin)

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::{Citizen, CitizenStatus, CitizenUpdate, NewCitizen};
use crate::routes::admin::require_admin;
use crate::routes::response::{created, ok, page, ApiRequest, HandlerResult, Pagination};
use crate::server::AppState;
use crate::types::{RecordError, RecordId};

#[derive(Debug, Default, Deserialize)]
struct CitizenQuery {
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    status: Option<CitizenStatus>,
}

pub async fn handle_list_citizens(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let query: CitizenQuery = req.query()?;
    let pagination: Pagination = req.query()?;

    let mut citizens: Vec<Citizen> = state
        .store
        .get_citizens()
        .await?
        .into_iter()
        .filter(|c| {
            query
                .district
                .as_deref()
                .map_or(true, |d| c.district.eq_ignore_ascii_case(d))
                && query.status.map_or(true, |s| c.status == s)
        })
        .collect();
    citizens.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    page(citizens, pagination)
}

pub async fn handle_create_citizen(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let input: NewCitizen = req.json()?;
    if input.name.trim().is_empty() {
        return Err(RecordError::Validation("name is required".into()));
    }
    if input.phone_number.trim().is_empty() {
        return Err(RecordError::Validation("phone_number is required".into()));
    }

    let citizen = Citizen::new(state.services.ids.citizen_id(), input);
    let stored = state.store.add_citizen(&citizen).await?;
    info!(citizen_id = %stored.citizen_id, district = %stored.district, "Citizen registered");
    created(&stored)
}

pub async fn handle_get_citizen(state: &AppState, id: &str) -> HandlerResult {
    let id = RecordId::parse(id);
    let citizen = state
        .store
        .get_citizen_by_id(&id)
        .await?
        .ok_or_else(|| RecordError::NotFound(format!("citizen {}", id)))?;
    ok(&citizen)
}

pub async fn handle_update_citizen(state: &AppState, req: &ApiRequest, id: &str) -> HandlerResult {
    let id = RecordId::parse(id);
    let update: CitizenUpdate = req.json()?;

    let citizen = state
        .store
        .update_citizen(&id, &update)
        .await?
        .ok_or_else(|| RecordError::NotFound(format!("citizen {}", id)))?;
    ok(&citizen)
}

pub async fn handle_delete_citizen(state: &AppState, req: &ApiRequest, id: &str) -> HandlerResult {
    let admin_id = require_admin(state, req)?;
    let id = RecordId::parse(id);

    if !state.store.delete_citizen(&id).await? {
        return Err(RecordError::NotFound(format!("citizen {}", id)));
    }
    info!(id = %id, admin_id = %admin_id, "Citizen deleted");
    ok(&json!({ "deleted": true }))
}
