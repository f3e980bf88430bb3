//! Application endpoints
//!
//! - `GET /api/applications` - List (`status`, `service_type`, `citizen_id` filters)
//! - `POST /api/applications` - Submit
//! - `GET /api/applications/{id}` - Get
//! - `GET /api/applications/{id}/history` - Status history, oldest first
//! - `PUT /api/applications/{id}/status` - Transition (admin)
//! - `GET /api/applications/{id}/payment` - Payment for the application

use serde::Deserialize;

use crate::models::NewApplication;
use crate::routes::admin::require_admin;
use crate::routes::response::{created, ok, page, ApiRequest, HandlerResult, Pagination};
use crate::server::AppState;
use crate::services::ApplicationFilter;
use crate::types::RecordId;

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
    #[serde(default, alias = "remarks")]
    reason: Option<String>,
}

pub async fn handle_list_applications(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let filter: ApplicationFilter = req.query()?;
    let pagination: Pagination = req.query()?;
    let applications = state.services.applications.list(&filter).await?;
    page(applications, pagination)
}

pub async fn handle_submit_application(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let input: NewApplication = req.json()?;
    let application = state.services.applications.submit(input).await?;
    created(&application)
}

pub async fn handle_get_application(state: &AppState, id: &str) -> HandlerResult {
    let application = state.services.applications.get(&RecordId::parse(id)).await?;
    ok(&application)
}

pub async fn handle_application_history(state: &AppState, id: &str) -> HandlerResult {
    let history = state.services.applications.history(&RecordId::parse(id)).await?;
    ok(&history)
}

pub async fn handle_update_status(state: &AppState, req: &ApiRequest, id: &str) -> HandlerResult {
    let admin_id = require_admin(state, req)?;
    let request: StatusRequest = req.json()?;

    let application = state
        .services
        .applications
        .update_status(&RecordId::parse(id), &request.status, &admin_id, request.reason)
        .await?;
    ok(&application)
}

pub async fn handle_application_payment(state: &AppState, id: &str) -> HandlerResult {
    let payment = state
        .services
        .payments
        .get_for_application(&RecordId::parse(id))
        .await?;
    ok(&payment)
}
