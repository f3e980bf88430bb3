//! Payment endpoints
//!
//! - `GET /api/payments` - List
//! - `POST /api/payments` - Pay for an application (409 with `payment_id` if already paid)
//! - `GET /api/payments/{id}` - Get
//! - `PUT /api/payments/{id}/status` - Gateway-callback style status change

use crate::models::{NewPayment, PaymentUpdate};
use crate::routes::response::{created, ok, page, ApiRequest, HandlerResult, Pagination};
use crate::server::AppState;
use crate::types::{RecordError, RecordId};

pub async fn handle_list_payments(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let pagination: Pagination = req.query()?;
    let payments = state.services.payments.list().await?;
    page(payments, pagination)
}

pub async fn handle_create_payment(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let input: NewPayment = req.json()?;
    let payment = state.services.payments.add_payment(input).await?;
    created(&payment)
}

pub async fn handle_get_payment(state: &AppState, id: &str) -> HandlerResult {
    let payment = state.services.payments.get(&RecordId::parse(id)).await?;
    ok(&payment)
}

pub async fn handle_update_payment_status(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> HandlerResult {
    let update: PaymentUpdate = req.json()?;
    if update.status.is_none() {
        return Err(RecordError::Validation("status is required".into()));
    }

    let payment = state
        .services
        .payments
        .update_payment_status(&RecordId::parse(id), update)
        .await?;
    ok(&payment)
}
