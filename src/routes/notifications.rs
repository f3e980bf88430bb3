//! Notification endpoints
//!
//! - `GET /api/notifications?user_id=` - Inbox (own rows plus broadcasts), newest first
//! - `GET /api/notifications/unread-count?user_id=`
//! - `PUT /api/notifications/{id}/read`
//! - `PUT /api/notifications/read-all?user_id=`
//! - `DELETE /api/notifications/{id}`

use serde_json::json;

use crate::routes::response::{ok, page, ApiRequest, HandlerResult, Pagination};
use crate::server::AppState;
use crate::types::{RecordError, RecordId};

pub async fn handle_list_notifications(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let user_id = req.query_param("user_id")?;
    let pagination: Pagination = req.query()?;
    let notifications = state.services.notifications.list_for_user(&user_id).await?;
    page(notifications, pagination)
}

pub async fn handle_unread_count(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let user_id = req.query_param("user_id")?;
    let count = state.services.notifications.unread_count(&user_id).await?;
    ok(&json!({ "user_id": user_id, "unread_count": count }))
}

pub async fn handle_mark_read(state: &AppState, id: &str) -> HandlerResult {
    let notification = state
        .services
        .notifications
        .mark_read(&RecordId::parse(id))
        .await?;
    ok(&notification)
}

pub async fn handle_mark_all_read(state: &AppState, req: &ApiRequest) -> HandlerResult {
    let user_id = req.query_param("user_id")?;
    let updated = state.services.notifications.mark_all_read(&user_id).await?;
    ok(&json!({ "user_id": user_id, "updated": updated }))
}

pub async fn handle_delete_notification(state: &AppState, id: &str) -> HandlerResult {
    let id = RecordId::parse(id);
    if !state.services.notifications.delete(&id).await? {
        return Err(RecordError::NotFound(format!("notification {}", id)));
    }
    ok(&json!({ "deleted": true }))
}
