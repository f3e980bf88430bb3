//! HTTP routes for Seva Records

pub mod admin;
pub mod applications;
pub mod citizens;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod response;

pub use admin::{handle_broadcast, handle_dashboard, require_admin};
pub use applications::{
    handle_application_history, handle_application_payment, handle_get_application,
    handle_list_applications, handle_submit_application, handle_update_status,
};
pub use citizens::{
    handle_create_citizen, handle_delete_citizen, handle_get_citizen, handle_list_citizens,
    handle_update_citizen,
};
pub use health::health_check;
pub use notifications::{
    handle_delete_notification, handle_list_notifications, handle_mark_all_read,
    handle_mark_read, handle_unread_count,
};
pub use payments::{
    handle_create_payment, handle_get_payment, handle_list_payments, handle_update_payment_status,
};
pub use response::{error_response, not_found_response, ApiRequest, HandlerResult};
