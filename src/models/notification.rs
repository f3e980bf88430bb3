//! User and broadcast notifications

use serde::{Deserialize, Serialize};

use crate::db::Collection;
use crate::models::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Error,
    System,
}

/// Notification row. `user_id == None` means a broadcast to everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    pub notification_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default)]
    pub category: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub action_required: bool,
    #[serde(default)]
    pub created_at: String,
}

impl Notification {
    /// Whether `user_id` should see this notification
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.user_id.as_deref().map_or(true, |owner| owner == user_id)
    }
}

impl Entity for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn logical_id(&self) -> &str {
        &self.notification_id
    }
}

/// Input for creating a notification
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNotification {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default = "default_category")]
    pub category: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action_required: bool,
}

fn default_category() -> String {
    "general".to_string()
}
