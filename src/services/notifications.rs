//! Notification service
//!
//! Notifications are addressed to one user (`user_id`) or broadcast to everyone
//! (`user_id` absent). A user's inbox is their own rows plus every broadcast.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::UnifiedStore;
use crate::models::{NewNotification, Notification, NotificationType};
use crate::types::{RecordError, RecordId, Result};

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<UnifiedStore>,
}

impl NotificationService {
    pub fn new(store: Arc<UnifiedStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: NewNotification) -> Result<Notification> {
        if input.title.trim().is_empty() {
            return Err(RecordError::Validation("title is required".into()));
        }

        let notification = Notification {
            native_id: None,
            notification_id: Uuid::new_v4().to_string(),
            user_id: input.user_id,
            application_id: input.application_id,
            kind: input.kind,
            category: input.category,
            title: input.title,
            message: input.message,
            is_read: false,
            action_required: input.action_required,
            created_at: String::new(),
        };

        let stored = self.store.add(&notification).await?;
        debug!(
            notification_id = %stored.notification_id,
            user_id = ?stored.user_id,
            "Notification created"
        );
        Ok(stored)
    }

    /// Admin broadcast to every user
    pub async fn broadcast(&self, title: &str, message: &str, category: &str) -> Result<Notification> {
        let stored = self
            .create(NewNotification {
                user_id: None,
                application_id: None,
                kind: NotificationType::System,
                category: category.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                action_required: false,
            })
            .await?;
        info!(notification_id = %stored.notification_id, "Broadcast sent");
        Ok(stored)
    }

    /// Rows addressed to the user plus broadcasts, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut visible: Vec<Notification> = self
            .store
            .list::<Notification>()
            .await?
            .into_iter()
            .filter(|n| n.is_visible_to(user_id))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible)
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .list_for_user(user_id)
            .await?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }

    pub async fn mark_read(&self, id: &RecordId) -> Result<Notification> {
        self.store
            .update::<Notification, _>(id, &json!({ "is_read": true }))
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("notification {}", id)))
    }

    /// Mark every unread notification in the user's inbox as read; returns how many changed
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        let unread: Vec<Notification> = self
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.is_read)
            .collect();

        let mut changed = 0;
        for notification in unread {
            let id = RecordId::logical(notification.notification_id);
            if self
                .store
                .update::<Notification, _>(&id, &json!({ "is_read": true }))
                .await?
                .is_some()
            {
                changed += 1;
            }
        }
        debug!(user_id, changed, "Marked notifications read");
        Ok(changed)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<bool> {
        self.store.delete::<Notification>(id).await
    }
}
