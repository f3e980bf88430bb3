//! Application submission and status transitions
//!
//! A transition is three sequential writes with no cross-engine transaction:
//! the application itself, one audit entry, then the notification (if the new status
//! has a template).

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::UnifiedStore;
use crate::models::{
    notification_template, Application, ApplicationStatus, ApplicationUpdate, NewApplication,
    NewNotification, StatusHistoryEntry,
};
use crate::services::{IdGenerator, NotificationService};
use crate::types::{RecordError, RecordId, Result};

/// Actor recorded for transitions the system makes on its own
pub const SYSTEM_ACTOR: &str = "system";

/// Optional list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub citizen_id: Option<String>,
}

impl ApplicationFilter {
    fn matches(&self, application: &Application) -> bool {
        self.status.as_deref().map_or(true, |s| application.status == s)
            && self
                .service_type
                .as_deref()
                .map_or(true, |s| application.service_type.eq_ignore_ascii_case(s))
            && self
                .citizen_id
                .as_deref()
                .map_or(true, |c| application.citizen_id.as_deref() == Some(c))
    }
}

#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<UnifiedStore>,
    notifications: NotificationService,
    ids: Arc<IdGenerator>,
}

impl ApplicationService {
    pub fn new(
        store: Arc<UnifiedStore>,
        notifications: NotificationService,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            store,
            notifications,
            ids,
        }
    }

    /// Store a new application in `submitted`, audit it and notify the applicant
    pub async fn submit(&self, input: NewApplication) -> Result<Application> {
        let service_type = input.service_type.trim().to_string();
        if service_type.is_empty() {
            return Err(RecordError::Validation("service_type is required".into()));
        }

        let application = Application {
            native_id: None,
            application_id: self.ids.application_id(&service_type),
            service_type,
            citizen_id: input.citizen_id.filter(|c| !c.is_empty()),
            applicant_name: input.applicant_name,
            aadhaar_number: input.aadhaar_number,
            phone_number: input.phone_number,
            email: input.email,
            address: input.address,
            date_of_birth: input.date_of_birth,
            gender: input.gender,
            district: input.district,
            pincode: input.pincode,
            status: ApplicationStatus::Submitted.as_str().to_string(),
            license_type: input.license_type,
            remarks: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let stored = self.store.add_application(&application).await?;
        info!(
            application_id = %stored.application_id,
            service_type = %stored.service_type,
            "Application submitted"
        );

        self.record_history(&stored.application_id, None, &stored.status, SYSTEM_ACTOR, None)
            .await?;
        self.notify(&stored).await?;

        Ok(stored)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Application> {
        self.store
            .get_application_by_id(id)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("application {}", id)))
    }

    /// Applications matching `filter`, newest first
    pub async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let mut applications: Vec<Application> = self
            .store
            .get_applications()
            .await?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    /// Move an application to `new_status`
    ///
    /// Any non-empty status is accepted. Exactly one history entry is appended; a
    /// notification is created only when the status has a template.
    pub async fn update_status(
        &self,
        id: &RecordId,
        new_status: &str,
        changed_by: &str,
        reason: Option<String>,
    ) -> Result<Application> {
        let new_status = new_status.trim();
        if new_status.is_empty() {
            return Err(RecordError::Validation("status is required".into()));
        }

        let current = self.get(id).await?;
        let logical = RecordId::logical(current.application_id.clone());

        let update = ApplicationUpdate {
            status: Some(new_status.to_string()),
            remarks: reason.clone(),
            ..Default::default()
        };
        let updated = self
            .store
            .update_application(&logical, &update)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("application {}", id)))?;

        info!(
            application_id = %updated.application_id,
            from = %current.status,
            to = %updated.status,
            changed_by,
            "Application status changed"
        );

        self.record_history(
            &updated.application_id,
            Some(current.status),
            &updated.status,
            changed_by,
            reason,
        )
        .await?;
        self.notify(&updated).await?;

        Ok(updated)
    }

    /// Audit trail of an application, oldest first
    pub async fn history(&self, id: &RecordId) -> Result<Vec<StatusHistoryEntry>> {
        let application = self.get(id).await?;
        let mut entries: Vec<StatusHistoryEntry> = self
            .store
            .find_where("application_id", application.application_id)
            .await?;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn record_history(
        &self,
        application_id: &str,
        old_status: Option<String>,
        new_status: &str,
        changed_by: &str,
        reason: Option<String>,
    ) -> Result<StatusHistoryEntry> {
        let entry = StatusHistoryEntry {
            native_id: None,
            history_id: Uuid::new_v4().to_string(),
            application_id: application_id.to_string(),
            old_status,
            new_status: new_status.to_string(),
            changed_by: changed_by.to_string(),
            reason,
            created_at: String::new(),
        };
        self.store.add(&entry).await
    }

    /// Send the template notification for the application's current status, if any
    async fn notify(&self, application: &Application) -> Result<()> {
        let Some(template) = notification_template(&application.status, &application.application_id)
        else {
            debug!(
                application_id = %application.application_id,
                status = %application.status,
                "No notification template for status"
            );
            return Ok(());
        };

        self.notifications
            .create(NewNotification {
                user_id: Some(application.owner_id()),
                application_id: Some(application.application_id.clone()),
                kind: template.kind,
                category: "application".to_string(),
                title: template.title.to_string(),
                message: template.message,
                action_required: template.action_required,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FlatFileStore;
    use crate::models::{Notification, NotificationType};
    use serde_json::json;
    use tempfile::TempDir;

    async fn service() -> (TempDir, Arc<UnifiedStore>, ApplicationService) {
        let dir = TempDir::new().unwrap();
        let fallback = Arc::new(FlatFileStore::open(dir.path()).await.unwrap());
        let store = Arc::new(UnifiedStore::flat_file_only(fallback));
        let notifications = NotificationService::new(store.clone());
        let service = ApplicationService::new(store.clone(), notifications, Arc::new(IdGenerator::new()));
        (dir, store, service)
    }

    fn driving_license() -> NewApplication {
        serde_json::from_value(json!({
            "service_type": "DL",
            "citizen_id": "CIT1",
            "name": "Ravi Shankar",
            "phone_number": "9876543210",
            "district": "Mysuru",
            "license_type": "LMV",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_records_history_and_notification() {
        let (_dir, store, service) = service().await;
        let app = service.submit(driving_license()).await.unwrap();

        assert!(app.application_id.starts_with("DL"));
        assert_eq!(app.status, "submitted");
        assert_eq!(app.applicant_name, "Ravi Shankar");

        let history = service.history(&RecordId::logical(&app.application_id)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_status, None);
        assert_eq!(history[0].new_status, "submitted");
        assert_eq!(history[0].changed_by, SYSTEM_ACTOR);

        let notifications: Vec<Notification> = store.list().await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Application Submitted");
        assert_eq!(notifications[0].user_id.as_deref(), Some("CIT1"));
    }

    #[tokio::test]
    async fn test_numeric_service_type_stays_addressable() {
        let (_dir, _store, service) = service().await;
        let input = serde_json::from_value(json!({
            "service_type": "7",
            "phone_number": "9000000007",
        }))
        .unwrap();
        let app = service.submit(input).await.unwrap();
        assert!(app.application_id.starts_with("APP"));

        let id = RecordId::parse(&app.application_id);
        assert_eq!(service.get(&id).await.unwrap().application_id, app.application_id);
        service.update_status(&id, "under_review", "admin7", None).await.unwrap();
        assert_eq!(service.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transition_appends_one_entry() {
        let (_dir, store, service) = service().await;
        let app = service.submit(driving_license()).await.unwrap();
        let id = RecordId::logical(&app.application_id);

        let approved = service
            .update_status(&id, "approved", "admin7", Some("All documents verified".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, "approved");
        assert_eq!(approved.remarks.as_deref(), Some("All documents verified"));
        assert_eq!(approved.service_type, app.service_type);

        let history = service.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].old_status.as_deref(), Some("submitted"));
        assert_eq!(history[1].new_status, "approved");
        assert_eq!(history[1].changed_by, "admin7");

        let notifications: Vec<Notification> = store.list().await.unwrap();
        let approval = notifications
            .iter()
            .find(|n| n.title == "Application Approved")
            .unwrap();
        assert_eq!(approval.kind, NotificationType::Success);
    }

    #[tokio::test]
    async fn test_unknown_status_audited_without_notification() {
        let (_dir, store, service) = service().await;
        let app = service.submit(driving_license()).await.unwrap();
        let id = RecordId::logical(&app.application_id);

        service.update_status(&id, "archived", "admin", None).await.unwrap();

        assert_eq!(service.history(&id).await.unwrap().len(), 2);
        let notifications: Vec<Notification> = store.list().await.unwrap();
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_status_and_missing_application() {
        let (_dir, _store, service) = service().await;
        let app = service.submit(driving_license()).await.unwrap();

        let err = service
            .update_status(&RecordId::logical(&app.application_id), "  ", "admin", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Validation(_)));

        let err = service
            .update_status(&RecordId::logical("DL0"), "approved", "admin", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (_dir, _store, service) = service().await;
        let dl = service.submit(driving_license()).await.unwrap();
        let mut birth = driving_license();
        birth.service_type = "birth_certificate".into();
        let bc = service.submit(birth).await.unwrap();
        assert!(bc.application_id.starts_with("BC"));

        service
            .update_status(&RecordId::logical(&dl.application_id), "under_review", "admin", None)
            .await
            .unwrap();

        let reviewing = service
            .list(&ApplicationFilter {
                status: Some("under_review".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reviewing.len(), 1);
        assert_eq!(reviewing[0].application_id, dl.application_id);

        let all = service.list(&ApplicationFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
