//! Service applications and their status state machine
//!
//! ```text
//! submitted -> under_review -> { document_required <-> under_review } -> { approved | rejected } -> completed
//! ```
//!
//! `payment_received` is entered from a successful payment in any state; `on_hold` and
//! `processing` are set by admins. No transition table is enforced: any non-empty
//! status is accepted and audited.

use serde::{Deserialize, Serialize};

use crate::db::Collection;
use crate::models::{Entity, Gender, NotificationType};

/// Known application statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    DocumentRequired,
    Approved,
    Rejected,
    Completed,
    PaymentReceived,
    OnHold,
    Processing,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 9] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::DocumentRequired,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Completed,
        ApplicationStatus::PaymentReceived,
        ApplicationStatus::OnHold,
        ApplicationStatus::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::DocumentRequired => "document_required",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::PaymentReceived => "payment_received",
            ApplicationStatus::OnHold => "on_hold",
            ApplicationStatus::Processing => "processing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// `rejected` and `completed` end the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Completed)
    }
}

/// Notification generated when an application enters a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub title: &'static str,
    pub message: String,
    pub kind: NotificationType,
    pub action_required: bool,
}

/// Fixed lookup of notifications per new status. Unrecognized statuses get none.
pub fn notification_template(status: &str, application_id: &str) -> Option<NotificationTemplate> {
    let status = ApplicationStatus::parse(status)?;
    let (title, body, kind, action_required) = match status {
        ApplicationStatus::Submitted => (
            "Application Submitted",
            "has been submitted successfully.",
            NotificationType::Info,
            false,
        ),
        ApplicationStatus::UnderReview => (
            "Application Under Review",
            "is now under review by the department.",
            NotificationType::Info,
            false,
        ),
        ApplicationStatus::DocumentRequired => (
            "Documents Required",
            "needs additional documents. Please upload them to continue.",
            NotificationType::Info,
            true,
        ),
        ApplicationStatus::Approved => (
            "Application Approved",
            "has been approved.",
            NotificationType::Success,
            false,
        ),
        ApplicationStatus::Rejected => (
            "Application Rejected",
            "has been rejected. See the remarks for details.",
            NotificationType::Error,
            false,
        ),
        ApplicationStatus::Completed => (
            "Application Completed",
            "has been completed. Your document is ready.",
            NotificationType::Success,
            false,
        ),
        ApplicationStatus::PaymentReceived => (
            "Payment Successful",
            "payment has been received.",
            NotificationType::Success,
            false,
        ),
        ApplicationStatus::OnHold => (
            "Application On Hold",
            "has been put on hold.",
            NotificationType::Info,
            false,
        ),
        ApplicationStatus::Processing => (
            "Application Processing",
            "is being processed.",
            NotificationType::Info,
            false,
        ),
    };

    Some(NotificationTemplate {
        title,
        message: format!("Your application {} {}", application_id, body),
        kind,
        action_required,
    })
}

/// Application record. Applicant fields are a snapshot taken at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    pub application_id: String,
    pub service_type: String,
    /// Registered citizen who submitted, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizen_id: Option<String>,
    #[serde(default)]
    pub applicant_name: String,
    #[serde(default)]
    pub aadhaar_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub pincode: String,
    /// Free-form so unknown statuses survive a round trip
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Application {
    /// Recipient of notifications about this application
    pub fn owner_id(&self) -> String {
        self.citizen_id
            .clone()
            .unwrap_or_else(|| self.phone_number.clone())
    }
}

impl Entity for Application {
    const COLLECTION: Collection = Collection::Applications;

    fn logical_id(&self) -> &str {
        &self.application_id
    }
}

/// Submission payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub service_type: String,
    #[serde(default)]
    pub citizen_id: Option<String>,
    #[serde(default, alias = "name")]
    pub applicant_name: String,
    #[serde(default)]
    pub aadhaar_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub license_type: Option<String>,
}

/// Mutable application fields; the applicant snapshot is not among them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for status in ApplicationStatus::ALL {
            assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApplicationStatus::parse("archived"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::Completed.is_terminal());
        assert!(!ApplicationStatus::Approved.is_terminal());
        assert!(!ApplicationStatus::OnHold.is_terminal());
    }

    #[test]
    fn test_templates() {
        let approved = notification_template("approved", "DL1").unwrap();
        assert_eq!(approved.title, "Application Approved");
        assert_eq!(approved.kind, NotificationType::Success);
        assert!(approved.message.contains("DL1"));

        let docs = notification_template("document_required", "DL1").unwrap();
        assert!(docs.action_required);

        let paid = notification_template("payment_received", "DL1").unwrap();
        assert_eq!(paid.kind, NotificationType::Success);

        assert!(notification_template("archived", "DL1").is_none());
        assert!(notification_template("", "DL1").is_none());
    }
}
