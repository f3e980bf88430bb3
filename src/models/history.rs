//! Append-only audit trail of application status changes

use serde::{Deserialize, Serialize};

use crate::db::Collection;
use crate::models::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    pub history_id: String,
    pub application_id: String,
    /// `None` for the submission entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl Entity for StatusHistoryEntry {
    const COLLECTION: Collection = Collection::StatusHistory;

    fn logical_id(&self) -> &str {
        &self.history_id
    }
}
