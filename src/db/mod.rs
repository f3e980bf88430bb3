//! Storage engines and the unified record store
//!
//! ## Engines (highest priority first)
//!
//! - **MongoDB** (`mongo`): typed collections with indexes
//! - **Firestore** (`firestore`): cloud document store over the REST API
//! - **SQLite** (`sqlite`): relational tables, only used when neither of the above is configured
//! - **Flat file** (`flatfile`): one JSON document per collection, fallback of last resort
//!
//! Every engine stores schemaless [`Record`]s keyed by [`Collection`]; the typed entities
//! in [`crate::models`] convert to and from records at the [`UnifiedStore`] boundary.

pub mod firestore;
pub mod flatfile;
pub mod hybrid;
pub mod mongo;
pub mod schemas;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::types::{RecordId, Result};

pub use firestore::{FirestoreConfig, FirestoreEngine};
pub use flatfile::FlatFileStore;
pub use hybrid::{resolve_engines, MongoSettings, StoreConfig, UnifiedStore};
pub use mongo::{MongoClient, MongoEngine};
pub use sqlite::SqliteEngine;

/// A stored record: field name to JSON value.
///
/// The engine-native identifier, when one exists, is carried as a string under `_id`.
pub type Record = Map<String, Value>;

/// Field holding the engine-native identifier
pub const NATIVE_ID_FIELD: &str = "_id";

/// Entity collections known to every engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Citizens,
    Applications,
    Payments,
    Notifications,
    StatusHistory,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Citizens,
        Collection::Applications,
        Collection::Payments,
        Collection::Notifications,
        Collection::StatusHistory,
    ];

    /// Collection / table / file name
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Citizens => "citizens",
            Collection::Applications => "applications",
            Collection::Payments => "payments",
            Collection::Notifications => "notifications",
            Collection::StatusHistory => "status_history",
        }
    }

    /// Field holding the logical identifier
    pub fn logical_id_field(&self) -> &'static str {
        match self {
            Collection::Citizens => "citizen_id",
            Collection::Applications => "application_id",
            Collection::Payments => "payment_id",
            Collection::Notifications => "notification_id",
            Collection::StatusHistory => "history_id",
        }
    }

    /// Fields other than the logical id that must be unique within one engine.
    /// Empty strings are exempt.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Citizens => &["email"],
            Collection::Payments => &["application_id"],
            _ => &[],
        }
    }

    /// Whether records in this collection carry an `updated_at` timestamp
    pub fn tracks_updates(&self) -> bool {
        !matches!(self, Collection::Notifications | Collection::StatusHistory)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which engine served (or would serve) a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Mongo,
    Firestore,
    Sqlite,
    FlatFile,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Mongo => "mongodb",
            EngineKind::Firestore => "firestore",
            EngineKind::Sqlite => "sqlite",
            EngineKind::FlatFile => "flat_file",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRUD contract every storage engine implements
///
/// Lookups return `Ok(None)` / `Ok(false)` when nothing matches; errors are reserved for
/// engine failures and constraint violations.
#[async_trait]
pub trait RecordEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Insert a record and return it as stored, including any native id under `_id`
    async fn insert(&self, collection: Collection, record: Record) -> Result<Record>;

    /// Find one record by logical or native id
    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>>;

    /// Find all records whose `field` equals `value`
    async fn find_where(&self, collection: Collection, field: &str, value: &Value)
        -> Result<Vec<Record>>;

    /// List every record in a collection
    async fn list(&self, collection: Collection) -> Result<Vec<Record>>;

    /// Merge `patch` into the matching record and return the result
    async fn update(&self, collection: Collection, id: &RecordId, patch: Record)
        -> Result<Option<Record>>;

    /// Remove the matching record
    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool>;
}

/// Current time as an RFC 3339 UTC string
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Whether a record's field holds `expected`, comparing numbers and strings loosely
/// so a numeric native id matches its string form.
pub fn field_matches(record: &Record, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        _ => false,
    }
}

/// Read a string field
pub fn str_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_matches_numbers_and_strings() {
        let record = json!({ "id": 7, "citizen_id": "CIT1" })
            .as_object()
            .cloned()
            .unwrap();
        assert!(field_matches(&record, "id", "7"));
        assert!(field_matches(&record, "citizen_id", "CIT1"));
        assert!(!field_matches(&record, "citizen_id", "CIT2"));
        assert!(!field_matches(&record, "missing", "x"));
    }

    #[test]
    fn test_collection_metadata() {
        assert_eq!(Collection::Payments.logical_id_field(), "payment_id");
        assert_eq!(Collection::StatusHistory.name(), "status_history");
        assert!(Collection::Citizens.tracks_updates());
        assert!(!Collection::Notifications.tracks_updates());
        assert_eq!(Collection::Citizens.unique_fields(), &["email"]);
        assert_eq!(Collection::Payments.unique_fields(), &["application_id"]);
    }
}
