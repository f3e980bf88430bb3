//! SQLite schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::db::Collection;
use crate::types::{RecordError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Storage class of a column, used to map JSON values in and out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Real,
    Bool,
}

use ColumnType::{Bool, Real, Text};

const CITIZEN_COLUMNS: &[(&str, ColumnType)] = &[
    ("citizen_id", Text),
    ("name", Text),
    ("name_kannada", Text),
    ("aadhaar_number", Text),
    ("phone_number", Text),
    ("email", Text),
    ("date_of_birth", Text),
    ("gender", Text),
    ("address", Text),
    ("address_kannada", Text),
    ("district", Text),
    ("pincode", Text),
    ("state", Text),
    ("status", Text),
    ("created_at", Text),
    ("updated_at", Text),
];

const APPLICATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("application_id", Text),
    ("service_type", Text),
    ("citizen_id", Text),
    ("applicant_name", Text),
    ("aadhaar_number", Text),
    ("phone_number", Text),
    ("email", Text),
    ("address", Text),
    ("date_of_birth", Text),
    ("gender", Text),
    ("district", Text),
    ("pincode", Text),
    ("status", Text),
    ("license_type", Text),
    ("remarks", Text),
    ("created_at", Text),
    ("updated_at", Text),
];

const PAYMENT_COLUMNS: &[(&str, ColumnType)] = &[
    ("payment_id", Text),
    ("application_id", Text),
    ("amount", Real),
    ("payment_method", Text),
    ("transaction_id", Text),
    ("status", Text),
    ("failure_reason", Text),
    ("refund_id", Text),
    ("created_at", Text),
    ("updated_at", Text),
];

const NOTIFICATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("notification_id", Text),
    ("user_id", Text),
    ("application_id", Text),
    ("type", Text),
    ("category", Text),
    ("title", Text),
    ("message", Text),
    ("is_read", Bool),
    ("action_required", Bool),
    ("created_at", Text),
];

const HISTORY_COLUMNS: &[(&str, ColumnType)] = &[
    ("history_id", Text),
    ("application_id", Text),
    ("old_status", Text),
    ("new_status", Text),
    ("changed_by", Text),
    ("reason", Text),
    ("created_at", Text),
];

/// Data columns of a table, excluding the integer `id` primary key
pub fn columns(collection: Collection) -> &'static [(&'static str, ColumnType)] {
    match collection {
        Collection::Citizens => CITIZEN_COLUMNS,
        Collection::Applications => APPLICATION_COLUMNS,
        Collection::Payments => PAYMENT_COLUMNS,
        Collection::Notifications => NOTIFICATION_COLUMNS,
        Collection::StatusHistory => HISTORY_COLUMNS,
    }
}

/// Type of a named column, if the table has it
pub fn column_type(collection: Collection, name: &str) -> Option<ColumnType> {
    columns(collection)
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, ty)| *ty)
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| RecordError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| RecordError::Database(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| RecordError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(TABLES_SCHEMA)
        .map_err(|e| RecordError::Database(format!("Failed to create tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| RecordError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

const TABLES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS citizens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    citizen_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    name_kannada TEXT,
    aadhaar_number TEXT NOT NULL DEFAULT '',
    phone_number TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    date_of_birth TEXT NOT NULL DEFAULT '',
    gender TEXT NOT NULL DEFAULT 'other' CHECK (gender IN ('male', 'female', 'other')),
    address TEXT NOT NULL DEFAULT '',
    address_kannada TEXT,
    district TEXT NOT NULL DEFAULT '',
    pincode TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT 'Karnataka',
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    application_id TEXT NOT NULL UNIQUE,
    service_type TEXT NOT NULL,
    citizen_id TEXT,
    applicant_name TEXT NOT NULL DEFAULT '',
    aadhaar_number TEXT NOT NULL DEFAULT '',
    phone_number TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    date_of_birth TEXT NOT NULL DEFAULT '',
    gender TEXT,
    district TEXT NOT NULL DEFAULT '',
    pincode TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'submitted',
    license_type TEXT,
    remarks TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id TEXT NOT NULL UNIQUE,
    application_id TEXT NOT NULL,
    amount REAL NOT NULL CHECK (amount > 0),
    payment_method TEXT NOT NULL DEFAULT '',
    transaction_id TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'success', 'failed', 'refunded', 'processing')),
    failure_reason TEXT,
    refund_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    notification_id TEXT NOT NULL UNIQUE,
    user_id TEXT,
    application_id TEXT,
    type TEXT NOT NULL DEFAULT 'info' CHECK (type IN ('info', 'success', 'error', 'system')),
    category TEXT NOT NULL DEFAULT 'general',
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    action_required INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS status_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    history_id TEXT NOT NULL UNIQUE,
    application_id TEXT NOT NULL,
    old_status TEXT,
    new_status TEXT NOT NULL,
    changed_by TEXT NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_citizens_email ON citizens(email) WHERE email != '';
CREATE INDEX IF NOT EXISTS idx_citizens_aadhaar ON citizens(aadhaar_number);
CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
CREATE INDEX IF NOT EXISTS idx_applications_citizen ON applications(citizen_id);
DROP INDEX IF EXISTS idx_payments_application;
CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_application_unique ON payments(application_id);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_history_application ON status_history(application_id, created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('citizens', 'applications', 'payments', 'notifications', 'status_history')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn test_logical_id_is_first_column() {
        for collection in Collection::ALL {
            assert_eq!(columns(collection)[0].0, collection.logical_id_field());
        }
        assert_eq!(column_type(Collection::Payments, "amount"), Some(ColumnType::Real));
        assert_eq!(column_type(Collection::Notifications, "is_read"), Some(ColumnType::Bool));
        assert_eq!(column_type(Collection::Citizens, "unknown"), None);
    }
}
