//! SQLite record engine
//!
//! Relational engine with one table per collection. The integer primary key `id` is
//! the native identifier. Only takes the primary slot when neither MongoDB nor
//! Firestore is configured.
//!
//! ## Tables
//!
//! - `citizens`, `applications`, `payments` - entity rows
//! - `notifications` - per-user and broadcast messages
//! - `status_history` - append-only application audit trail

pub mod schema;

use async_trait::async_trait;
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, ErrorCode, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::db::{Collection, EngineKind, Record, RecordEngine, NATIVE_ID_FIELD};
use crate::types::{RecordError, RecordId, Result};
use schema::ColumnType;

/// Record engine backed by a single SQLite connection
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| RecordError::Unavailable(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| RecordError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            RecordError::Unavailable(format!("Failed to open in-memory SQLite: {}", e))
        })?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| RecordError::Internal(format!("Lock poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| RecordError::Internal(format!("SQLite task failed: {}", e)))?
    }
}

fn map_error(context: &str, e: rusqlite::Error) -> RecordError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            RecordError::Constraint(format!(
                "{}: {}",
                context,
                msg.clone().unwrap_or_else(|| err.to_string())
            ))
        }
        other => RecordError::Database(format!("{}: {}", context, other)),
    }
}

fn to_sql(value: &Value, ty: ColumnType) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (ty, n.as_i64()) {
            (ColumnType::Real, _) | (_, None) => SqlValue::Real(n.as_f64().unwrap_or_default()),
            (_, Some(i)) => SqlValue::Integer(i),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Read a row into a record. NULL columns are left out so optional fields stay absent.
fn from_row(collection: Collection, row: &Row) -> rusqlite::Result<Record> {
    let mut record = Record::new();

    let id: i64 = row.get("id")?;
    record.insert(NATIVE_ID_FIELD.to_string(), Value::String(id.to_string()));

    for (name, ty) in schema::columns(collection) {
        let value = match ty {
            ColumnType::Text => row.get::<_, Option<String>>(*name)?.map(Value::String),
            ColumnType::Real => row.get::<_, Option<f64>>(*name)?.map(Value::from),
            ColumnType::Bool => row.get::<_, Option<i64>>(*name)?.map(|v| Value::Bool(v != 0)),
        };
        if let Some(value) = value {
            record.insert(name.to_string(), value);
        }
    }

    Ok(record)
}

/// WHERE clause selecting one row, or `None` if the id cannot exist in this engine
fn id_clause(collection: Collection, id: &RecordId) -> Option<(String, SqlValue)> {
    match id {
        RecordId::Logical(s) => Some((
            format!("{} = ?", collection.logical_id_field()),
            SqlValue::Text(s.clone()),
        )),
        RecordId::Native(s) => s
            .parse::<i64>()
            .ok()
            .map(|n| ("id = ?".to_string(), SqlValue::Integer(n))),
    }
}

/// Known columns present in `record`, with their SQL values
fn bind_columns(collection: Collection, record: &Record) -> Vec<(&'static str, SqlValue)> {
    schema::columns(collection)
        .iter()
        .filter_map(|(name, ty)| record.get(*name).map(|v| (*name, to_sql(v, *ty))))
        .collect()
}

fn select_where(
    conn: &Connection,
    collection: Collection,
    clause: &str,
    params: Vec<SqlValue>,
) -> Result<Vec<Record>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} ORDER BY id",
        collection.name(),
        clause
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| map_error("Prepare failed", e))?;

    let rows = stmt
        .query_map(params_from_iter(params), |row| from_row(collection, row))
        .map_err(|e| map_error("Query failed", e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| map_error("Row parse failed", e))?;

    Ok(rows)
}

fn select_one(conn: &Connection, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
    let Some((clause, param)) = id_clause(collection, id) else {
        return Ok(None);
    };
    Ok(select_where(conn, collection, &clause, vec![param])?
        .into_iter()
        .next())
}

fn insert_row(conn: &Connection, collection: Collection, record: &Record) -> Result<Record> {
    let bound = bind_columns(collection, record);
    if bound.is_empty() {
        return Err(RecordError::Validation(format!(
            "record has no columns of {}",
            collection
        )));
    }

    let names: Vec<&str> = bound.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; bound.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        collection.name(),
        names.join(", "),
        placeholders
    );

    conn.execute(&sql, params_from_iter(bound.into_iter().map(|(_, v)| v)))
        .map_err(|e| map_error("Insert failed", e))?;

    let id = conn.last_insert_rowid();
    debug!(collection = %collection, id, "Inserted row");

    select_one(conn, collection, &RecordId::Native(id.to_string()))?
        .ok_or_else(|| RecordError::Database("Inserted row not found".into()))
}

fn update_row(
    conn: &Connection,
    collection: Collection,
    id: &RecordId,
    patch: &Record,
) -> Result<Option<Record>> {
    let Some(existing) = select_one(conn, collection, id)? else {
        return Ok(None);
    };
    let row_id = RecordId::Native(
        existing
            .get(NATIVE_ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    );

    let bound = bind_columns(collection, patch);
    if bound.is_empty() {
        return Ok(Some(existing));
    }

    let assignments: Vec<String> = bound.iter().map(|(name, _)| format!("{} = ?", name)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        collection.name(),
        assignments.join(", ")
    );
    let mut params: Vec<SqlValue> = bound.into_iter().map(|(_, v)| v).collect();
    params.push(SqlValue::Integer(row_id.as_str().parse().unwrap_or_default()));

    conn.execute(&sql, params_from_iter(params))
        .map_err(|e| map_error("Update failed", e))?;

    select_one(conn, collection, &row_id)
}

#[async_trait]
impl RecordEngine for SqliteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record> {
        self.run(move |conn| insert_row(conn, collection, &record))
            .await
    }

    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        let id = id.clone();
        self.run(move |conn| select_one(conn, collection, &id)).await
    }

    async fn find_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        let Some(ty) = schema::column_type(collection, field) else {
            return Ok(Vec::new());
        };
        let clause = match value {
            Value::Null => format!("{} IS NULL", field),
            _ => format!("{} = ?", field),
        };
        let params = match value {
            Value::Null => Vec::new(),
            v => vec![to_sql(v, ty)],
        };

        self.run(move |conn| select_where(conn, collection, &clause, params))
            .await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        self.run(move |conn| select_where(conn, collection, "1 = 1", Vec::new()))
            .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Record,
    ) -> Result<Option<Record>> {
        let id = id.clone();
        self.run(move |conn| update_row(conn, collection, &id, &patch))
            .await
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let Some((clause, param)) = id_clause(collection, id) else {
            return Ok(false);
        };

        self.run(move |conn| {
            let sql = format!("DELETE FROM {} WHERE {}", collection.name(), clause);
            let changed = conn
                .execute(&sql, [param])
                .map_err(|e| map_error("Delete failed", e))?;
            Ok(changed > 0)
        })
        .await
    }
}
