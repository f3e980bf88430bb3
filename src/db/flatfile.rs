//! Flat-file JSON store
//!
//! One JSON document per collection at `<data_dir>/<collection>.json`:
//!
//! ```json
//! { "entities": [ ... ], "nextId": 3, "lastUpdated": "2026-10-18T09:00:00.000Z" }
//! ```
//!
//! Every mutation reads the whole document, changes it and rewrites it (temp file +
//! rename). An async mutex serializes writers inside this process; separate processes
//! sharing the directory get last-writer-wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{
    field_matches, now_timestamp, str_field, Collection, EngineKind, Record, RecordEngine,
    NATIVE_ID_FIELD,
};
use crate::types::{RecordError, RecordId, Result};

/// Field holding the flat file's own counter id
const FLAT_ID_FIELD: &str = "id";

/// On-disk layout of one collection
#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    entities: Vec<Record>,
    #[serde(rename = "nextId", default = "first_id")]
    next_id: u64,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

fn first_id() -> u64 {
    1
}

impl Default for CollectionFile {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            next_id: first_id(),
            last_updated: None,
        }
    }
}

impl CollectionFile {
    fn position(&self, collection: Collection, id: &RecordId) -> Option<usize> {
        self.entities
            .iter()
            .position(|record| matches_id(record, collection, id))
    }

    fn position_logical(&self, collection: Collection, logical_id: &str) -> Option<usize> {
        let field = collection.logical_id_field();
        self.entities
            .iter()
            .position(|record| field_matches(record, field, logical_id))
    }

    /// First unique field of `record` already taken by a different record
    fn unique_conflict(&self, collection: Collection, record: &Record) -> Option<String> {
        let id_field = collection.logical_id_field();
        let own_id = str_field(record, id_field);

        for field in collection.unique_fields() {
            let Some(value) = str_field(record, field).filter(|v| !v.is_empty()) else {
                continue;
            };
            let taken = self.entities.iter().any(|other| {
                str_field(other, id_field) != own_id && field_matches(other, field, value)
            });
            if taken {
                return Some(format!("{} '{}' already exists in {}", field, value, collection));
            }
        }
        None
    }

    fn allocate_id(&mut self, record: &mut Record) {
        let id = self.next_id;
        self.next_id += 1;
        record.insert(FLAT_ID_FIELD.to_string(), Value::from(id));
        // Records mirrored from another engine keep that engine's native id
        if !record.contains_key(NATIVE_ID_FIELD) {
            record.insert(NATIVE_ID_FIELD.to_string(), Value::String(id.to_string()));
        }
    }
}

/// Whether `record` is the one `id` refers to.
///
/// Native ids match `_id` only. For records first written here `_id` is the counter; for
/// mirrors it is the other engine's id, and the counter is never exposed as a native id.
fn matches_id(record: &Record, collection: Collection, id: &RecordId) -> bool {
    match id {
        RecordId::Logical(s) => field_matches(record, collection.logical_id_field(), s),
        RecordId::Native(s) => match record.get(NATIVE_ID_FIELD) {
            Some(_) => field_matches(record, NATIVE_ID_FIELD, s),
            None => field_matches(record, FLAT_ID_FIELD, s),
        },
    }
}

/// JSON flat-file store, one document per collection
pub struct FlatFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FlatFileStore {
    /// Open (and create if needed) the data directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Flat-file store at {:?}", dir);

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Path of the document backing a collection
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    async fn load(&self, collection: Collection) -> Result<CollectionFile> {
        let path = self.path_for(collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(CollectionFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CollectionFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, collection: Collection, mut file: CollectionFile) -> Result<()> {
        file.last_updated = Some(now_timestamp());
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(collection = %collection, count = file.entities.len(), "Flat file written");
        Ok(())
    }

    /// Mirror a record written by another engine: replace the copy with the same logical
    /// id, or insert it if this store has never seen it.
    pub async fn upsert(&self, collection: Collection, mut record: Record) -> Result<Record> {
        let logical_id = str_field(&record, collection.logical_id_field())
            .map(str::to_string)
            .ok_or_else(|| {
                RecordError::Validation(format!(
                    "record without {} cannot be mirrored",
                    collection.logical_id_field()
                ))
            })?;

        let _guard = self.lock.lock().await;
        let mut file = self.load(collection).await?;

        if let Some(reason) = file.unique_conflict(collection, &record) {
            return Err(RecordError::Constraint(reason));
        }

        let stored = match file.position_logical(collection, &logical_id) {
            Some(pos) => {
                // Keep our own counter id for the existing entry
                if let Some(flat_id) = file.entities[pos].get(FLAT_ID_FIELD).cloned() {
                    record.insert(FLAT_ID_FIELD.to_string(), flat_id);
                }
                file.entities[pos] = record.clone();
                record
            }
            None => {
                file.allocate_id(&mut record);
                file.entities.push(record.clone());
                record
            }
        };

        self.save(collection, file).await?;
        Ok(stored)
    }
}

#[async_trait]
impl RecordEngine for FlatFileStore {
    fn kind(&self) -> EngineKind {
        EngineKind::FlatFile
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<Record> {
        let _guard = self.lock.lock().await;
        let mut file = self.load(collection).await?;

        if let Some(logical_id) = str_field(&record, collection.logical_id_field()) {
            if file.position_logical(collection, logical_id).is_some() {
                return Err(RecordError::Constraint(format!(
                    "{} '{}' already exists",
                    collection.logical_id_field(),
                    logical_id
                )));
            }
        }
        if let Some(reason) = file.unique_conflict(collection, &record) {
            return Err(RecordError::Constraint(reason));
        }

        file.allocate_id(&mut record);
        file.entities.push(record.clone());
        self.save(collection, file).await?;

        Ok(record)
    }

    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        let file = self.load(collection).await?;
        Ok(file
            .position(collection, id)
            .map(|pos| file.entities[pos].clone()))
    }

    async fn find_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        let file = self.load(collection).await?;
        Ok(file
            .entities
            .into_iter()
            .filter(|record| record.get(field) == Some(value))
            .collect())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self.load(collection).await?.entities)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Record,
    ) -> Result<Option<Record>> {
        let _guard = self.lock.lock().await;
        let mut file = self.load(collection).await?;

        let Some(pos) = file.position(collection, id) else {
            return Ok(None);
        };

        let mut merged = file.entities[pos].clone();
        merged.extend(patch);
        if let Some(reason) = file.unique_conflict(collection, &merged) {
            return Err(RecordError::Constraint(reason));
        }

        file.entities[pos] = merged.clone();
        self.save(collection, file).await?;

        Ok(Some(merged))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut file = self.load(collection).await?;

        let Some(pos) = file.position(collection, id) else {
            return Ok(false);
        };

        file.entities.remove(pos);
        self.save(collection, file).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn store() -> (TempDir, FlatFileStore) {
        let dir = TempDir::new().unwrap();
        let store = FlatFileStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_insert_assigns_counter_id() {
        let (_dir, store) = store().await;

        let first = store
            .insert(Collection::Citizens, record(json!({ "citizen_id": "CIT1", "email": "a@x.in" })))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Citizens, record(json!({ "citizen_id": "CIT2", "email": "b@x.in" })))
            .await
            .unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(first["_id"], json!("1"));
        assert_eq!(second["id"], json!(2));
    }

    #[tokio::test]
    async fn test_document_layout_on_disk() {
        let (_dir, store) = store().await;
        store
            .insert(Collection::Payments, record(json!({ "payment_id": "PAY1" })))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path_for(Collection::Payments)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["nextId"], json!(2));
        assert_eq!(doc["entities"].as_array().unwrap().len(), 1);
        assert!(doc["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_constraint_violation() {
        let (_dir, store) = store().await;
        store
            .insert(Collection::Citizens, record(json!({ "citizen_id": "CIT1", "email": "a@x.in" })))
            .await
            .unwrap();

        let err = store
            .insert(Collection::Citizens, record(json!({ "citizen_id": "CIT2", "email": "a@x.in" })))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_empty_email_is_not_unique() {
        let (_dir, store) = store().await;
        for id in ["CIT1", "CIT2"] {
            store
                .insert(Collection::Citizens, record(json!({ "citizen_id": id, "email": "" })))
                .await
                .unwrap();
        }
        assert_eq!(store.list(Collection::Citizens).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_logical_native_and_mirrored_id() {
        let (_dir, store) = store().await;
        store
            .upsert(
                Collection::Citizens,
                record(json!({ "citizen_id": "CIT9", "_id": "65a1f0c2e4b0a1b2c3d4e5f6" })),
            )
            .await
            .unwrap();

        for id in [
            RecordId::logical("CIT9"),
            RecordId::native("65a1f0c2e4b0a1b2c3d4e5f6"),
        ] {
            let found = store.find(Collection::Citizens, &id).await.unwrap();
            assert!(found.is_some(), "lookup by {} failed", id);
        }

        // The local counter of a mirror is not an id of that record
        assert!(store
            .find(Collection::Citizens, &RecordId::native("1"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find(Collection::Citizens, &RecordId::logical("CIT404"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_counter() {
        let (_dir, store) = store().await;
        store
            .upsert(Collection::Citizens, record(json!({ "citizen_id": "CIT1", "name": "Asha" })))
            .await
            .unwrap();
        let replaced = store
            .upsert(Collection::Citizens, record(json!({ "citizen_id": "CIT1", "name": "Asha K" })))
            .await
            .unwrap();

        assert_eq!(replaced["id"], json!(1));
        let all = store.list(Collection::Citizens).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], json!("Asha K"));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (_dir, store) = store().await;
        store
            .insert(
                Collection::Citizens,
                record(json!({ "citizen_id": "CIT1", "name": "Asha", "district": "Mysuru" })),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                Collection::Citizens,
                &RecordId::logical("CIT1"),
                record(json!({ "district": "Mandya" })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], json!("Asha"));
        assert_eq!(updated["district"], json!("Mandya"));

        let missing = store
            .update(Collection::Citizens, &RecordId::logical("CIT2"), Record::new())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_find_where() {
        let (_dir, store) = store().await;
        for (pid, app) in [("PAY1", "DL1"), ("PAY2", "BC2")] {
            store
                .insert(
                    Collection::Payments,
                    record(json!({ "payment_id": pid, "application_id": app })),
                )
                .await
                .unwrap();
        }

        let hits = store
            .find_where(Collection::Payments, "application_id", &json!("DL1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        assert!(store
            .delete(Collection::Payments, &RecordId::logical("PAY1"))
            .await
            .unwrap());
        assert!(!store
            .delete(Collection::Payments, &RecordId::logical("PAY1"))
            .await
            .unwrap());
    }
}
