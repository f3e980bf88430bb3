//! Unified record store
//!
//! One CRUD contract over every engine. The engine chain is resolved once at startup
//! (configuration flag + successful handshake) and never re-checked per request.
//!
//! - Writes go to the first engine in the chain; a failure that is not the caller's fault
//!   moves the same call to the next engine, ending at the flat file.
//! - Successful writes on any engine above the flat file are mirrored into it.
//! - Reads fall through on misses as well as failures; `None` after the flat file is a
//!   definitive not-found. Lists and queries add flat-file records the serving engine lacks.
//! - An update or delete that misses everywhere above the flat file is re-issued by the
//!   logical id of the flat-file record, so a mirror never changes without its source.
//! - Constraint and validation errors are surfaced immediately, never retried lower down.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{
    now_timestamp, str_field, Collection, EngineKind, FirestoreConfig, FirestoreEngine,
    FlatFileStore, MongoEngine, Record, RecordEngine, SqliteEngine, NATIVE_ID_FIELD,
};
use crate::models::{
    to_record, Application, ApplicationUpdate, Citizen, CitizenUpdate, Entity, Payment,
    PaymentUpdate,
};
use crate::types::{RecordError, RecordId, Result};

/// MongoDB connection settings
#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub uri: String,
    pub db_name: String,
}

/// Which engines are configured. `None` means disabled.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub mongo: Option<MongoSettings>,
    pub firestore: Option<FirestoreConfig>,
    pub sqlite_path: Option<PathBuf>,
}

/// Connect every configured engine and build the store.
///
/// Priority: MongoDB, Firestore, then the flat file. SQLite takes the primary slot only
/// when neither MongoDB nor Firestore is configured. Engines that fail their handshake
/// are left out for the life of the process.
pub async fn resolve_engines(config: &StoreConfig) -> Result<UnifiedStore> {
    let fallback = Arc::new(FlatFileStore::open(&config.data_dir).await?);
    let mut chain: Vec<Arc<dyn RecordEngine>> = Vec::new();

    if let Some(mongo) = &config.mongo {
        match MongoEngine::connect(&mongo.uri, &mongo.db_name).await {
            Ok(engine) => chain.push(Arc::new(engine)),
            Err(e) => warn!(error = %e, "MongoDB configured but unavailable, skipping"),
        }
    }

    if let Some(firestore) = &config.firestore {
        match FirestoreEngine::connect(firestore.clone()).await {
            Ok(engine) => chain.push(Arc::new(engine)),
            Err(e) => warn!(error = %e, "Firestore configured but unavailable, skipping"),
        }
    }

    if config.mongo.is_none() && config.firestore.is_none() {
        if let Some(path) = &config.sqlite_path {
            match SqliteEngine::open(path) {
                Ok(engine) => chain.push(Arc::new(engine)),
                Err(e) => warn!(error = %e, "SQLite configured but unavailable, skipping"),
            }
        }
    }

    Ok(UnifiedStore::new(chain, fallback))
}

/// Façade over the resolved engine chain
pub struct UnifiedStore {
    chain: Vec<Arc<dyn RecordEngine>>,
    fallback: Arc<FlatFileStore>,
}

impl UnifiedStore {
    pub fn new(chain: Vec<Arc<dyn RecordEngine>>, fallback: Arc<FlatFileStore>) -> Self {
        let store = Self { chain, fallback };
        info!(
            engines = ?store.engine_status(),
            "Record store ready (primary: {})",
            store.primary()
        );
        store
    }

    /// Store with no engine above the flat file
    pub fn flat_file_only(fallback: Arc<FlatFileStore>) -> Self {
        Self::new(Vec::new(), fallback)
    }

    /// Resolved chain, highest priority first, always ending with the flat file
    pub fn engine_status(&self) -> Vec<EngineKind> {
        self.chain
            .iter()
            .map(|engine| engine.kind())
            .chain(std::iter::once(EngineKind::FlatFile))
            .collect()
    }

    /// Engine that serves calls while it is reachable
    pub fn primary(&self) -> EngineKind {
        self.chain
            .first()
            .map(|engine| engine.kind())
            .unwrap_or(EngineKind::FlatFile)
    }

    pub fn fallback(&self) -> &FlatFileStore {
        &self.fallback
    }

    // =========================================================================
    // Record-level operations
    // =========================================================================

    pub async fn insert_record(&self, collection: Collection, record: Record) -> Result<Record> {
        let record = prepare_insert(collection, record)?;

        for engine in &self.chain {
            match engine.insert(collection, record.clone()).await {
                Ok(written) => {
                    debug!(engine = %engine.kind(), collection = %collection, "Insert served");
                    self.mirror(collection, &written).await;
                    return Ok(written);
                }
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Insert failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.insert(collection, record).await
    }

    pub async fn find_record(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        for engine in &self.chain {
            match engine.find(collection, id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {
                    debug!(engine = %engine.kind(), collection = %collection, id = %id, "Not found, trying next engine");
                }
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Find failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.find(collection, id).await
    }

    /// Records with `field == value`, plus flat-file matches the serving engine lacks
    pub async fn find_records_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        for engine in &self.chain {
            match engine.find_where(collection, field, value).await {
                Ok(records) if !records.is_empty() => {
                    let flat = self.fallback.find_where(collection, field, value).await;
                    return Ok(self.merge_flat_only(collection, records, flat));
                }
                Ok(_) => {}
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Query failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.find_where(collection, field, value).await
    }

    /// Every record of the first engine that answers, plus flat-file records it lacks
    pub async fn list_records(&self, collection: Collection) -> Result<Vec<Record>> {
        for engine in &self.chain {
            match engine.list(collection).await {
                Ok(records) => {
                    let flat = self.fallback.list(collection).await;
                    return Ok(self.merge_flat_only(collection, records, flat));
                }
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "List failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.list(collection).await
    }

    pub async fn update_record(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Record,
    ) -> Result<Option<Record>> {
        let patch = prepare_patch(collection, patch);

        if let Some(updated) = self.update_on_chain(collection, id, &patch).await? {
            return Ok(Some(updated));
        }

        let target = self.resolve_through_flat_file(collection, id).await?;
        if &target != id {
            if let Some(updated) = self.update_on_chain(collection, &target, &patch).await? {
                return Ok(Some(updated));
            }
        }

        self.fallback.update(collection, &target, patch).await
    }

    pub async fn delete_record(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        if self.delete_on_chain(collection, id).await? {
            return Ok(true);
        }

        let target = self.resolve_through_flat_file(collection, id).await?;
        if &target != id && self.delete_on_chain(collection, &target).await? {
            return Ok(true);
        }

        self.fallback.delete(collection, &target).await
    }

    /// Update on the first engine holding `id`, mirroring the result
    async fn update_on_chain(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: &Record,
    ) -> Result<Option<Record>> {
        for engine in &self.chain {
            match engine.update(collection, id, patch.clone()).await {
                Ok(Some(updated)) => {
                    self.mirror(collection, &updated).await;
                    return Ok(Some(updated));
                }
                Ok(None) => {}
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Update failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Delete from the first engine holding `id`, mirroring the deletion
    async fn delete_on_chain(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        for engine in &self.chain {
            // Resolve to the logical id so the mirror deletes the same record
            let found = match engine.find(collection, id).await {
                Ok(found) => found,
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Delete lookup failed, falling back");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(record) = found else {
                continue;
            };
            let logical = str_field(&record, collection.logical_id_field())
                .map(RecordId::logical)
                .unwrap_or_else(|| id.clone());

            match engine.delete(collection, &logical).await {
                Ok(true) => {
                    if let Err(e) = self.fallback.delete(collection, &logical).await {
                        warn!(collection = %collection, id = %logical, error = %e, "Mirror delete failed");
                    }
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) if e.is_fallback_signal() => {
                    warn!(engine = %engine.kind(), collection = %collection, error = %e, "Delete failed, falling back");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Logical id of the flat-file record a native id names, or `id` unchanged.
    ///
    /// A mirror carries the native id of the engine that wrote it, which a lower engine in
    /// the chain may not know; its logical id reaches the copy on any engine.
    async fn resolve_through_flat_file(&self, collection: Collection, id: &RecordId) -> Result<RecordId> {
        if self.chain.is_empty() || matches!(id, RecordId::Logical(_)) {
            return Ok(id.clone());
        }
        let logical = self
            .fallback
            .find(collection, id)
            .await?
            .as_ref()
            .and_then(|record| str_field(record, collection.logical_id_field()))
            .map(RecordId::logical);
        Ok(logical.unwrap_or_else(|| id.clone()))
    }

    /// Append flat-file records whose logical id the serving engine did not return.
    ///
    /// These were written while the engine was unreachable. A failed flat-file read keeps
    /// the engine's answer.
    fn merge_flat_only(
        &self,
        collection: Collection,
        mut records: Vec<Record>,
        flat: Result<Vec<Record>>,
    ) -> Vec<Record> {
        let flat = match flat {
            Ok(flat) => flat,
            Err(e) => {
                warn!(collection = %collection, error = %e, "Flat-file read failed, serving engine results only");
                return records;
            }
        };

        let field = collection.logical_id_field();
        let seen: HashSet<String> = records
            .iter()
            .filter_map(|record| str_field(record, field))
            .map(str::to_string)
            .collect();
        let missing: Vec<Record> = flat
            .into_iter()
            .filter(|record| str_field(record, field).is_some_and(|id| !seen.contains(id)))
            .collect();

        if !missing.is_empty() {
            debug!(collection = %collection, count = missing.len(), "Merged flat-file-only records");
        }
        records.extend(missing);
        records
    }

    /// Best-effort copy of a record written elsewhere into the flat file
    async fn mirror(&self, collection: Collection, record: &Record) {
        if let Err(e) = self.fallback.upsert(collection, record.clone()).await {
            warn!(collection = %collection, error = %e, "Mirror to flat file failed");
        }
    }

    // =========================================================================
    // Typed operations
    // =========================================================================

    pub async fn add<E: Entity>(&self, entity: &E) -> Result<E> {
        let written = self.insert_record(E::COLLECTION, entity.to_record()?).await?;
        E::from_record(written)
    }

    pub async fn get<E: Entity>(&self, id: &RecordId) -> Result<Option<E>> {
        self.find_record(E::COLLECTION, id)
            .await?
            .map(E::from_record)
            .transpose()
    }

    pub async fn find_where<E: Entity>(&self, field: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        self.find_records_where(E::COLLECTION, field, &value.into())
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    pub async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        self.list_records(E::COLLECTION)
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    pub async fn update<E: Entity, U: Serialize>(&self, id: &RecordId, updates: &U) -> Result<Option<E>> {
        self.update_record(E::COLLECTION, id, to_record(updates)?)
            .await?
            .map(E::from_record)
            .transpose()
    }

    pub async fn delete<E: Entity>(&self, id: &RecordId) -> Result<bool> {
        self.delete_record(E::COLLECTION, id).await
    }

    // Citizens

    pub async fn add_citizen(&self, citizen: &Citizen) -> Result<Citizen> {
        self.add(citizen).await
    }

    pub async fn get_citizen_by_id(&self, id: &RecordId) -> Result<Option<Citizen>> {
        self.get(id).await
    }

    pub async fn get_citizens(&self) -> Result<Vec<Citizen>> {
        self.list().await
    }

    pub async fn update_citizen(&self, id: &RecordId, updates: &CitizenUpdate) -> Result<Option<Citizen>> {
        self.update::<Citizen, _>(id, updates).await
    }

    pub async fn delete_citizen(&self, id: &RecordId) -> Result<bool> {
        self.delete::<Citizen>(id).await
    }

    // Applications

    pub async fn add_application(&self, application: &Application) -> Result<Application> {
        self.add(application).await
    }

    pub async fn get_application_by_id(&self, id: &RecordId) -> Result<Option<Application>> {
        self.get(id).await
    }

    pub async fn get_applications(&self) -> Result<Vec<Application>> {
        self.list().await
    }

    pub async fn update_application(
        &self,
        id: &RecordId,
        updates: &ApplicationUpdate,
    ) -> Result<Option<Application>> {
        self.update::<Application, _>(id, updates).await
    }

    pub async fn delete_application(&self, id: &RecordId) -> Result<bool> {
        self.delete::<Application>(id).await
    }

    // Payments

    pub async fn add_payment(&self, payment: &Payment) -> Result<Payment> {
        self.add(payment).await
    }

    pub async fn get_payment_by_id(&self, id: &RecordId) -> Result<Option<Payment>> {
        self.get(id).await
    }

    pub async fn get_payments(&self) -> Result<Vec<Payment>> {
        self.list().await
    }

    pub async fn update_payment(&self, id: &RecordId, updates: &PaymentUpdate) -> Result<Option<Payment>> {
        self.update::<Payment, _>(id, updates).await
    }

    pub async fn delete_payment(&self, id: &RecordId) -> Result<bool> {
        self.delete::<Payment>(id).await
    }
}

/// Require a logical id, drop foreign native ids and stamp timestamps
fn prepare_insert(collection: Collection, mut record: Record) -> Result<Record> {
    let id_field = collection.logical_id_field();
    if str_field(&record, id_field).map_or(true, str::is_empty) {
        return Err(RecordError::Validation(format!("{} is required", id_field)));
    }

    record.remove(NATIVE_ID_FIELD);
    record.remove("id");

    let now = now_timestamp();
    if str_field(&record, "created_at").map_or(true, str::is_empty) {
        record.insert("created_at".to_string(), Value::String(now.clone()));
    }
    if collection.tracks_updates() && str_field(&record, "updated_at").map_or(true, str::is_empty) {
        record.insert("updated_at".to_string(), Value::String(now));
    }
    Ok(record)
}

/// Strip immutable fields from a patch and refresh `updated_at`
fn prepare_patch(collection: Collection, mut patch: Record) -> Record {
    patch.remove(collection.logical_id_field());
    patch.remove(NATIVE_ID_FIELD);
    patch.remove("id");
    patch.remove("created_at");

    if collection.tracks_updates() {
        patch.insert("updated_at".to_string(), Value::String(now_timestamp()));
    }
    patch
}
