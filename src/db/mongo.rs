//! MongoDB client and record engine
//!
//! Highest-priority engine. Records are stored as plain documents; the ObjectId
//! MongoDB assigns is exposed as a hex string under `_id`.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
    Client, IndexModel,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::db::schemas::IntoIndexes;
use crate::db::{Collection, EngineKind, Record, RecordEngine, NATIVE_ID_FIELD};
use crate::types::{RecordError, RecordId, Result};

/// Duplicate key error code
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the server answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on an unreachable server instead of hanging startup
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| RecordError::Unavailable(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RecordError::Unavailable(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Untyped handle on one collection
    pub fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.client
            .database(&self.db_name)
            .collection::<Document>(collection.name())
    }

    /// Apply the collection's index definitions
    pub async fn apply_indexes(&self, collection: Collection) -> Result<()> {
        let indices: Vec<IndexModel> = collection
            .into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if indices.is_empty() {
            return Ok(());
        }

        self.collection(collection)
            .create_indexes(indices)
            .await
            .map_err(|e| RecordError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Record engine backed by MongoDB
pub struct MongoEngine {
    client: MongoClient,
}

impl MongoEngine {
    /// Connect and prepare indexes on every collection
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = MongoClient::new(uri, db_name).await?;
        for collection in Collection::ALL {
            client.apply_indexes(collection).await?;
        }
        Ok(Self { client })
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}

/// Filter matching a logical id, or an ObjectId-shaped native id.
///
/// Strings that are not valid ObjectIds are only matched against the logical field,
/// never turned into an `_id` query.
pub fn id_filter(collection: Collection, id: &RecordId) -> Document {
    let field = collection.logical_id_field();
    match id {
        RecordId::Logical(s) => doc! { field: s.as_str() },
        RecordId::Native(s) => match ObjectId::parse_str(s) {
            Ok(oid) => doc! { "$or": [ { "_id": oid }, { field: s.as_str() } ] },
            Err(_) => doc! { field: s.as_str() },
        },
    }
}

fn to_document(mut record: Record) -> Result<Document> {
    // MongoDB assigns its own ObjectId
    record.remove(NATIVE_ID_FIELD);
    bson::to_document(&record)
        .map_err(|e| RecordError::Internal(format!("Failed to encode document: {}", e)))
}

fn from_document(mut document: Document) -> Record {
    let native_id = match document.remove("_id") {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    };

    let mut record = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    };
    if let Some(id) = native_id {
        record.insert(NATIVE_ID_FIELD.to_string(), Value::String(id));
    }
    record
}

fn map_error(context: &str, e: mongodb::error::Error) -> RecordError {
    match *e.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY => {
            RecordError::Constraint(format!("{}: {}", context, write.message))
        }
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            RecordError::Unavailable(format!("{}: {}", context, e))
        }
        _ => RecordError::Database(format!("{}: {}", context, e)),
    }
}

#[async_trait]
impl RecordEngine for MongoEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Mongo
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record> {
        let document = to_document(record)?;
        let result = self
            .client
            .collection(collection)
            .insert_one(document.clone())
            .await
            .map_err(|e| map_error("Insert failed", e))?;

        let oid = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| RecordError::Database("Failed to get inserted ID".into()))?;

        debug!(collection = %collection, id = %oid, "Inserted document");

        let mut stored = from_document(document);
        stored.insert(NATIVE_ID_FIELD.to_string(), Value::String(oid.to_hex()));
        Ok(stored)
    }

    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        let found = self
            .client
            .collection(collection)
            .find_one(id_filter(collection, id))
            .await
            .map_err(|e| map_error("Find failed", e))?;

        Ok(found.map(from_document))
    }

    async fn find_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        let value = bson::to_bson(value)
            .map_err(|e| RecordError::Internal(format!("Failed to encode filter: {}", e)))?;
        let mut filter = Document::new();
        filter.insert(field, value);

        let cursor = self
            .client
            .collection(collection)
            .find(filter)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| map_error("Find failed", e))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error("Cursor failed", e))?;

        Ok(documents.into_iter().map(from_document).collect())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        let cursor = self
            .client
            .collection(collection)
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| map_error("Find failed", e))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error("Cursor failed", e))?;

        Ok(documents.into_iter().map(from_document).collect())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Record,
    ) -> Result<Option<Record>> {
        if patch.is_empty() {
            return self.find(collection, id).await;
        }

        let set = to_document(patch)?;
        let updated = self
            .client
            .collection(collection)
            .find_one_and_update(id_filter(collection, id), doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_error("Update failed", e))?;

        Ok(updated.map(from_document))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let result = self
            .client
            .collection(collection)
            .delete_one(id_filter(collection, id))
            .await
            .map_err(|e| map_error("Delete failed", e))?;

        Ok(result.deleted_count > 0)
    }
}
