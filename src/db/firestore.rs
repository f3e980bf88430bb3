//! Firestore record engine
//!
//! Talks to the Firestore REST API (or the local emulator when `base_url` points at it).
//! The document name Firestore generates is the native identifier; logical ids are
//! matched with `runQuery` field filters.
//!
//! Firestore has no unique indexes, so logical ids and the collection's unique fields
//! are checked with a query before each insert.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::db::{str_field, Collection, EngineKind, Record, RecordEngine, NATIVE_ID_FIELD};
use crate::types::{RecordError, RecordId, Result};

/// Page size used when listing a collection
const LIST_PAGE_SIZE: u32 = 300;

/// Firestore connection settings
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// REST root, e.g. `https://firestore.googleapis.com/v1` or `http://localhost:8081/v1`
    pub base_url: String,
    /// OAuth bearer token; the emulator accepts requests without one
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

/// Document as returned by the REST API
#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    document: Option<FirestoreDocument>,
}

/// Record engine backed by Firestore
pub struct FirestoreEngine {
    config: FirestoreConfig,
    http_client: reqwest::Client,
}

impl FirestoreEngine {
    /// Build the client and verify the project answers a one-document list
    pub async fn connect(config: FirestoreConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("seva-records/0.1")
            .build()
            .map_err(|e| RecordError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let engine = Self {
            config,
            http_client,
        };

        let url = format!("{}?pageSize=1", engine.collection_url(Collection::Citizens));
        let response = engine.send(engine.http_client.get(&url)).await?;
        expect_success(response, "Firestore handshake").await?;

        info!("Connected to Firestore project '{}'", engine.config.project_id);
        Ok(engine)
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id
        )
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.documents_root(), collection.name())
    }

    /// URL of a document from its full resource name
    fn document_url(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), name)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| RecordError::Unavailable(format!("Firestore request failed: {}", e)))
    }

    /// Run an equality query on one field
    async fn query_equal(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
        limit: Option<u32>,
    ) -> Result<Vec<FirestoreDocument>> {
        let mut structured = json!({
            "from": [{ "collectionId": collection.name() }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            }
        });
        if let Some(limit) = limit {
            structured["limit"] = json!(limit);
        }

        let url = format!("{}:runQuery", self.documents_root());
        let response = self
            .send(
                self.http_client
                    .post(&url)
                    .json(&json!({ "structuredQuery": structured })),
            )
            .await?;
        let response = expect_success(response, "Firestore query").await?;

        let results: Vec<QueryResult> = response
            .json()
            .await
            .map_err(|e| RecordError::Database(format!("Invalid query response: {}", e)))?;

        Ok(results.into_iter().filter_map(|r| r.document).collect())
    }

    /// Locate a document by native name or logical id
    ///
    /// Generated document names are 20 alphanumerics and parse as logical ids, so a miss on
    /// the logical field still tries a direct get.
    async fn resolve(&self, collection: Collection, id: &RecordId) -> Result<Option<FirestoreDocument>> {
        if let RecordId::Native(native) = id {
            if let Some(document) = self.get_document(collection, native).await? {
                return Ok(Some(document));
            }
        }

        let matches = self
            .query_equal(
                collection,
                collection.logical_id_field(),
                &Value::String(id.as_str().to_string()),
                Some(1),
            )
            .await?;
        if let Some(document) = matches.into_iter().next() {
            return Ok(Some(document));
        }

        match id {
            RecordId::Logical(name) => self.get_document(collection, name).await,
            RecordId::Native(_) => Ok(None),
        }
    }

    async fn get_document(&self, collection: Collection, name: &str) -> Result<Option<FirestoreDocument>> {
        if !is_document_id(name) {
            return Ok(None);
        }
        let url = format!("{}/{}", self.collection_url(collection), name);
        let response = self.send(self.http_client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success(response, "Firestore get").await?;
        let document: FirestoreDocument = response
            .json()
            .await
            .map_err(|e| RecordError::Database(format!("Invalid document response: {}", e)))?;
        Ok(Some(document))
    }

    async fn check_unique(&self, collection: Collection, record: &Record) -> Result<()> {
        let id_field = collection.logical_id_field();
        let own_id = str_field(record, id_field);

        if let Some(id) = own_id {
            let existing = self
                .query_equal(collection, id_field, &Value::String(id.to_string()), Some(1))
                .await?;
            if !existing.is_empty() {
                return Err(RecordError::Constraint(format!("{} '{}' already exists", id_field, id)));
            }
        }

        for field in collection.unique_fields() {
            let Some(value) = str_field(record, field).filter(|v| !v.is_empty()) else {
                continue;
            };
            let taken = self
                .query_equal(collection, field, &Value::String(value.to_string()), Some(2))
                .await?
                .into_iter()
                .map(decode_document)
                .any(|other| str_field(&other, id_field) != own_id);
            if taken {
                return Err(RecordError::Constraint(format!(
                    "{} '{}' already exists in {}",
                    field, value, collection
                )));
            }
        }
        Ok(())
    }
}

/// Whether a string can be a Firestore document id (no path separators)
fn is_document_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 1500 && !s.contains('/') && s != "." && s != ".."
}

async fn expect_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", context, status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(RecordError::Unavailable(message))
    } else {
        Err(RecordError::Database(message))
    }
}

/// Encode a JSON value as a Firestore typed value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| key.as_str() != NATIVE_ID_FIELD)
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode a Firestore typed value back to plain JSON
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "booleanValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "doubleValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .filter(|(_, value)| !value.is_null())
        .collect()
}

fn decode_document(document: FirestoreDocument) -> Record {
    let mut record = decode_fields(&document.fields);
    let native_id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    record.insert(NATIVE_ID_FIELD.to_string(), Value::String(native_id));
    record
}

#[async_trait]
impl RecordEngine for FirestoreEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Firestore
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record> {
        self.check_unique(collection, &record).await?;

        let response = self
            .send(
                self.http_client
                    .post(self.collection_url(collection))
                    .json(&json!({ "fields": encode_fields(&record) })),
            )
            .await?;
        let response = expect_success(response, "Firestore insert").await?;
        let document: FirestoreDocument = response
            .json()
            .await
            .map_err(|e| RecordError::Database(format!("Invalid insert response: {}", e)))?;

        debug!(collection = %collection, name = %document.name, "Created document");
        Ok(decode_document(document))
    }

    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.resolve(collection, id).await?.map(decode_document))
    }

    async fn find_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        Ok(self
            .query_equal(collection, field, value, None)
            .await?
            .into_iter()
            .map(decode_document)
            .collect())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}?pageSize={}", self.collection_url(collection), LIST_PAGE_SIZE);
            if let Some(token) = &page_token {
                let query = serde_urlencoded::to_string(&[("pageToken", token.as_str())])
                    .map_err(|e| RecordError::Internal(format!("Failed to encode page token: {}", e)))?;
                url.push('&');
                url.push_str(&query);
            }

            let response = self.send(self.http_client.get(&url)).await?;
            let response = expect_success(response, "Firestore list").await?;
            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| RecordError::Database(format!("Invalid list response: {}", e)))?;

            records.extend(page.documents.into_iter().map(decode_document));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Record,
    ) -> Result<Option<Record>> {
        let Some(document) = self.resolve(collection, id).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(decode_document(document)));
        }

        let mask: Vec<(&str, &str)> = patch
            .keys()
            .filter(|key| key.as_str() != NATIVE_ID_FIELD)
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        let query = serde_urlencoded::to_string(&mask)
            .map_err(|e| RecordError::Internal(format!("Failed to encode update mask: {}", e)))?;
        let url = format!("{}?{}", self.document_url(&document.name), query);

        let response = self
            .send(
                self.http_client
                    .patch(&url)
                    .json(&json!({ "fields": encode_fields(&patch) })),
            )
            .await?;
        let response = expect_success(response, "Firestore update").await?;
        let updated: FirestoreDocument = response
            .json()
            .await
            .map_err(|e| RecordError::Database(format!("Invalid update response: {}", e)))?;

        Ok(Some(decode_document(updated)))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let Some(document) = self.resolve(collection, id).await? else {
            return Ok(false);
        };

        let response = self
            .send(self.http_client.delete(self.document_url(&document.name)))
            .await?;
        expect_success(response, "Firestore delete").await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode_value(&json!("DL1")), json!({ "stringValue": "DL1" }));
        assert_eq!(encode_value(&json!(42)), json!({ "integerValue": "42" }));
        assert_eq!(encode_value(&json!(99.5)), json!({ "doubleValue": 99.5 }));
        assert_eq!(encode_value(&json!(true)), json!({ "booleanValue": true }));
        assert_eq!(encode_value(&Value::Null), json!({ "nullValue": null }));
    }

    #[test]
    fn test_decode_nested_values() {
        let typed = json!({
            "mapValue": { "fields": {
                "count": { "integerValue": "3" },
                "tags": { "arrayValue": { "values": [ { "stringValue": "a" } ] } },
                "gone": { "nullValue": null },
            }}
        });
        assert_eq!(decode_value(&typed), json!({ "count": 3, "tags": ["a"] }));
    }

    #[test]
    fn test_encode_fields_skips_native_id() {
        let record = json!({ "_id": "abc", "citizen_id": "CIT1" })
            .as_object()
            .cloned()
            .unwrap();
        let fields = encode_fields(&record);
        assert!(!fields.contains_key("_id"));
        assert!(fields.contains_key("citizen_id"));
    }

    #[test]
    fn test_decode_document_takes_name_suffix() {
        let document = FirestoreDocument {
            name: "projects/p/databases/(default)/documents/citizens/AbCdEf0123456789wxyz".into(),
            fields: json!({ "citizen_id": { "stringValue": "CIT1" } })
                .as_object()
                .cloned()
                .unwrap(),
        };
        let record = decode_document(document);
        assert_eq!(record["_id"], json!("AbCdEf0123456789wxyz"));
        assert_eq!(record["citizen_id"], json!("CIT1"));
    }

    #[test]
    fn test_document_id_shape() {
        assert!(is_document_id("AbCdEf0123456789wxyz"));
        assert!(!is_document_id("a/b"));
        assert!(!is_document_id(""));
    }
}
