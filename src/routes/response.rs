//! Request and response helpers shared by the route handlers
//!
//! Every response uses the envelope `{"success": true, "data": ...}` or
//! `{"success": false, "error": ..., "code": ...}`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::types::{RecordError, Result};

pub type FullBody = Full<Bytes>;

/// Handlers return an error that the router turns into an envelope
pub type HandlerResult = Result<Response<FullBody>>;

/// Default page size when `limit` is absent
pub const DEFAULT_LIMIT: usize = 50;

/// A request with its body already read
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Collect the body of a hyper request, refusing bodies over `max_bytes`
    pub async fn from_hyper<B>(req: Request<B>, max_bytes: usize) -> Result<Self>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, max_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(RecordError::PayloadTooLarge(max_bytes))
            }
            Err(e) => {
                return Err(RecordError::Validation(format!(
                    "Failed to read request body: {}",
                    e
                )))
            }
        };
        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Build a request by hand (tests, internal calls)
    pub fn new(method: Method, uri: &str, body: impl Into<Bytes>) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(RecordError::Validation("Request body is required".into()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| RecordError::Validation(format!("Invalid JSON: {}", e)))
    }

    /// Parse the query string; absent parameters take their serde defaults
    pub fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
            .map_err(|e| RecordError::Validation(format!("Invalid query: {}", e)))
    }

    /// Required query parameter
    pub fn query_param(&self, name: &str) -> Result<String> {
        let pairs: Vec<(String, String)> = self.query()?;
        pairs
            .into_iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value)
            .ok_or_else(|| RecordError::Validation(format!("{} query parameter is required", name)))
    }
}

/// `limit` / `offset` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    /// Slice one page out of `items`
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, PageInfo) {
        let total = items.len();
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = self.offset.unwrap_or(0);
        let page = items.into_iter().skip(offset).take(limit).collect();
        (page, PageInfo { total, limit, offset })
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn ok<T: Serialize>(data: &T) -> HandlerResult {
    Ok(json_response(StatusCode::OK, &json!({ "success": true, "data": data })))
}

pub fn created<T: Serialize>(data: &T) -> HandlerResult {
    Ok(json_response(StatusCode::CREATED, &json!({ "success": true, "data": data })))
}

/// List envelope with pagination info
pub fn page<T: Serialize>(items: Vec<T>, pagination: Pagination) -> HandlerResult {
    let (items, info) = pagination.apply(items);
    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "data": items, "pagination": info }),
    ))
}

/// HTTP status for an error
pub fn status_for(err: &RecordError) -> StatusCode {
    match err {
        RecordError::NotFound(_) => StatusCode::NOT_FOUND,
        RecordError::Validation(_) => StatusCode::BAD_REQUEST,
        RecordError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        RecordError::Constraint(_) | RecordError::PaymentExists { .. } => StatusCode::CONFLICT,
        RecordError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: &RecordError) -> Response<FullBody> {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, status = status.as_u16(), "Request rejected");
    }

    let mut body = json!({
        "success": false,
        "error": err.to_string(),
        "code": err.code(),
    });
    if let RecordError::PaymentExists { payment_id } = err {
        body["payment_id"] = json!(payment_id);
    }
    json_response(status, &body)
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({ "success": false, "error": "Not Found", "path": path }),
    )
}
