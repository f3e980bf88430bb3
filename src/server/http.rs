//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each request body is read once into
//! an [`ApiRequest`] and dispatched by method and path segments.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::UnifiedStore;
use crate::routes::{self, error_response, not_found_response, ApiRequest};
use crate::services::Services;
use crate::types::RecordError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Record store resolved at startup
    pub store: Arc<UnifiedStore>,
    pub services: Services,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Arc<UnifiedStore>) -> Self {
        let services = Services::new(Arc::clone(&store));
        Self {
            args,
            store,
            services,
            started_at: Instant::now(),
        }
    }
}

/// Accept connections until the process exits
pub async fn run(state: Arc<AppState>) -> Result<(), RecordError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Seva Records listening on {} (engines: {:?})",
        state.args.listen,
        state.store.engine_status()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - admin authentication disabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let req = match ApiRequest::from_hyper(req, state.args.max_body_bytes).await {
        Ok(req) => req,
        Err(e) => {
            warn!("[{}] Failed to read request body: {}", addr, e);
            return Ok(to_boxed(with_cors(error_response(&e))));
        }
    };

    info!("[{}] {} {}", addr, req.method, req.path);

    let response = route(&state, req).await;
    Ok(to_boxed(with_cors(response)))
}

/// Dispatch one request
pub async fn route(state: &AppState, req: ApiRequest) -> Response<Full<Bytes>> {
    let path = req.path.clone();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (req.method.clone(), segments.as_slice()) {
        // Liveness + resolved engine chain
        (Method::GET, ["health"]) | (Method::GET, ["healthz"]) => Ok(routes::health_check(state)),

        // CORS preflight
        (Method::OPTIONS, _) => Ok(preflight_response()),

        // ====================================================================
        // Citizens
        // ====================================================================
        (Method::GET, ["api", "citizens"]) => routes::handle_list_citizens(state, &req).await,
        (Method::POST, ["api", "citizens"]) => routes::handle_create_citizen(state, &req).await,
        (Method::GET, ["api", "citizens", id]) => routes::handle_get_citizen(state, id).await,
        (Method::PUT, ["api", "citizens", id]) => {
            routes::handle_update_citizen(state, &req, id).await
        }
        (Method::DELETE, ["api", "citizens", id]) => {
            routes::handle_delete_citizen(state, &req, id).await
        }

        // ====================================================================
        // Applications
        // ====================================================================
        (Method::GET, ["api", "applications"]) => {
            routes::handle_list_applications(state, &req).await
        }
        (Method::POST, ["api", "applications"]) => {
            routes::handle_submit_application(state, &req).await
        }
        (Method::GET, ["api", "applications", id]) => {
            routes::handle_get_application(state, id).await
        }
        (Method::GET, ["api", "applications", id, "history"]) => {
            routes::handle_application_history(state, id).await
        }
        (Method::PUT, ["api", "applications", id, "status"]) => {
            routes::handle_update_status(state, &req, id).await
        }
        (Method::GET, ["api", "applications", id, "payment"]) => {
            routes::handle_application_payment(state, id).await
        }

        // ====================================================================
        // Payments
        // ====================================================================
        (Method::GET, ["api", "payments"]) => routes::handle_list_payments(state, &req).await,
        (Method::POST, ["api", "payments"]) => routes::handle_create_payment(state, &req).await,
        (Method::GET, ["api", "payments", id]) => routes::handle_get_payment(state, id).await,
        (Method::PUT, ["api", "payments", id, "status"]) => {
            routes::handle_update_payment_status(state, &req, id).await
        }

        // ====================================================================
        // Notifications
        // ====================================================================
        (Method::GET, ["api", "notifications"]) => {
            routes::handle_list_notifications(state, &req).await
        }
        (Method::GET, ["api", "notifications", "unread-count"]) => {
            routes::handle_unread_count(state, &req).await
        }
        (Method::PUT, ["api", "notifications", "read-all"]) => {
            routes::handle_mark_all_read(state, &req).await
        }
        (Method::PUT, ["api", "notifications", id, "read"]) => {
            routes::handle_mark_read(state, id).await
        }
        (Method::DELETE, ["api", "notifications", id]) => {
            routes::handle_delete_notification(state, id).await
        }

        // ====================================================================
        // Admin
        // ====================================================================
        (Method::POST, ["admin", "notifications", "broadcast"]) => {
            routes::handle_broadcast(state, &req).await
        }
        (Method::GET, ["admin", "dashboard"]) => routes::handle_dashboard(state, &req).await,

        _ => Ok(not_found_response(&path)),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}
