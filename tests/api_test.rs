//! End-to-end HTTP scenarios against a flat-file backed store.

use http_body_util::BodyExt;
use hyper::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use clap::Parser;
use seva_records::db::{FlatFileStore, UnifiedStore};
use seva_records::routes::ApiRequest;
use seva_records::{server, AppState, Args};

const ADMIN_KEY: &str = "test-admin-key";

async fn app() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let args = Args::try_parse_from(["seva-records", "--api-key-admin", ADMIN_KEY]).unwrap();
    let fallback = Arc::new(FlatFileStore::open(dir.path()).await.unwrap());
    let store = Arc::new(UnifiedStore::flat_file_only(fallback));
    (dir, AppState::new(args, store))
}

async fn call(state: &AppState, req: ApiRequest) -> (StatusCode, Value) {
    let response = server::route(state, req).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> ApiRequest {
    ApiRequest::new(Method::POST, uri, body.to_string())
}

fn put(uri: &str, body: Value) -> ApiRequest {
    ApiRequest::new(Method::PUT, uri, body.to_string())
}

fn get(uri: &str) -> ApiRequest {
    ApiRequest::new(Method::GET, uri, "")
}

fn admin(req: ApiRequest) -> ApiRequest {
    req.with_header("x-api-key", ADMIN_KEY)
        .with_header("x-admin-id", "officer-12")
}

#[tokio::test]
async fn health_reports_engine_chain() {
    let (_dir, state) = app().await;
    let (status, body) = call(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], json!(true));
    assert_eq!(body["primary"], json!("flat_file"));
    assert_eq!(body["engines"], json!(["flat_file"]));
}

#[tokio::test]
async fn citizen_lifecycle() {
    let (_dir, state) = app().await;

    let (status, body) = call(
        &state,
        post(
            "/api/citizens",
            json!({
                "name": "Manjunath Gowda",
                "phone_number": "9988776655",
                "email": "manju@example.in",
                "district": "Hassan",
                "gender": "male",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let citizen_id = body["data"]["citizen_id"].as_str().unwrap().to_string();
    assert!(citizen_id.starts_with("CIT"));
    assert_eq!(body["data"]["state"], json!("Karnataka"));

    let (status, body) = call(
        &state,
        put(&format!("/api/citizens/{}", citizen_id), json!({ "pincode": "573201" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pincode"], json!("573201"));
    assert_eq!(body["data"]["name"], json!("Manjunath Gowda"));

    let (status, body) = call(&state, get("/api/citizens?district=hassan")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], json!(1));

    // Delete needs the admin key
    let delete = ApiRequest::new(Method::DELETE, &format!("/api/citizens/{}", citizen_id), "");
    let (status, _) = call(&state, delete.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, admin(delete.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&state, admin(delete)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn driving_license_submission_and_review() {
    let (_dir, state) = app().await;

    let (status, body) = call(
        &state,
        post(
            "/api/applications",
            json!({
                "service_type": "DL",
                "citizen_id": "CIT42",
                "applicant_name": "Shreya Rao",
                "phone_number": "9000011111",
                "license_type": "MCWG",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let application_id = body["data"]["application_id"].as_str().unwrap().to_string();
    assert!(application_id.starts_with("DL"));
    assert_eq!(body["data"]["status"], json!("submitted"));

    // Transition requires admin
    let transition = put(
        &format!("/api/applications/{}/status", application_id),
        json!({ "status": "document_required", "reason": "Upload address proof" }),
    );
    let (status, _) = call(&state, transition.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&state, admin(transition)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("document_required"));

    let (_, body) = call(&state, get(&format!("/api/applications/{}/history", application_id))).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["changed_by"], json!("officer-12"));
    assert_eq!(history[1]["old_status"], json!("submitted"));

    let (_, body) = call(&state, get("/api/notifications/unread-count?user_id=CIT42")).await;
    assert_eq!(body["data"]["unread_count"], json!(2));

    let (_, body) = call(&state, get("/api/notifications?user_id=CIT42")).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["title"].as_str())
        .collect();
    assert!(titles.contains(&"Documents Required"));

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::PUT, "/api/notifications/read-all?user_id=CIT42", ""),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], json!(2));

    let empty = put(
        &format!("/api/applications/{}/status", application_id),
        json!({ "status": "" }),
    );
    let (status, _) = call(&state, admin(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_payment_returns_conflict_with_existing_id() {
    let (_dir, state) = app().await;

    let (_, body) = call(
        &state,
        post("/api/applications", json!({ "service_type": "birth_certificate", "phone_number": "9000022222" })),
    )
    .await;
    let application_id = body["data"]["application_id"].as_str().unwrap().to_string();
    assert!(application_id.starts_with("BC"));

    let payment = json!({ "application_id": application_id, "amount": 100.0 });
    let (status, body) = call(&state, post("/api/payments", payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = body["data"]["payment_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], json!("success"));

    let (status, body) = call(&state, post("/api/payments", payment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("PAYMENT_EXISTS"));
    assert_eq!(body["payment_id"], json!(payment_id));

    let (_, body) = call(&state, get(&format!("/api/applications/{}", application_id))).await;
    assert_eq!(body["data"]["status"], json!("payment_received"));

    let (status, body) = call(&state, get(&format!("/api/applications/{}/payment", application_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_id"], json!(payment_id));

    let (status, _) = call(
        &state,
        post("/api/payments", json!({ "application_id": application_id, "amount": -5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_broadcast_and_dashboard() {
    let (_dir, state) = app().await;

    let broadcast = post(
        "/admin/notifications/broadcast",
        json!({ "title": "Holiday", "message": "Offices closed on Monday" }),
    );
    let (status, _) = call(&state, broadcast.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&state, admin(broadcast)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["type"], json!("system"));
    assert!(body["data"].get("user_id").is_none());

    let (_, body) = call(&state, get("/api/notifications?user_id=anyone")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = call(&state, admin(get("/admin/dashboard"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unread_broadcasts"], json!(1));
    assert_eq!(body["data"]["total_applications"], json!(0));
}

#[tokio::test]
async fn unknown_routes_and_bad_bodies() {
    let (_dir, state) = app().await;

    let (status, _) = call(&state, get("/api/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&state, ApiRequest::new(Method::POST, "/api/citizens", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));

    let (status, _) = call(&state, get("/api/notifications")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&state, get("/api/payments/PAY0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
