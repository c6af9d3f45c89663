//! Shared helpers for API integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use storefront::{build_router, AppState, Config, Fixture, MemoryStore};

pub const BOUNDARY: &str = "storefront-test-boundary";

/// Users 1 (alice) and 2 (bob); products Lamp (1) and Desk (2); one order of
/// bob's for the lamp.
pub const FIXTURE: &str = r#"{
    "users": [
        { "id": 1, "username": "alice" },
        { "id": 2, "username": "bob" }
    ],
    "products": [
        { "name": "Lamp", "price": "19.99", "description": "Brass desk lamp" },
        { "name": "Desk", "price": "120.00", "description": "Oak desk", "discount": 10 }
    ],
    "orders": [
        { "delivery_address": "Baker st 221b", "promocode": "SALE", "user": 2, "products": [1] }
    ]
}"#;

pub fn seeded_store() -> MemoryStore {
    MemoryStore::from_fixture(Fixture::from_json(FIXTURE).unwrap()).unwrap()
}

/// Router over the seeded store, plus the state for direct inspection.
pub fn build_test_app() -> (Router, AppState) {
    let state = AppState::new(seeded_store(), Config::default());
    (build_router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST `content` as the `file` field of a multipart form.
pub async fn upload(app: &Router, uri: &str, content: &[u8]) -> Response {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.csv\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::post(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
