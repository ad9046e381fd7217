use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Login, AUTH_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- tests ---

#[tokio::test]
async fn get_tests_is_ok() {
    let resp = app().oneshot(get("/tests")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn post_tests_echoes_body() {
    let resp = app()
        .oneshot(json_request("POST", "/tests", r#"{"dynamic":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({ "dynamic": true }));
}

#[tokio::test]
async fn post_tests_without_json_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tests")
                .body("not json".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// --- redirect ---

#[tokio::test]
async fn redirect_returns_302_with_location_and_echo() {
    let resp = app()
        .oneshot(json_request("POST", "/redirect", r#"{"dynamic":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/login");
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({ "dynamic": true }));
}

// --- login / restricted ---

#[tokio::test]
async fn login_issues_a_stable_token() {
    let app = app();
    let first: Login = body_json(app.clone().oneshot(get("/login")).await.unwrap()).await;
    let second: Login = body_json(app.oneshot(get("/login")).await.unwrap()).await;

    assert!(!first.token.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn restricted_without_token_is_unauthorized() {
    let resp = app().oneshot(get("/restricted")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn restricted_before_login_rejects_any_header() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/restricted")
                .header(AUTH_HEADER, "guess")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn restricted_with_token_is_authorized() {
    let app = app();
    let login: Login = body_json(app.clone().oneshot(get("/login")).await.unwrap()).await;

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/restricted")
                .header(AUTH_HEADER, login.token)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({ "authorized": true }));
}

// --- upload ---

#[tokio::test]
async fn upload_echoes_file_content() {
    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"file.txt\"\r\n",
        "Content-Type: application/octet-stream\r\n\r\n",
        "TEST FILE CONTENT HERE\r\n",
        "--XBOUNDARY--\r\n",
    );
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
                .body(body.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "TEST FILE CONTENT HERE");
}

#[tokio::test]
async fn upload_without_multipart_is_rejected() {
    let resp = app()
        .oneshot(json_request("POST", "/upload", "{}"))
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

// --- fallback ---

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app().oneshot(get("/nope")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
