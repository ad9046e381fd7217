use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Header that carries the token issued by `/login`.
pub const AUTH_HEADER: &str = "x-test-authorized";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Login {
    pub token: String,
}

/// Token issued by the first `/login`, reused afterwards.
pub type Token = Arc<RwLock<Option<String>>>;

pub fn app() -> Router {
    let token: Token = Arc::new(RwLock::new(None));
    Router::new()
        .route("/tests", get(list_tests).post(echo))
        .route("/redirect", post(redirect))
        .route("/login", get(login))
        .route("/restricted", get(restricted))
        .route("/upload", post(upload))
        .with_state(token)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn list_tests() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn redirect(Json(body): Json<Value>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/login")], Json(body)).into_response()
}

async fn login(State(token): State<Token>) -> Json<Login> {
    let mut slot = token.write().await;
    let token = slot
        .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
        .clone();
    tracing::debug!(%token, "issued login token");
    Json(Login { token })
}

async fn restricted(State(token): State<Token>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let expected = token.read().await.clone();
    let presented = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok());
    match (expected.as_deref(), presented) {
        (Some(expected), Some(presented)) if expected == presented => Ok(Json(json!({ "authorized": true }))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Echoes the contents of the first file field.
async fn upload(mut multipart: Multipart) -> Result<String, StatusCode> {
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        if field.file_name().is_some() {
            return field.text().await.map_err(|_| StatusCode::BAD_REQUEST);
        }
    }
    Err(StatusCode::BAD_REQUEST)
}
