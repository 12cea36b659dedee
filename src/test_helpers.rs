//! Test helper factories and mock state builders
#![allow(dead_code)]

use crate::api::handlers::{AdminState, ServerState};
use crate::auth::mailer::mock::RecordingMailer;
use crate::auth::password::hash_password;
use crate::caja::CajaManager;
use crate::pedidos::PedidoManager;
use crate::store::mock::MockStore;
use crate::store::{Record, RecordStore, Resource, SqlStore};
use crate::{AuthConfig, Config};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::FixedOffset;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_secs: 3600,
        reset_expiry_secs: 600,
        frontend_url: Some("http://localhost:5173".to_string()),
    }
}

pub fn test_config(auth_config: Option<AuthConfig>) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        server_port: 0,
        cors_origin: "*".to_string(),
        body_limit_bytes: 64 * 1024,
        auth_config,
    }
}

/// Server state over an empty in-memory store, dates in UTC
pub fn mock_server_state(auth_config: Option<AuthConfig>) -> (AdminState, Arc<MockStore>) {
    let (state, store, _) = mock_server_state_with_mailer(auth_config);
    (state, store)
}

pub fn mock_server_state_with_mailer(
    auth_config: Option<AuthConfig>,
) -> (AdminState, Arc<MockStore>, Arc<RecordingMailer>) {
    let store = Arc::new(MockStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let utc = FixedOffset::east_opt(0).expect("zero offset");
    let state = Arc::new(ServerState {
        store: store.clone(),
        caja: CajaManager::new(store.clone()).with_offset(utc),
        pedidos: PedidoManager::new(store.clone()),
        auth_config,
        mailer: mailer.clone(),
        password_cost: 4,
    });
    (state, store, mailer)
}

/// Server state over a fresh in-memory SQLite database, for paths that
/// depend on foreign keys and NOT NULL columns
pub async fn sql_server_state(auth_config: Option<AuthConfig>) -> (AdminState, Arc<SqlStore>) {
    // One connection: every in-memory connection is its own database
    let store = Arc::new(SqlStore::connect("sqlite::memory:", 1).await.expect("connect"));
    store.init_schema().await.expect("schema");
    let utc = FixedOffset::east_opt(0).expect("zero offset");
    let state = Arc::new(ServerState {
        store: store.clone(),
        caja: CajaManager::new(store.clone()).with_offset(utc),
        pedidos: PedidoManager::new(store.clone()),
        auth_config,
        mailer: Arc::new(RecordingMailer::default()),
        password_cost: 4,
    });
    (state, store)
}

/// Full router over a mock state
pub fn test_router(state: AdminState) -> Router {
    let config = test_config(state.auth_config.clone());
    crate::api::create_router(state, &config)
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record literal must be an object")
}

pub async fn seed(store: &MockStore, resource: Resource, value: Value) -> Record {
    store.insert(resource, &record(value)).await.expect("seed insert")
}

/// Insert a user with a bcrypt hash (cost 4) of `password`
pub async fn seed_usuario(
    store: &MockStore,
    usuario: &str,
    password: &str,
    id_rol: i64,
    activo: bool,
) -> Record {
    let hash = hash_password(password, 4).expect("hash");
    seed(
        store,
        Resource::Usuarios,
        serde_json::json!({
            "nombre": "Usuario Prueba",
            "usuario": usuario,
            "email": format!("{}@bluyin.test", usuario),
            "password": hash,
            "id_rol": id_rol,
            "activo": if activo { 1 } else { 0 },
        }),
    )
    .await
}

// ============================================================================
// Request helpers
// ============================================================================

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with_token(app, method, uri, body, None).await
}

pub async fn send_with_token(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    into_status_and_json(app, req).await
}

/// Send `body` verbatim, with the given content type if any
pub async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    into_status_and_json(app, req).await
}

async fn into_status_and_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
