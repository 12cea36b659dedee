//! Shared server state, response envelope and error mapping

use crate::auth::Mailer;
use crate::caja::{CajaError, CajaManager};
use crate::pedidos::{PedidoError, PedidoManager};
use crate::store::{RecordStore, StoreError};
use crate::validation::FieldErrors;
use crate::AuthConfig;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Shared server state
pub struct ServerState {
    pub store: Arc<dyn RecordStore>,
    pub caja: CajaManager,
    pub pedidos: PedidoManager,
    /// Auth config: None means the API is open
    pub auth_config: Option<AuthConfig>,
    pub mailer: Arc<dyn Mailer>,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

pub type AdminState = Arc<ServerState>;

// ============================================================================
// Envelope
// ============================================================================

/// JSON body extractor and response. Rejections (bad syntax, wrong
/// content type, wrong shape) answer with the error envelope.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Success body: `{ ok: true, mensaje, data }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub mensaje: String,
    pub data: T,
}

pub fn ok<T: Serialize>(mensaje: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        ok: true,
        mensaje: mensaje.into(),
        data,
    })
}

pub fn created<T: Serialize>(
    mensaje: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(mensaje, data))
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, AppError>;

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Health check handler: 503 when the database does not answer
pub async fn health(State(state): State<AdminState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = state.store.health_check().await.unwrap_or(false);

    let (http_status, status, database) = if db_ok {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
        }),
    )
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Validation(FieldErrors),
    Unauthorized(String),
    Forbidden(String),
    /// Request the extractors refused before the handler ran
    Rejected(StatusCode, String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errores) = match self {
            AppError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Datos inválidos".to_string(),
                Some(errors),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::Rejected(status, msg) => (status, msg, None),
        };

        let mut body = serde_json::json!({
            "ok": false,
            "mensaje": message,
        });
        if let Some(errores) = errores {
            body["errores"] = serde_json::json!(errores);
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let mensaje = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Se esperaba Content-Type: application/json".to_string()
            }
            JsonRejection::JsonSyntaxError(_) => {
                format!("JSON mal formado: {}", rejection.body_text())
            }
            _ => format!("Cuerpo de la petición no válido: {}", rejection.body_text()),
        };
        AppError::Rejected(rejection.status(), mensaje)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidColumn(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<CajaError> for AppError {
    fn from(err: CajaError) -> Self {
        match err {
            CajaError::TipoInvalido(_) | CajaError::MontoInvalido(_) => {
                AppError::BadRequest(err.to_string())
            }
            CajaError::Store(e) => e.into(),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<PedidoError> for AppError {
    fn from(err: PedidoError) -> Self {
        match err {
            PedidoError::NotFound(_) => AppError::NotFound(err.to_string()),
            PedidoError::YaDevuelto(_)
            | PedidoError::MontoInvalido(_)
            | PedidoError::DetalleInvalido => AppError::BadRequest(err.to_string()),
            PedidoError::Caja(e) => e.into(),
            PedidoError::Store(e) => e.into(),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}
