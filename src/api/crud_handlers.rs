//! Generic CRUD handlers and the per-table router factory.
//!
//! Each registered table gets `/api/{table}` and `/api/{table}/{id}` with
//! the same five handlers; the table is carried to them as an `Extension`.

use super::handlers::{created, ok, AdminState, ApiResult, AppError, Envelope, Json};
use crate::store::{Record, RecordKey, Resource};
use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde_json::Value;
use tracing::{debug, info};

pub const TABLA_NO_REGISTRADA: &str = "Tabla no registrada";
pub const REGISTRO_NO_ENCONTRADO: &str = "Registro no encontrado";

/// Routes for one table, served by the generic handlers
pub fn resource_routes(resource: Resource) -> Router<AdminState> {
    Router::new()
        .route(
            &format!("/api/{}", resource.table()),
            get(list_records).post(create_record),
        )
        .route(
            &format!("/api/{}/{{id}}", resource.table()),
            get(get_record).put(update_record).delete(delete_record),
        )
        .layer(Extension(resource))
}

/// List and get only; any other method answers 405 with the error envelope
pub fn read_only_routes(resource: Resource) -> Router<AdminState> {
    Router::new()
        .route(
            &format!("/api/{}", resource.table()),
            get(list_records).fallback(read_only),
        )
        .route(
            &format!("/api/{}/{{id}}", resource.table()),
            get(get_record).fallback(read_only),
        )
        .layer(Extension(resource))
}

async fn read_only(Extension(resource): Extension<Resource>) -> AppError {
    AppError::Rejected(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("La tabla {} es de solo lectura", resource.table()),
    )
}

/// Require a JSON object body
pub fn object_body(body: Value) -> Result<Record, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest("Se esperaba un objeto JSON".to_string())),
    }
}

// ============================================================================
// Operations shared with the dedicated routers
// ============================================================================

pub async fn find(state: &AdminState, resource: Resource, id: &str) -> Result<Record, AppError> {
    let key = RecordKey::parse(id);
    state
        .store
        .get(resource, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(REGISTRO_NO_ENCONTRADO.to_string()))
}

pub async fn insert(
    state: &AdminState,
    resource: Resource,
    record: &Record,
) -> Result<Record, AppError> {
    let row = state.store.insert(resource, record).await?;
    info!(
        table = resource.table(),
        id = ?row.get(resource.primary_key()),
        "Record created"
    );
    Ok(row)
}

pub async fn update(
    state: &AdminState,
    resource: Resource,
    id: &str,
    changes: Record,
) -> Result<Record, AppError> {
    let key = RecordKey::parse(id);
    let row = state
        .store
        .update(resource, &key, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(REGISTRO_NO_ENCONTRADO.to_string()))?;
    info!(table = resource.table(), id = %key, "Record updated");
    Ok(row)
}

pub async fn remove(state: &AdminState, resource: Resource, id: &str) -> Result<Record, AppError> {
    let key = RecordKey::parse(id);
    if !state.store.delete(resource, &key).await? {
        return Err(AppError::NotFound(REGISTRO_NO_ENCONTRADO.to_string()));
    }
    info!(table = resource.table(), id = %key, "Record deleted");

    let mut confirmation = Record::new();
    confirmation.insert(resource.primary_key().to_string(), key.to_value());
    Ok(confirmation)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/{table}
pub async fn list_records(
    State(state): State<AdminState>,
    Extension(resource): Extension<Resource>,
) -> ApiResult<Vec<Record>> {
    let rows = state.store.list(resource).await?;
    debug!(table = resource.table(), count = rows.len(), "Listed records");
    Ok(ok("Registros obtenidos", rows))
}

/// GET /api/{table}/{id}
pub async fn get_record(
    State(state): State<AdminState>,
    Extension(resource): Extension<Resource>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    Ok(ok("Registro obtenido", find(&state, resource, &id).await?))
}

/// POST /api/{table}
pub async fn create_record(
    State(state): State<AdminState>,
    Extension(resource): Extension<Resource>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), AppError> {
    let record = object_body(body)?;
    Ok(created("Registro creado", insert(&state, resource, &record).await?))
}

/// PUT /api/{table}/{id}: only the columns present in the body are written
pub async fn update_record(
    State(state): State<AdminState>,
    Extension(resource): Extension<Resource>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    let changes = object_body(body)?;
    Ok(ok(
        "Registro actualizado",
        update(&state, resource, &id, changes).await?,
    ))
}

/// DELETE /api/{table}/{id}: answers `{ <pk>: id }`
pub async fn delete_record(
    State(state): State<AdminState>,
    Extension(resource): Extension<Resource>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    Ok(ok("Registro eliminado", remove(&state, resource, &id).await?))
}

/// Fallback for paths that match no route
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    let mensaje = if uri.path().starts_with("/api/") {
        TABLA_NO_REGISTRADA
    } else {
        "Ruta no encontrada"
    };
    AppError::NotFound(mensaje.to_string())
}
