//! Cash-register routes: movements, daily base and day summary

use super::crud_handlers::{self, object_body};
use super::handlers::{created, ok, AdminState, ApiResult, AppError, Envelope, Json};
use crate::auth::AuthUser;
use crate::caja::{
    BaseDiariaCreada, BaseDiariaEstado, Movimiento, ResumenCaja, TipoMovimiento, BASE_MARKER,
};
use crate::store::{Record, Resource};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/caja", get(list_movimientos).post(create_movimiento))
        .route("/api/caja/tipo/{tipo}", get(movimientos_por_tipo))
        .route("/api/caja/pedido/{id_pedido}", get(movimientos_por_pedido))
        .route(
            "/api/caja/base-diaria",
            get(verificar_base_diaria).post(crear_base_diaria),
        )
        .route("/api/caja/resumen", get(resumen))
        .route(
            "/api/caja/{id}",
            get(crud_handlers::get_record)
                .put(update_movimiento)
                .delete(crud_handlers::delete_record),
        )
        .layer(Extension(Resource::Caja))
}

// ============================================================================
// Request types
// ============================================================================

/// `?fecha=YYYY-MM-DD`, the caller's local date; defaults to the server's
#[derive(Debug, Default, Deserialize)]
pub struct FechaQuery {
    pub fecha: Option<String>,
}

/// Request body for POST /api/caja/base-diaria
#[derive(Debug, Deserialize)]
pub struct BaseDiariaRequest {
    pub monto: f64,
    pub fecha: Option<String>,
}

fn parse_fecha(state: &AdminState, fecha: Option<&str>) -> Result<NaiveDate, AppError> {
    match fecha.map(str::trim).filter(|f| !f.is_empty()) {
        None => Ok(state.caja.today()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(format!("Fecha no válida (AAAA-MM-DD): {}", raw))
        }),
    }
}

/// Build a movement from a request body: `tipo` and `monto` are required,
/// `fecha` defaults to now and `id_usuario` to the caller.
fn movimiento_from_body(
    mut body: Record,
    usuario: Option<&AuthUser>,
) -> Result<Movimiento, AppError> {
    body.remove("id_movimiento");
    if !body.contains_key("fecha") || body.get("fecha").is_some_and(Value::is_null) {
        body.insert("fecha".into(), Value::from(chrono::Utc::now().to_rfc3339()));
    }
    if !body.contains_key("id_usuario") {
        if let Some(usuario) = usuario {
            body.insert("id_usuario".into(), Value::from(usuario.id_usuario));
        }
    }
    if let Some(Value::String(tipo)) = body.get("tipo") {
        let tipo = tipo.trim().to_lowercase();
        body.insert("tipo".into(), Value::from(tipo));
    }

    let movimiento = Movimiento::from_record(&body)
        .map_err(|e| AppError::BadRequest(format!("Movimiento no válido: {}", e)))?;
    reject_marker(&movimiento.descripcion)?;
    Ok(movimiento)
}

/// Only the daily-base operation may write the marker
fn reject_marker(descripcion: &str) -> Result<(), AppError> {
    if descripcion.contains(BASE_MARKER) {
        return Err(AppError::BadRequest(format!(
            "La marca {} está reservada para la base diaria",
            BASE_MARKER
        )));
    }
    Ok(())
}

/// Check and normalise the columns of a partial movement update
fn movimiento_changes(mut changes: Record) -> Result<Record, AppError> {
    changes.remove("id_movimiento");
    if let Some(tipo) = changes.get("tipo") {
        let tipo: TipoMovimiento = tipo
            .as_str()
            .unwrap_or_default()
            .parse()
            .map_err(|t| AppError::BadRequest(format!("Tipo de movimiento no válido: {}", t)))?;
        changes.insert("tipo".into(), Value::from(tipo.as_str()));
    }
    if let Some(monto) = changes.get("monto") {
        match monto.as_f64() {
            Some(m) if m.is_finite() && m >= 0.0 => {}
            _ => return Err(AppError::BadRequest(format!("Monto no válido: {}", monto))),
        }
    }
    if let Some(descripcion) = changes.get("descripcion").and_then(Value::as_str) {
        reject_marker(descripcion)?;
    }
    Ok(changes)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/caja
pub async fn list_movimientos(State(state): State<AdminState>) -> ApiResult<Vec<Record>> {
    let rows = state.store.list(Resource::Caja).await?;
    debug!(count = rows.len(), "Listed movements");
    Ok(ok("Movimientos obtenidos", rows))
}

/// POST /api/caja
pub async fn create_movimiento(
    State(state): State<AdminState>,
    usuario: Option<AuthUser>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), AppError> {
    let movimiento = movimiento_from_body(object_body(body)?, usuario.as_ref())?;
    let row = state.caja.registrar(&movimiento).await?;
    Ok(created("Movimiento registrado", row))
}

/// PUT /api/caja/{id}
pub async fn update_movimiento(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    let changes = movimiento_changes(object_body(body)?)?;
    Ok(ok(
        "Movimiento actualizado",
        crud_handlers::update(&state, Resource::Caja, &id, changes).await?,
    ))
}

/// GET /api/caja/tipo/{tipo}
pub async fn movimientos_por_tipo(
    State(state): State<AdminState>,
    Path(tipo): Path<String>,
) -> ApiResult<Vec<Record>> {
    Ok(ok("Movimientos obtenidos", state.caja.por_tipo(&tipo).await?))
}

/// GET /api/caja/pedido/{id_pedido}
pub async fn movimientos_por_pedido(
    State(state): State<AdminState>,
    Path(id_pedido): Path<String>,
) -> ApiResult<Vec<Record>> {
    Ok(ok(
        "Movimientos obtenidos",
        state.caja.por_pedido(&id_pedido).await?,
    ))
}

/// GET /api/caja/base-diaria
pub async fn verificar_base_diaria(
    State(state): State<AdminState>,
    Query(query): Query<FechaQuery>,
) -> ApiResult<BaseDiariaEstado> {
    let fecha = parse_fecha(&state, query.fecha.as_deref())?;
    let estado = state.caja.verificar_base_diaria(fecha).await?;
    Ok(ok("Base diaria verificada", estado))
}

/// POST /api/caja/base-diaria: a second base for the same day is a 500
pub async fn crear_base_diaria(
    State(state): State<AdminState>,
    Query(query): Query<FechaQuery>,
    usuario: Option<AuthUser>,
    Json(req): Json<BaseDiariaRequest>,
) -> Result<(StatusCode, Json<Envelope<BaseDiariaCreada>>), AppError> {
    let fecha = parse_fecha(&state, req.fecha.as_deref().or(query.fecha.as_deref()))?;
    let creada = state
        .caja
        .crear_base_diaria(req.monto, usuario.map(|u| u.id_usuario), fecha)
        .await?;
    Ok(created("Base diaria registrada", creada))
}

/// GET /api/caja/resumen
pub async fn resumen(
    State(state): State<AdminState>,
    Query(query): Query<FechaQuery>,
) -> ApiResult<ResumenCaja> {
    let fecha = parse_fecha(&state, query.fecha.as_deref())?;
    Ok(ok("Resumen de caja", state.caja.resumen(fecha).await?))
}
