//! Read-only joined views over the alteration catalog and the storage
//! drawers.

use super::handlers::{ok, AdminState, ApiResult, AppError};
use crate::store::{Record, Resource};
use axum::{extract::State, routing::get, Router};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/combinaciones/detalle", get(combinaciones_detalle))
        .route("/api/cajones-con-codigos", get(cajones_con_codigos))
}

/// `pk` → `nombre` for every row of `resource`
async fn nombres(state: &AdminState, resource: Resource) -> Result<HashMap<i64, String>, AppError> {
    let pk = resource.primary_key();
    Ok(state
        .store
        .list(resource)
        .await?
        .into_iter()
        .filter_map(|row| {
            let id = row.get(pk).and_then(Value::as_i64)?;
            let nombre = row.get("nombre").and_then(Value::as_str)?.to_string();
            Some((id, nombre))
        })
        .collect())
}

fn nombre_de(nombres: &HashMap<i64, String>, row: &Record, fk: &str) -> Value {
    row.get(fk)
        .and_then(Value::as_i64)
        .and_then(|id| nombres.get(&id))
        .map(|n| Value::from(n.as_str()))
        .unwrap_or(Value::Null)
}

/// GET /api/combinaciones/detalle: each combination with the names of its
/// prenda, ajuste and acción
pub async fn combinaciones_detalle(State(state): State<AdminState>) -> ApiResult<Vec<Record>> {
    let prendas = nombres(&state, Resource::Prendas).await?;
    let ajustes = nombres(&state, Resource::Ajustes).await?;
    let acciones = nombres(&state, Resource::Acciones).await?;

    let rows: Vec<Record> = state
        .store
        .list(Resource::Combinaciones)
        .await?
        .into_iter()
        .map(|mut row| {
            let prenda = nombre_de(&prendas, &row, "id_prenda");
            let ajuste = nombre_de(&ajustes, &row, "id_ajuste");
            let accion = nombre_de(&acciones, &row, "id_accion");
            row.insert("prenda".into(), prenda);
            row.insert("ajuste".into(), ajuste);
            row.insert("accion".into(), accion);
            row
        })
        .collect();

    debug!(count = rows.len(), "Listed catalog combinations");
    Ok(ok("Combinaciones obtenidas", rows))
}

/// GET /api/cajones-con-codigos: every drawer with its codes nested under
/// `codigos`
pub async fn cajones_con_codigos(State(state): State<AdminState>) -> ApiResult<Vec<Record>> {
    let mut por_cajon: HashMap<i64, Vec<Value>> = HashMap::new();
    for codigo in state.store.list(Resource::Codigos).await? {
        if let Some(id_cajon) = codigo.get("id_cajon").and_then(Value::as_i64) {
            por_cajon
                .entry(id_cajon)
                .or_default()
                .push(Value::Object(codigo));
        }
    }

    let cajones = state
        .store
        .list(Resource::Cajones)
        .await?
        .into_iter()
        .map(|mut cajon| {
            let codigos = cajon
                .get("id_cajon")
                .and_then(Value::as_i64)
                .and_then(|id| por_cajon.remove(&id))
                .unwrap_or_default();
            cajon.insert("codigos".into(), Value::Array(codigos));
            cajon
        })
        .collect();

    Ok(ok("Cajones obtenidos", cajones))
}
