//! Client routes: the generic CRUD surface with field validation on writes

use super::crud_handlers::{self, insert, object_body, update};
use super::handlers::{created, ok, AdminState, ApiResult, AppError, Envelope, Json};
use crate::store::{Record, Resource};
use crate::validation::{validate_cliente, Mode};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Router,
};
use serde_json::Value;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route(
            "/api/clientes",
            get(crud_handlers::list_records).post(create_cliente),
        )
        .route(
            "/api/clientes/{id}",
            get(crud_handlers::get_record)
                .put(update_cliente)
                .delete(crud_handlers::delete_record),
        )
        .layer(Extension(Resource::Clientes))
}

/// POST /api/clientes
pub async fn create_cliente(
    State(state): State<AdminState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), AppError> {
    validate_cliente(&body, Mode::Create)?;
    let record = object_body(body)?;
    Ok(created(
        "Cliente creado",
        insert(&state, Resource::Clientes, &record).await?,
    ))
}

/// PUT /api/clientes/{id}
pub async fn update_cliente(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    validate_cliente(&body, Mode::Update)?;
    let changes = object_body(body)?;
    Ok(ok(
        "Cliente actualizado",
        update(&state, Resource::Clientes, &id, changes).await?,
    ))
}
