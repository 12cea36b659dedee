//! Order routes: validated intake, state changes, returns and invoices

use super::crud_handlers::{self, object_body, update};
use super::handlers::{created, ok, AdminState, ApiResult, AppError, Envelope, Json};
use crate::auth::AuthUser;
use crate::pedidos::{Devolucion, EstadoPedido, Factura, PedidoCreado};
use crate::store::{Record, Resource};
use crate::validation::{validate_pedido, Mode};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::Value;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route(
            "/api/pedidos",
            get(crud_handlers::list_records).post(create_pedido),
        )
        .route(
            "/api/pedidos/{id}",
            get(crud_handlers::get_record)
                .put(update_pedido)
                .delete(crud_handlers::delete_record),
        )
        .route("/api/pedidos/{id}/estado", put(cambiar_estado))
        .route("/api/pedidos/{id}/devolucion", post(devolver))
        .route("/api/pedidos/{id}/factura", get(factura))
        .layer(Extension(Resource::Pedidos))
}

/// Request body for PUT /api/pedidos/{id}/estado
#[derive(Debug, Deserialize)]
pub struct EstadoRequest {
    pub estado: String,
}

/// Request body for POST /api/pedidos/{id}/devolucion
#[derive(Debug, Default, Deserialize)]
pub struct DevolucionRequest {
    pub monto: Option<f64>,
    pub motivo: Option<String>,
}

/// POST /api/pedidos: order, detail lines and down payment in one call
pub async fn create_pedido(
    State(state): State<AdminState>,
    usuario: Option<AuthUser>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<PedidoCreado>>), AppError> {
    validate_pedido(&body, Mode::Create)?;
    let record = object_body(body)?;
    let creado = state
        .pedidos
        .crear(record, usuario.map(|u| u.id_usuario))
        .await?;
    Ok(created("Pedido creado", creado))
}

/// PUT /api/pedidos/{id}: order columns only; lines and state have their
/// own routes
pub async fn update_pedido(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    validate_pedido(&body, Mode::Update)?;
    let mut changes = object_body(body)?;
    changes.remove("detalles");
    if let Some(estado) = changes.get("estado").and_then(Value::as_str) {
        let estado: EstadoPedido = estado
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Estado no válido: {}", e)))?;
        changes.insert("estado".into(), Value::from(estado.as_str()));
    }
    Ok(ok(
        "Pedido actualizado",
        update(&state, Resource::Pedidos, &id, changes).await?,
    ))
}

/// PUT /api/pedidos/{id}/estado
pub async fn cambiar_estado(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(req): Json<EstadoRequest>,
) -> ApiResult<Record> {
    let estado: EstadoPedido = req
        .estado
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Estado no válido: {}", e)))?;
    Ok(ok(
        "Estado actualizado",
        state.pedidos.cambiar_estado(&id, estado).await?,
    ))
}

/// POST /api/pedidos/{id}/devolucion
pub async fn devolver(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    usuario: Option<AuthUser>,
    Json(req): Json<DevolucionRequest>,
) -> ApiResult<Devolucion> {
    let devolucion = state
        .pedidos
        .devolver(
            &id,
            req.monto,
            req.motivo.as_deref(),
            usuario.map(|u| u.id_usuario),
        )
        .await?;
    Ok(ok("Pedido devuelto", devolucion))
}

/// GET /api/pedidos/{id}/factura
pub async fn factura(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> ApiResult<Factura> {
    Ok(ok("Factura generada", state.pedidos.factura(&id).await?))
}

#[cfg(test)]
mod tests {
    use crate::store::{RecordStore, Resource};
    use crate::test_helpers::{
        mock_server_state, record, seed, send, sql_server_state, test_router,
    };
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn nuevo_pedido(id_cliente: &Value) -> Value {
        json!({
            "id_cliente": id_cliente,
            "fecha_inicio": "2026-10-16",
            "fecha_entrega": "2026-10-20",
            "total": 40000,
            "abono": 15000,
            "detalles": [
                {"id_combinacion": 1, "cantidad": 2, "precio": 20000}
            ]
        })
    }

    #[tokio::test]
    async fn test_create_pedido_with_abono() {
        let (state, store) = mock_server_state(None);
        let cliente = seed(&store, Resource::Clientes, json!({"nombre": "Ana"})).await;
        let app = test_router(state);

        let (status, json) = send(
            &app,
            "POST",
            "/api/pedidos",
            Some(nuevo_pedido(&cliente["id_cliente"])),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["pedido"]["estado"], "pendiente");
        assert_eq!(json["data"]["detalles"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"]["abono"]["tipo"], "entrada");
        assert_eq!(json["data"]["abono"]["monto"], 15000.0);
        assert_eq!(store.count(Resource::DetallePedido).await, 1);
        assert_eq!(store.count(Resource::Caja).await, 1);
    }

    #[tokio::test]
    async fn test_create_pedido_date_order() {
        let (state, store) = mock_server_state(None);
        let app = test_router(state);

        let body = json!({
            "id_cliente": 1,
            "fecha_inicio": "2026-10-20",
            "fecha_entrega": "2026-10-16"
        });
        let (status, json) = send(&app, "POST", "/api/pedidos", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errores"]["fecha_entrega"].is_string());
        assert_eq!(store.count(Resource::Pedidos).await, 0);
    }

    #[tokio::test]
    async fn test_estado_transitions() {
        let (state, store) = mock_server_state(None);
        let pedido = seed(
            &store,
            Resource::Pedidos,
            json!({"id_cliente": 1, "fecha_inicio": "2026-10-16", "fecha_entrega": "2026-10-18", "estado": "pendiente"}),
        )
        .await;
        let app = test_router(state);
        let uri = format!("/api/pedidos/{}/estado", pedido["id_pedido"]);

        let (status, json) = send(&app, "PUT", &uri, Some(json!({"estado": "En proceso"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["estado"], "en_proceso");

        let (status, _) = send(&app, "PUT", &uri, Some(json!({"estado": "perdido"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PUT",
            "/api/pedidos/404/estado",
            Some(json!({"estado": "terminado"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_devolucion_once() {
        let (state, store) = mock_server_state(None);
        let pedido = seed(
            &store,
            Resource::Pedidos,
            json!({"id_cliente": 1, "fecha_inicio": "2026-10-16", "fecha_entrega": "2026-10-18", "estado": "terminado", "abono": 12000}),
        )
        .await;
        let app = test_router(state);
        let uri = format!("/api/pedidos/{}/devolucion", pedido["id_pedido"]);

        let (status, json) = send(&app, "POST", &uri, Some(json!({"motivo": "No quedó bien"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["pedido"]["estado"], "devuelto");
        assert_eq!(json["data"]["movimiento"]["tipo"], "salida");
        assert_eq!(json["data"]["movimiento"]["monto"], 12000.0);

        let (status, json) = send(&app, "POST", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(store.count(Resource::Caja).await, 1);
    }

    #[tokio::test]
    async fn test_factura() {
        let (state, store) = mock_server_state(None);
        let cliente = seed(&store, Resource::Clientes, json!({"nombre": "Ana"})).await;
        let app = test_router(state);

        let (_, json) = send(
            &app,
            "POST",
            "/api/pedidos",
            Some(nuevo_pedido(&cliente["id_cliente"])),
        )
        .await;
        let uri = format!("/api/pedidos/{}/factura", json["data"]["pedido"]["id_pedido"]);

        let (status, json) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["cliente"]["nombre"], "Ana");
        assert_eq!(json["data"]["total"], 40000.0);
        assert_eq!(json["data"]["saldo"], 25000.0);
        assert_eq!(json["data"]["detalles"][0]["subtotal"], 40000.0);

        let (status, _) = send(&app, "GET", "/api/pedidos/999/factura", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_ignores_detalles_and_checks_estado() {
        let (state, store) = mock_server_state(None);
        let pedido = seed(
            &store,
            Resource::Pedidos,
            json!({"id_cliente": 1, "fecha_inicio": "2026-10-16", "fecha_entrega": "2026-10-18", "estado": "pendiente"}),
        )
        .await;
        let app = test_router(state);
        let uri = format!("/api/pedidos/{}", pedido["id_pedido"]);

        let (status, json) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"observaciones": "Urgente", "detalles": []})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["observaciones"], "Urgente");
        assert!(json["data"].get("detalles").is_none());

        let (status, _) = send(&app, "PUT", &uri, Some(json!({"estado": "extraviado"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_pedido_with_unknown_combination_leaves_nothing() {
        let (state, store) = sql_server_state(None).await;
        let cliente = store
            .insert(Resource::Clientes, &record(json!({"nombre": "Ana"})))
            .await
            .unwrap();
        let app = test_router(state);

        let (status, json) = send(
            &app,
            "POST",
            "/api/pedidos",
            Some(nuevo_pedido(&cliente["id_cliente"])),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["ok"], false);

        let (status, json) = send(&app, "GET", "/api/pedidos", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], json!([]));
        assert!(store.list(Resource::DetallePedido).await.unwrap().is_empty());
        assert!(store.list(Resource::Caja).await.unwrap().is_empty());
    }
}
