//! User and role routes.
//!
//! Users go through field validation, passwords are stored as bcrypt hashes
//! and the hash never leaves the server.

use super::crud_handlers::{self, find, insert, object_body, update};
use super::handlers::{created, ok, AdminState, ApiResult, AppError, Envelope, Json};
use crate::auth::password::hash_password;
use crate::store::{Record, RecordKey, Resource};
use crate::validation::{validate_usuario, Mode};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Router,
};
use serde_json::Value;
use tracing::{debug, warn};

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/usuarios", get(list_usuarios).post(create_usuario))
        .route(
            "/api/usuarios/{id}",
            get(get_usuario)
                .put(update_usuario)
                .delete(crud_handlers::delete_record),
        )
        .layer(Extension(Resource::Usuarios))
        .route("/api/roles/{id}/permisos", get(get_permisos_rol))
}

/// Drop the password hash from a user row
pub fn sin_password(mut usuario: Record) -> Record {
    usuario.remove("password");
    usuario
}

/// Replace a plain `password` in `record` with its hash
fn hash_in_place(state: &AdminState, record: &mut Record) -> Result<(), AppError> {
    let plain = match record.get("password") {
        Some(Value::String(plain)) => plain.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(()),
    };
    let hash = hash_password(&plain, state.password_cost)?;
    record.insert("password".into(), Value::String(hash));
    Ok(())
}

/// Permissions granted to a role, in grant order. Dangling grants are
/// skipped.
pub async fn permisos_de_rol(state: &AdminState, id_rol: &str) -> Result<Vec<Record>, AppError> {
    let key = RecordKey::parse(id_rol);
    let grants = state
        .store
        .find_by(Resource::RolPermisos, "id_rol", &key.to_value())
        .await?;

    let mut permisos = Vec::with_capacity(grants.len());
    for grant in grants {
        let Some(id_permiso) = grant.get("id_permiso").and_then(Value::as_i64) else {
            continue;
        };
        match state
            .store
            .get(Resource::Permisos, &RecordKey::Int(id_permiso))
            .await?
        {
            Some(permiso) => permisos.push(permiso),
            None => warn!(id_rol = %key, id_permiso, "Role grants a missing permission"),
        }
    }
    Ok(permisos)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/usuarios
pub async fn list_usuarios(State(state): State<AdminState>) -> ApiResult<Vec<Record>> {
    let rows = state.store.list(Resource::Usuarios).await?;
    debug!(count = rows.len(), "Listed users");
    Ok(ok(
        "Usuarios obtenidos",
        rows.into_iter().map(sin_password).collect(),
    ))
}

/// GET /api/usuarios/{id}
pub async fn get_usuario(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    let row = find(&state, Resource::Usuarios, &id).await?;
    Ok(ok("Usuario obtenido", sin_password(row)))
}

/// POST /api/usuarios
pub async fn create_usuario(
    State(state): State<AdminState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), AppError> {
    validate_usuario(&body, Mode::Create)?;
    let mut record = object_body(body)?;
    hash_in_place(&state, &mut record)?;

    let row = insert(&state, Resource::Usuarios, &record).await?;
    Ok(created("Usuario creado", sin_password(row)))
}

/// PUT /api/usuarios/{id}: a present `password` is re-hashed
pub async fn update_usuario(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    validate_usuario(&body, Mode::Update)?;
    let mut changes = object_body(body)?;
    hash_in_place(&state, &mut changes)?;

    let row = update(&state, Resource::Usuarios, &id, changes).await?;
    Ok(ok("Usuario actualizado", sin_password(row)))
}

/// GET /api/roles/{id}/permisos
pub async fn get_permisos_rol(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Record>> {
    find(&state, Resource::Roles, &id).await?;
    Ok(ok("Permisos obtenidos", permisos_de_rol(&state, &id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::store::RecordStore;
    use crate::test_helpers::{
        mock_server_state, record, seed, seed_usuario, send, sql_server_state, test_router,
    };
    use serde_json::json;

    fn nuevo_usuario() -> Value {
        json!({
            "nombre": "Carlos Ruiz",
            "usuario": "carlos",
            "email": "carlos@bluyin.test",
            "password": "secreto123",
            "id_rol": 1
        })
    }

    #[tokio::test]
    async fn test_create_hashes_and_hides_password() {
        let (state, store) = mock_server_state(None);
        let app = test_router(state);

        let (status, json) = send(&app, "POST", "/api/usuarios", Some(nuevo_usuario())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(json["data"].get("password").is_none());
        assert_eq!(json["data"]["usuario"], "carlos");

        let stored = store
            .find_by(Resource::Usuarios, "usuario", &json!("carlos"))
            .await
            .unwrap();
        let hash = stored[0]["password"].as_str().unwrap();
        assert_ne!(hash, "secreto123");
        assert!(verify_password("secreto123", hash));
    }

    #[tokio::test]
    async fn test_create_requires_password() {
        let (state, _) = mock_server_state(None);
        let app = test_router(state);

        let mut body = nuevo_usuario();
        body.as_object_mut().unwrap().remove("password");
        let (status, json) = send(&app, "POST", "/api/usuarios", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errores"]["password"].is_string());

        let mut body = nuevo_usuario();
        body["password"] = json!("corta");
        let (status, json) = send(&app, "POST", "/api/usuarios", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errores"]["password"].is_string());
    }

    #[tokio::test]
    async fn test_list_and_get_never_return_hash() {
        let (state, store) = mock_server_state(None);
        let row = seed_usuario(&store, "ana", "clave123", 1, true).await;
        let app = test_router(state);

        let (status, json) = send(&app, "GET", "/api/usuarios", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert!(json["data"][0].get("password").is_none());

        let uri = format!("/api/usuarios/{}", row["id_usuario"]);
        let (status, json) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["data"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_update_rehashes_password() {
        let (state, store) = mock_server_state(None);
        let row = seed_usuario(&store, "ana", "clave123", 1, true).await;
        let app = test_router(state);
        let uri = format!("/api/usuarios/{}", row["id_usuario"]);

        let (status, json) =
            send(&app, "PUT", &uri, Some(json!({"password": "nueva456"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["data"].get("password").is_none());

        let key = RecordKey::from_record(Resource::Usuarios, &row).unwrap();
        let stored = store.get(Resource::Usuarios, &key).await.unwrap().unwrap();
        assert!(verify_password("nueva456", stored["password"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_permisos_de_rol() {
        let (state, store) = mock_server_state(None);
        let rol = seed(&store, Resource::Roles, json!({"nombre": "admin"})).await;
        let ver = seed(&store, Resource::Permisos, json!({"nombre": "ver_caja"})).await;
        let editar = seed(&store, Resource::Permisos, json!({"nombre": "editar_pedidos"})).await;
        seed(&store, Resource::Permisos, json!({"nombre": "otro"})).await;
        for permiso in [&ver, &editar] {
            seed(
                &store,
                Resource::RolPermisos,
                json!({"id_rol": rol["id_rol"], "id_permiso": permiso["id_permiso"]}),
            )
            .await;
        }
        let app = test_router(state);

        let uri = format!("/api/roles/{}/permisos", rol["id_rol"]);
        let (status, json) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let nombres: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["nombre"].as_str().unwrap())
            .collect();
        assert_eq!(nombres, vec!["ver_caja", "editar_pedidos"]);

        let (status, _) = send(&app, "GET", "/api/roles/77/permisos", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_refuses_to_clear_password() {
        let (state, store) = sql_server_state(None).await;
        let row = store
            .insert(
                Resource::Usuarios,
                &record(json!({
                    "nombre": "Ana",
                    "usuario": "ana",
                    "email": "ana@bluyin.test",
                    "password": hash_password("clave123", 4).unwrap(),
                })),
            )
            .await
            .unwrap();
        let app = test_router(state);
        let uri = format!("/api/usuarios/{}", row["id_usuario"]);

        for password in [json!(null), json!("")] {
            let (status, json) =
                send(&app, "PUT", &uri, Some(json!({"password": password}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["errores"]["password"], "Campo obligatorio");
        }

        let (status, _) = send(&app, "PUT", &uri, Some(json!({"password": 12345678}))).await;
        assert_eq!(status, StatusCode::OK);

        let key = RecordKey::from_record(Resource::Usuarios, &row).unwrap();
        let stored = store.get(Resource::Usuarios, &key).await.unwrap().unwrap();
        assert!(verify_password("12345678", stored["password"].as_str().unwrap()));
    }
}
