//! Authentication route handlers: password login and password recovery.
//!
//! Endpoints (never behind `require_auth`):
//! - `POST /api/auth/login`: usuario/password login, JWT + permissions
//! - `POST /api/auth/recuperar`: mails a reset link when the email exists
//! - `POST /api/auth/restablecer`: sets a new password from a reset token

use super::handlers::{ok, AdminState, ApiResult, AppError, Json};
use super::usuario_handlers::{permisos_de_rol, sin_password};
use crate::auth::jwt::{decode_jwt, encode_jwt, Claims, TokenPurpose};
use crate::auth::password::{hash_password, is_bcrypt_hash, verify_password};
use crate::store::{Record, RecordKey, Resource};
use crate::validation::{FieldErrors, MIN_PASSWORD_LEN};
use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/recuperar", post(recuperar))
        .route("/api/auth/restablecer", post(restablecer))
}

// ============================================================================
// Request / Response types
// ============================================================================

/// Request body for POST /api/auth/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub usuario: String,
    pub password: String,
}

/// Response for POST /api/auth/login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// `None` when the API runs without an auth section
    pub token: Option<String>,
    pub usuario: Record,
    pub permisos: Vec<String>,
}

/// Request body for POST /api/auth/recuperar
#[derive(Debug, Deserialize)]
pub struct RecuperarRequest {
    pub email: String,
}

/// Request body for POST /api/auth/restablecer
#[derive(Debug, Deserialize)]
pub struct RestablecerRequest {
    pub token: String,
    pub password: String,
}

const CREDENCIALES_INVALIDAS: &str = "Usuario o contraseña incorrectos";
const RECUPERACION_ENVIADA: &str =
    "Si el correo está registrado, recibirá un enlace para restablecer la contraseña";

/// `activo` may be stored as 0/1, a boolean or text; missing means active
fn is_activo(usuario: &Record) -> bool {
    match usuario.get("activo") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !matches!(s.trim(), "0" | "false" | ""),
        Some(_) => true,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
///
/// Flow:
/// 1. Look up the user by `usuario`
/// 2. Verify the password with bcrypt
/// 3. Refuse inactive accounts (only after the password matched)
/// 4. Issue a session JWT when auth is configured
/// 5. Return the user without its hash, plus its role's permission names
///
/// Unknown user and wrong password give the same 401.
pub async fn login(
    State(state): State<AdminState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let invalid_credentials = || AppError::Unauthorized(CREDENCIALES_INVALIDAS.to_string());

    let usuario = state
        .store
        .find_by(
            Resource::Usuarios,
            "usuario",
            &Value::from(req.usuario.trim()),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(invalid_credentials)?;

    let hash = usuario
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !is_bcrypt_hash(hash) {
        warn!(usuario = %req.usuario, "Stored password is not a bcrypt hash");
    }
    if !verify_password(&req.password, hash) {
        debug!(usuario = %req.usuario, "Login rejected");
        return Err(invalid_credentials());
    }

    if !is_activo(&usuario) {
        return Err(AppError::Forbidden("Usuario inactivo".to_string()));
    }

    let id_usuario = usuario
        .get("id_usuario")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow::anyhow!("User row without id_usuario"))?;
    let id_rol = usuario.get("id_rol").and_then(Value::as_i64);

    let token = match state.auth_config.as_ref() {
        Some(auth_config) => Some(encode_jwt(
            &Claims::new(
                id_usuario,
                &req.usuario,
                id_rol,
                TokenPurpose::Session,
                auth_config.jwt_expiry_secs,
            ),
            &auth_config.jwt_secret,
        )?),
        None => None,
    };

    let permisos = match id_rol {
        Some(id_rol) => permisos_de_rol(&state, &id_rol.to_string())
            .await?
            .into_iter()
            .filter_map(|p| p.get("nombre").and_then(Value::as_str).map(str::to_string))
            .collect(),
        None => Vec::new(),
    };

    info!(id_usuario, usuario = %req.usuario, "User logged in");
    Ok(ok(
        "Inicio de sesión exitoso",
        LoginResponse {
            token,
            usuario: sin_password(usuario),
            permisos,
        },
    ))
}

/// POST /api/auth/recuperar: same answer whether or not the email exists
pub async fn recuperar(
    State(state): State<AdminState>,
    Json(req): Json<RecuperarRequest>,
) -> ApiResult<Value> {
    let respuesta = || ok(RECUPERACION_ENVIADA, Value::Null);

    let Some(auth_config) = state.auth_config.as_ref() else {
        warn!("Password recovery requested but no auth section is configured");
        return Ok(respuesta());
    };

    let usuario = state
        .store
        .find_by(Resource::Usuarios, "email", &Value::from(req.email.trim()))
        .await?
        .into_iter()
        .next();
    let Some(usuario) = usuario else {
        debug!("Password recovery for an unknown email");
        return Ok(respuesta());
    };

    let (Some(id_usuario), Some(nombre)) = (
        usuario.get("id_usuario").and_then(Value::as_i64),
        usuario.get("usuario").and_then(Value::as_str),
    ) else {
        warn!("User row without id_usuario or usuario");
        return Ok(respuesta());
    };

    let claims = Claims::new(
        id_usuario,
        nombre,
        usuario.get("id_rol").and_then(Value::as_i64),
        TokenPurpose::Reset,
        auth_config.reset_expiry_secs,
    );
    let token = encode_jwt(&claims, &auth_config.jwt_secret)?;

    let frontend = auth_config
        .frontend_url
        .as_deref()
        .unwrap_or("")
        .trim_end_matches('/');
    let body = format!(
        "Para restablecer su contraseña ingrese a: {}/restablecer?token={}\n\
         El enlace vence en {} minutos.",
        frontend,
        token,
        auth_config.reset_expiry_secs / 60
    );

    if let Err(e) = state
        .mailer
        .send(req.email.trim(), "Recuperación de contraseña", &body)
        .await
    {
        warn!(id_usuario, "Failed to send recovery mail: {:#}", e);
    } else {
        info!(id_usuario, "Recovery mail sent");
    }

    Ok(respuesta())
}

/// POST /api/auth/restablecer
pub async fn restablecer(
    State(state): State<AdminState>,
    Json(req): Json<RestablecerRequest>,
) -> ApiResult<Value> {
    let auth_config = state
        .auth_config
        .as_ref()
        .ok_or_else(|| AppError::Forbidden("Autenticación no configurada".to_string()))?;

    let claims = decode_jwt(&req.token, &auth_config.jwt_secret, TokenPurpose::Reset)
        .map_err(|e| {
            debug!("Rejected reset token: {:#}", e);
            AppError::BadRequest("Token no válido o expirado".to_string())
        })?;
    let id_usuario = claims
        .id_usuario()
        .ok_or_else(|| AppError::BadRequest("Token no válido o expirado".to_string()))?;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        let mut errors = FieldErrors::default();
        errors.add("password", "Debe tener al menos 6 caracteres");
        return Err(errors.into());
    }

    let mut changes = Record::new();
    changes.insert(
        "password".into(),
        Value::String(hash_password(&req.password, state.password_cost)?),
    );
    state
        .store
        .update(Resource::Usuarios, &RecordKey::Int(id_usuario), &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    info!(id_usuario, "Password reset");
    Ok(ok("Contraseña actualizada", Value::Null))
}

// ============================================================================
// Tests
// ============================================================================
