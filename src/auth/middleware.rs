//! Session gate for the `/api` routes.
//!
//! A valid Bearer session token puts its `Claims` into the request
//! extensions, where `AuthUser` picks them up. Without an `auth` config
//! section the API is open and requests pass through untouched.

use crate::api::handlers::{AdminState, AppError};
use crate::auth::jwt::{decode_jwt, TokenPurpose};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Middleware that requires a valid session token when auth is configured.
///
/// 1. No `auth_config` → pass through
/// 2. Missing or malformed `Authorization: Bearer <token>` → 401
/// 3. Invalid, expired or non-session token → 401
/// 4. Inject `Claims` into request extensions for downstream handlers
pub async fn require_auth(
    State(state): State<AdminState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(auth_config) = state.auth_config.as_ref() else {
        return Ok(next.run(req).await);
    };

    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Token de acceso requerido".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Formato de autorización no válido".to_string()))?;

    let claims = decode_jwt(token, &auth_config.jwt_secret, TokenPurpose::Session).map_err(|e| {
        debug!("Rejected token: {:#}", e);
        AppError::Unauthorized("Token no válido o expirado".to_string())
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Tests
// ============================================================================
