//! AuthUser extractor for Axum handlers.
//!
//! Extracts the authenticated user's identity from request extensions
//! (populated by the `require_auth` middleware). Handlers that only want
//! to stamp `id_usuario` take `Option<AuthUser>`, which is `None` when the
//! API runs open.

use crate::api::handlers::AppError;
use crate::auth::jwt::Claims;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id_usuario: i64,
    pub usuario: String,
    pub id_rol: Option<i64>,
}

impl AuthUser {
    fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        let id_usuario = claims
            .id_usuario()
            .ok_or_else(|| AppError::Unauthorized("Usuario no válido en el token".to_string()))?;

        Ok(Self {
            id_usuario,
            usuario: claims.usuario.clone(),
            id_rol: claims.id_rol,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async {
            let claims = parts.extensions.get::<Claims>().ok_or_else(|| {
                AppError::Unauthorized("Autenticación requerida".to_string())
            })?;

            Self::from_claims(claims)
        }
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        async {
            parts
                .extensions
                .get::<Claims>()
                .map(Self::from_claims)
                .transpose()
        }
    }
}
