//! API route definitions

use super::handlers::{self, AdminState};
use super::{
    auth_handlers, caja_handlers, catalog_handlers, cliente_handlers, crud_handlers,
    pedido_handlers, usuario_handlers,
};
use crate::auth::middleware::require_auth;
use crate::store::Resource;
use crate::Config;
use axum::{http::HeaderValue, middleware::from_fn_with_state, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Tables served by a dedicated router instead of the generic one
const DEDICATED: [Resource; 4] = [
    Resource::Clientes,
    Resource::Usuarios,
    Resource::Pedidos,
    Resource::Caja,
];

/// Tables the API only reads; their rows are written by dedicated operations
const READ_ONLY: [Resource; 1] = [Resource::BasesDiarias];

/// `*` allows any origin; otherwise a comma-separated list
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origin
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

/// Create the API router
pub fn create_router(state: AdminState, config: &Config) -> Router {
    // ========================================================================
    // Protected: everything under /api except /api/auth
    // ========================================================================
    let mut api = Router::new()
        .merge(cliente_handlers::routes())
        .merge(usuario_handlers::routes())
        .merge(pedido_handlers::routes())
        .merge(caja_handlers::routes())
        .merge(catalog_handlers::routes());
    for resource in Resource::ALL {
        if READ_ONLY.contains(&resource) {
            api = api.merge(crud_handlers::read_only_routes(resource));
        } else if !DEDICATED.contains(&resource) {
            api = api.merge(crud_handlers::resource_routes(resource));
        }
    }
    let api = api.route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(auth_handlers::routes())
        .merge(api)
        .fallback(crud_handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(cors_layer(&config.cors_origin))
        .with_state(state)
}
