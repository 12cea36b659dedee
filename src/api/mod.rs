//! HTTP API for the shop back office

pub mod auth_handlers;
pub mod caja_handlers;
pub mod catalog_handlers;
pub mod cliente_handlers;
pub mod crud_handlers;
pub mod handlers;
pub mod pedido_handlers;
pub mod routes;
pub mod usuario_handlers;

pub use routes::create_router;
