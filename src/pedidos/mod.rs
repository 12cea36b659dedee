//! Orders (pedidos): intake, lifecycle, returns and invoice data

pub mod manager;
pub mod models;

pub use manager::{Devolucion, PedidoCreado, PedidoError, PedidoManager};
pub use models::{amount, EstadoPedido, Factura, LineaFactura, PrecioCombinacion};
