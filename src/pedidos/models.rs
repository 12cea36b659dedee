//! Order models: lifecycle states and invoice data

use crate::store::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoPedido {
    Pendiente,
    EnProceso,
    Terminado,
    Entregado,
    Devuelto,
}

impl EstadoPedido {
    pub const ALL: [EstadoPedido; 5] = [
        EstadoPedido::Pendiente,
        EstadoPedido::EnProceso,
        EstadoPedido::Terminado,
        EstadoPedido::Entregado,
        EstadoPedido::Devuelto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EstadoPedido::Pendiente => "pendiente",
            EstadoPedido::EnProceso => "en_proceso",
            EstadoPedido::Terminado => "terminado",
            EstadoPedido::Entregado => "entregado",
            EstadoPedido::Devuelto => "devuelto",
        }
    }
}

impl fmt::Display for EstadoPedido {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstadoPedido {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

/// Numeric column as f64; numbers stored as text are accepted
pub fn amount(record: &Record, column: &str) -> f64 {
    match record.get(column) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// One invoice line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineaFactura {
    pub id_detalle: Option<i64>,
    pub descripcion: String,
    pub cantidad: f64,
    pub precio_unitario: f64,
    pub subtotal: f64,
}

/// Everything needed to render an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factura {
    pub pedido: Record,
    pub cliente: Option<Record>,
    pub detalles: Vec<LineaFactura>,
    pub total: f64,
    pub abono: f64,
    pub saldo: f64,
}

/// Combination price and label, resolved from the catalog
#[derive(Debug, Clone, Default)]
pub struct PrecioCombinacion {
    pub precio: f64,
    pub etiqueta: String,
}

impl Factura {
    /// Assemble the invoice. Line prices fall back to the combination price;
    /// the order's own `total` wins when it is set.
    pub fn build(
        pedido: Record,
        cliente: Option<Record>,
        detalles: &[Record],
        combinacion: impl Fn(&Record) -> Option<PrecioCombinacion>,
    ) -> Self {
        let detalles: Vec<LineaFactura> = detalles
            .iter()
            .map(|d| {
                let combo = combinacion(d);
                let cantidad = match amount(d, "cantidad") {
                    c if c > 0.0 => c,
                    _ => 1.0,
                };
                let precio_unitario = match amount(d, "precio") {
                    p if p > 0.0 => p,
                    _ => combo.as_ref().map(|c| c.precio).unwrap_or(0.0),
                };
                let descripcion = d
                    .get("descripcion")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
                    .or_else(|| combo.map(|c| c.etiqueta))
                    .unwrap_or_default();

                LineaFactura {
                    id_detalle: d.get("id_detalle").and_then(Value::as_i64),
                    descripcion,
                    cantidad,
                    precio_unitario,
                    subtotal: cantidad * precio_unitario,
                }
            })
            .collect();

        let total = match amount(&pedido, "total") {
            t if t > 0.0 => t,
            _ => detalles.iter().map(|l| l.subtotal).sum(),
        };
        let abono = amount(&pedido, "abono");

        Self {
            pedido,
            cliente,
            detalles,
            total,
            abono,
            saldo: total - abono,
        }
    }
}
