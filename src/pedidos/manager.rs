//! Order operations: intake with down payment, state changes, returns and
//! invoice assembly

use super::models::*;
use crate::caja::{CajaError, CajaManager, Movimiento, TipoMovimiento};
use crate::store::{Record, RecordKey, RecordStore, Resource, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PedidoError {
    #[error("Pedido no encontrado: {0}")]
    NotFound(String),

    #[error("El pedido {0} ya fue devuelto")]
    YaDevuelto(String),

    #[error("Monto de devolución no válido: {0}")]
    MontoInvalido(f64),

    #[error("Detalle de pedido mal formado")]
    DetalleInvalido,

    #[error(transparent)]
    Caja(#[from] CajaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedidoCreado {
    pub pedido: Record,
    pub detalles: Vec<Record>,
    /// Cash entry for the down payment, when there was one
    pub abono: Option<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Devolucion {
    pub pedido: Record,
    pub movimiento: Option<Record>,
}

/// Manager for orders
pub struct PedidoManager {
    store: Arc<dyn RecordStore>,
    caja: CajaManager,
}

impl PedidoManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            caja: CajaManager::new(store.clone()),
            store,
        }
    }

    async fn require(&self, id: &str) -> Result<(RecordKey, Record), PedidoError> {
        let key = RecordKey::parse(id);
        match self.store.get(Resource::Pedidos, &key).await? {
            Some(row) => Ok((key, row)),
            None => Err(PedidoError::NotFound(id.to_string())),
        }
    }

    /// Insert a validated order as `pendiente`, its detail lines, and the
    /// down payment as a cash entry. A failed line or payment removes the
    /// rows already written.
    pub async fn crear(
        &self,
        mut body: Record,
        id_usuario: Option<i64>,
    ) -> Result<PedidoCreado, PedidoError> {
        let lineas = match body.remove("detalles") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    _ => Err(PedidoError::DetalleInvalido),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(PedidoError::DetalleInvalido),
        };

        body.insert(
            "estado".into(),
            Value::from(EstadoPedido::Pendiente.as_str()),
        );
        if let Some(id_usuario) = id_usuario {
            body.entry("id_usuario").or_insert(Value::from(id_usuario));
        }

        let pedido = self.store.insert(Resource::Pedidos, &body).await?;
        let id_pedido = pedido.get("id_pedido").and_then(Value::as_i64);

        let mut detalles = Vec::with_capacity(lineas.len());
        let monto_abono = amount(&pedido, "abono");
        let abono = match self
            .completar(id_pedido, lineas, monto_abono, id_usuario, &mut detalles)
            .await
        {
            Ok(abono) => abono,
            Err(e) => {
                warn!(id_pedido = ?id_pedido, "Order intake failed, removing partial rows: {}", e);
                self.deshacer_pedido(&pedido, &detalles).await;
                return Err(e);
            }
        };

        info!(
            id_pedido = ?id_pedido,
            detalles = detalles.len(),
            abono = monto_abono,
            "Order created"
        );
        Ok(PedidoCreado {
            pedido,
            detalles,
            abono,
        })
    }

    /// Detail lines and down payment of a freshly inserted order. Lines
    /// written so far are pushed onto `detalles` even when a later one fails.
    async fn completar(
        &self,
        id_pedido: Option<i64>,
        lineas: Vec<Record>,
        monto_abono: f64,
        id_usuario: Option<i64>,
        detalles: &mut Vec<Record>,
    ) -> Result<Option<Record>, PedidoError> {
        for mut linea in lineas {
            linea.remove("id_detalle");
            linea.insert(
                "id_pedido".into(),
                id_pedido.map(Value::from).unwrap_or(Value::Null),
            );
            detalles.push(self.store.insert(Resource::DetallePedido, &linea).await?);
        }

        Ok(match id_pedido {
            Some(id) if monto_abono > 0.0 => {
                let movimiento = Movimiento::new(
                    TipoMovimiento::Entrada,
                    format!("Abono pedido #{}", id),
                    monto_abono,
                )
                .with_pedido(id)
                .with_usuario(id_usuario);
                Some(self.caja.registrar(&movimiento).await?)
            }
            _ => None,
        })
    }

    /// Delete the lines, then the order, of an intake that did not finish
    async fn deshacer_pedido(&self, pedido: &Record, detalles: &[Record]) {
        for linea in detalles.iter().rev() {
            if let Some(key) = RecordKey::from_record(Resource::DetallePedido, linea) {
                if let Err(e) = self.store.delete(Resource::DetallePedido, &key).await {
                    warn!(id_detalle = %key, "Failed to remove order line: {}", e);
                }
            }
        }
        if let Some(key) = RecordKey::from_record(Resource::Pedidos, pedido) {
            if let Err(e) = self.store.delete(Resource::Pedidos, &key).await {
                warn!(id_pedido = %key, "Failed to remove unfinished order: {}", e);
            }
        }
    }

    pub async fn cambiar_estado(
        &self,
        id: &str,
        estado: EstadoPedido,
    ) -> Result<Record, PedidoError> {
        let key = RecordKey::parse(id);
        let mut changes = Record::new();
        changes.insert("estado".into(), Value::from(estado.as_str()));

        let row = self
            .store
            .update(Resource::Pedidos, &key, &changes)
            .await?
            .ok_or_else(|| PedidoError::NotFound(id.to_string()))?;
        info!(id_pedido = %key, estado = %estado, "Order state changed");
        Ok(row)
    }

    /// Mark an order returned and pay back `monto` (default: its down payment).
    /// If the refund cannot be recorded the previous state is put back.
    pub async fn devolver(
        &self,
        id: &str,
        monto: Option<f64>,
        motivo: Option<&str>,
        id_usuario: Option<i64>,
    ) -> Result<Devolucion, PedidoError> {
        let (key, pedido) = self.require(id).await?;

        let estado = pedido
            .get("estado")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<EstadoPedido>().ok());
        if estado == Some(EstadoPedido::Devuelto) {
            return Err(PedidoError::YaDevuelto(id.to_string()));
        }

        let monto = monto.unwrap_or_else(|| amount(&pedido, "abono"));
        if !monto.is_finite() || monto < 0.0 {
            return Err(PedidoError::MontoInvalido(monto));
        }

        let devuelto = self
            .cambiar_estado(&key.to_string(), EstadoPedido::Devuelto)
            .await?;

        let movimiento = if monto > 0.0 {
            let mut descripcion = format!("Devolución pedido #{}", key);
            if let Some(motivo) = motivo.filter(|m| !m.trim().is_empty()) {
                descripcion.push_str(": ");
                descripcion.push_str(motivo.trim());
            }
            let mut movimiento = Movimiento::new(TipoMovimiento::Salida, descripcion, monto)
                .with_usuario(id_usuario);
            if let RecordKey::Int(id_pedido) = &key {
                movimiento = movimiento.with_pedido(*id_pedido);
            }
            match self.caja.registrar(&movimiento).await {
                Ok(row) => Some(row),
                Err(e) => {
                    self.restaurar_estado(&key, &pedido).await;
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        info!(id_pedido = %key, monto, "Order returned");
        Ok(Devolucion {
            pedido: devuelto,
            movimiento,
        })
    }

    /// Put back the `estado` a return had overwritten
    async fn restaurar_estado(&self, key: &RecordKey, previo: &Record) {
        let mut changes = Record::new();
        changes.insert(
            "estado".into(),
            previo
                .get("estado")
                .cloned()
                .unwrap_or_else(|| Value::from(EstadoPedido::Pendiente.as_str())),
        );
        if let Err(e) = self.store.update(Resource::Pedidos, key, &changes).await {
            warn!(id_pedido = %key, "Failed to restore order state: {}", e);
        }
    }

    /// Invoice data: order, client, lines priced from the catalog
    pub async fn factura(&self, id: &str) -> Result<Factura, PedidoError> {
        let (key, pedido) = self.require(id).await?;

        let cliente = match pedido.get("id_cliente").and_then(Value::as_i64) {
            Some(id_cliente) => {
                let cliente = self
                    .store
                    .get(Resource::Clientes, &RecordKey::Int(id_cliente))
                    .await?;
                if cliente.is_none() {
                    warn!(id_pedido = %key, id_cliente, "Order references a missing client");
                }
                cliente
            }
            None => None,
        };

        let detalles = self
            .store
            .find_by(Resource::DetallePedido, "id_pedido", &key.to_value())
            .await?;

        let precios = self.precios_combinaciones().await?;
        Ok(Factura::build(pedido, cliente, &detalles, |d| {
            d.get("id_combinacion")
                .and_then(Value::as_i64)
                .and_then(|id| precios.get(&id).cloned())
        }))
    }

    /// `id_combinacion` → price and "prenda - ajuste - acción" label
    async fn precios_combinaciones(&self) -> Result<HashMap<i64, PrecioCombinacion>, PedidoError> {
        let nombres = |rows: Vec<Record>, pk: &str| -> HashMap<i64, String> {
            rows.into_iter()
                .filter_map(|r| {
                    let id = r.get(pk).and_then(Value::as_i64)?;
                    let nombre = r.get("nombre").and_then(Value::as_str)?.to_string();
                    Some((id, nombre))
                })
                .collect()
        };
        let prendas = nombres(self.store.list(Resource::Prendas).await?, "id_prenda");
        let ajustes = nombres(self.store.list(Resource::Ajustes).await?, "id_ajuste");
        let acciones = nombres(self.store.list(Resource::Acciones).await?, "id_accion");

        let label = |names: &HashMap<i64, String>, row: &Record, fk: &str| {
            row.get(fk)
                .and_then(Value::as_i64)
                .and_then(|id| names.get(&id).cloned())
        };

        Ok(self
            .store
            .list(Resource::Combinaciones)
            .await?
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id_combinacion").and_then(Value::as_i64)?;
                let etiqueta = [
                    label(&prendas, &row, "id_prenda"),
                    label(&ajustes, &row, "id_ajuste"),
                    label(&acciones, &row, "id_accion"),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" - ");
                Some((
                    id,
                    PrecioCombinacion {
                        precio: amount(&row, "precio"),
                        etiqueta,
                    },
                ))
            })
            .collect())
    }
}
