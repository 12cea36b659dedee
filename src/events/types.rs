//! Data-change event types

use crate::store::{Record, Resource};
use serde::{Deserialize, Serialize};

/// The CRUD action performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudAction {
    Created,
    Updated,
    Deleted,
}

/// Payload-free discriminant of [`DataEvent`], used as subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ClienteCreado,
    ClienteActualizado,
    PedidoCreado,
    PedidoActualizado,
    MovimientoCreado,
    BaseDiariaCreada,
    UsuarioCambiado,
    RegistroCambiado,
    SesionIniciada,
    SesionCerrada,
}

/// A data change, emitted after the server confirmed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "evento", content = "datos", rename_all = "snake_case")]
pub enum DataEvent {
    ClienteCreado(Record),
    ClienteActualizado(Record),
    PedidoCreado(Record),
    PedidoActualizado(Record),
    MovimientoCreado(Record),
    BaseDiariaCreada(Record),
    UsuarioCambiado(Record),
    /// Any other table touched through the generic CRUD surface
    RegistroCambiado {
        resource: Resource,
        action: CrudAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<Record>,
    },
    SesionIniciada {
        usuario: String,
    },
    SesionCerrada,
}

impl DataEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DataEvent::ClienteCreado(_) => EventKind::ClienteCreado,
            DataEvent::ClienteActualizado(_) => EventKind::ClienteActualizado,
            DataEvent::PedidoCreado(_) => EventKind::PedidoCreado,
            DataEvent::PedidoActualizado(_) => EventKind::PedidoActualizado,
            DataEvent::MovimientoCreado(_) => EventKind::MovimientoCreado,
            DataEvent::BaseDiariaCreada(_) => EventKind::BaseDiariaCreada,
            DataEvent::UsuarioCambiado(_) => EventKind::UsuarioCambiado,
            DataEvent::RegistroCambiado { .. } => EventKind::RegistroCambiado,
            DataEvent::SesionIniciada { .. } => EventKind::SesionIniciada,
            DataEvent::SesionCerrada => EventKind::SesionCerrada,
        }
    }

    /// Generic change notification for a table without a dedicated event
    pub fn registro(resource: Resource, action: CrudAction, record: Option<Record>) -> Self {
        DataEvent::RegistroCambiado {
            resource,
            action,
            record,
        }
    }
}
