//! Static table registry
//!
//! Every table reachable through the generic CRUD surface is a variant of
//! [`Resource`]. Adding a table means adding a variant here and a matching
//! `CREATE TABLE` in `schema.sql`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Clientes,
    Pedidos,
    DetallePedido,
    Caja,
    Usuarios,
    Roles,
    Permisos,
    RolPermisos,
    Prendas,
    Ajustes,
    Acciones,
    Combinaciones,
    Cajones,
    Codigos,
    BasesDiarias,
}

impl Resource {
    /// All registered resources, in schema order
    pub const ALL: [Resource; 15] = [
        Resource::Clientes,
        Resource::Pedidos,
        Resource::DetallePedido,
        Resource::Caja,
        Resource::Usuarios,
        Resource::Roles,
        Resource::Permisos,
        Resource::RolPermisos,
        Resource::Prendas,
        Resource::Ajustes,
        Resource::Acciones,
        Resource::Combinaciones,
        Resource::Cajones,
        Resource::Codigos,
        Resource::BasesDiarias,
    ];

    /// SQL table name
    pub fn table(self) -> &'static str {
        match self {
            Resource::Clientes => "clientes",
            Resource::Pedidos => "pedidos",
            Resource::DetallePedido => "detalle_pedido",
            Resource::Caja => "caja",
            Resource::Usuarios => "usuarios",
            Resource::Roles => "roles",
            Resource::Permisos => "permisos",
            Resource::RolPermisos => "rol_permisos",
            Resource::Prendas => "prendas",
            Resource::Ajustes => "ajustes",
            Resource::Acciones => "acciones",
            Resource::Combinaciones => "combinaciones",
            Resource::Cajones => "cajones",
            Resource::Codigos => "codigos",
            Resource::BasesDiarias => "bases_diarias",
        }
    }

    /// Primary-key column
    pub fn primary_key(self) -> &'static str {
        match self {
            Resource::Clientes => "id_cliente",
            Resource::Pedidos => "id_pedido",
            Resource::DetallePedido => "id_detalle",
            Resource::Caja => "id_movimiento",
            Resource::Usuarios => "id_usuario",
            Resource::Roles => "id_rol",
            Resource::Permisos => "id_permiso",
            Resource::RolPermisos => "id_rol_permiso",
            Resource::Prendas => "id_prenda",
            Resource::Ajustes => "id_ajuste",
            Resource::Acciones => "id_accion",
            Resource::Combinaciones => "id_combinacion",
            Resource::Cajones => "id_cajon",
            Resource::Codigos => "id_codigo",
            Resource::BasesDiarias => "id_base",
        }
    }

    /// Columns carrying a UNIQUE constraint in the schema.
    ///
    /// The in-memory store enforces the same constraints so tests observe
    /// the same conflicts as SQLite.
    pub fn unique_columns(self) -> &'static [&'static str] {
        match self {
            Resource::Usuarios => &["usuario", "email"],
            Resource::Roles => &["nombre"],
            Resource::Permisos => &["nombre"],
            Resource::BasesDiarias => &["fecha"],
            _ => &[],
        }
    }

    /// Resolve a table name coming from a URL segment
    pub fn from_table(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.table() == name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
