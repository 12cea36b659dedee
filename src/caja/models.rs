//! Cash-register movement and daily-base models

use crate::store::Record;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved description marker of an opening-cash movement
pub const BASE_MARKER: &str = "[BASE_DIARIA]";

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoMovimiento {
    Entrada,
    Salida,
}

impl TipoMovimiento {
    pub fn as_str(self) -> &'static str {
        match self {
            TipoMovimiento::Entrada => "entrada",
            TipoMovimiento::Salida => "salida",
        }
    }
}

impl fmt::Display for TipoMovimiento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TipoMovimiento {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entrada" => Ok(TipoMovimiento::Entrada),
            "salida" => Ok(TipoMovimiento::Salida),
            other => Err(other.to_string()),
        }
    }
}

/// A cash-register ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movimiento {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_movimiento: Option<i64>,
    /// RFC 3339 timestamp
    pub fecha: String,
    pub tipo: TipoMovimiento,
    #[serde(default)]
    pub descripcion: String,
    pub monto: f64,
    #[serde(default)]
    pub id_pedido: Option<i64>,
    #[serde(default)]
    pub id_usuario: Option<i64>,
}

impl Movimiento {
    /// New movement stamped with the current time
    pub fn new(tipo: TipoMovimiento, descripcion: impl Into<String>, monto: f64) -> Self {
        Self {
            id_movimiento: None,
            fecha: chrono::Utc::now().to_rfc3339(),
            tipo,
            descripcion: descripcion.into(),
            monto,
            id_pedido: None,
            id_usuario: None,
        }
    }

    pub fn with_pedido(mut self, id_pedido: i64) -> Self {
        self.id_pedido = Some(id_pedido);
        self
    }

    pub fn with_usuario(mut self, id_usuario: Option<i64>) -> Self {
        self.id_usuario = id_usuario;
        self
    }

    pub fn with_fecha(mut self, fecha: impl Into<String>) -> Self {
        self.fecha = fecha.into();
        self
    }

    pub fn is_base_marker(&self) -> bool {
        self.tipo == TipoMovimiento::Entrada && self.descripcion.contains(BASE_MARKER)
    }

    /// Calendar date of the timestamp as seen from `tz`
    pub fn local_date<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        local_date(&self.fecha, tz)
    }

    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(record.clone()))
    }

    pub fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

/// Calendar date of a stored timestamp in `tz`.
///
/// Offset-carrying timestamps are converted; naive ones
/// (`YYYY-MM-DD HH:MM:SS`, or a bare date) are taken as already local.
pub fn local_date<Tz: TimeZone>(fecha: &str, tz: &Tz) -> Option<NaiveDate> {
    let fecha = fecha.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(fecha) {
        return Some(dt.with_timezone(tz).date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(fecha, format) {
            return Some(naive.date());
        }
    }
    NaiveDate::parse_from_str(fecha, "%Y-%m-%d").ok()
}

/// Answer to "has today's opening cash been recorded?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseDiariaEstado {
    pub existe: bool,
    pub monto: f64,
    /// YYYY-MM-DD
    pub fecha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_movimiento: Option<i64>,
}

impl BaseDiariaEstado {
    pub fn ausente(fecha: NaiveDate) -> Self {
        Self {
            existe: false,
            monto: 0.0,
            fecha: fecha.to_string(),
            id_movimiento: None,
        }
    }
}

/// Totals of one day's movements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumenCaja {
    pub fecha: String,
    pub entradas: f64,
    pub salidas: f64,
    pub saldo: f64,
    pub movimientos: usize,
}

/// First opening-cash movement recorded on `today` as seen from `tz`
pub fn find_daily_base<'a, Tz: TimeZone>(
    movimientos: &'a [Movimiento],
    today: NaiveDate,
    tz: &Tz,
) -> Option<&'a Movimiento> {
    movimientos
        .iter()
        .find(|m| m.is_base_marker() && m.local_date(tz) == Some(today))
}
