//! Cash register (caja): movements, daily opening base, day summaries

pub mod manager;
pub mod models;

pub use manager::{BaseDiariaCreada, CajaError, CajaManager};
pub use models::{
    find_daily_base, local_date, BaseDiariaEstado, Movimiento, ResumenCaja, TipoMovimiento,
    BASE_MARKER,
};
