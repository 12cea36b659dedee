//! Relational storage: table registry, record store trait and its backends

pub mod resource;
pub mod sql;
pub mod traits;

pub use resource::Resource;
pub use sql::SqlStore;
pub use traits::{validate_column, Record, RecordKey, RecordStore, StoreError};

#[cfg(test)]
pub(crate) mod mock;
