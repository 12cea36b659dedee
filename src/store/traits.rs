//! RecordStore trait definition
//!
//! Schema-agnostic access to the registered tables. Rows travel as JSON
//! objects; the store never interprets columns beyond the primary key and
//! the unique constraints declared on [`Resource`].

use super::resource::Resource;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One table row, keyed by column name
pub type Record = serde_json::Map<String, Value>;

/// Primary-key value taken from a URL segment.
///
/// Ids are bound as integers when they parse as one, otherwise as text, and
/// are never validated beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => RecordKey::Int(id),
            Err(_) => RecordKey::Text(raw.to_string()),
        }
    }

    /// Read the primary key out of a record
    pub fn from_record(resource: Resource, record: &Record) -> Option<Self> {
        match record.get(resource.primary_key())? {
            Value::Number(n) => n.as_i64().map(RecordKey::Int),
            Value::String(s) => Some(RecordKey::parse(s)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(id) => Value::from(*id),
            RecordKey::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        RecordKey::Int(id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(id) => write!(f, "{}", id),
            RecordKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Columna no válida: {0}")]
    InvalidColumn(String),

    #[error("Valor duplicado en {table}.{column}")]
    UniqueViolation { table: &'static str, column: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Abstract interface over the relational tables.
///
/// Every operation is a single statement; nothing here spans a transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows of a table ordered by primary key
    async fn list(&self, resource: Resource) -> Result<Vec<Record>, StoreError>;

    /// One row by primary key
    async fn get(&self, resource: Resource, key: &RecordKey)
        -> Result<Option<Record>, StoreError>;

    /// Rows whose `column` equals `value`
    async fn find_by(
        &self,
        resource: Resource,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    /// Insert a row and return it as stored, generated key included
    async fn insert(&self, resource: Resource, record: &Record) -> Result<Record, StoreError>;

    /// Write the given columns of an existing row (merge semantics).
    ///
    /// Returns `None` when no row has that key.
    async fn update(
        &self,
        resource: Resource,
        key: &RecordKey,
        changes: &Record,
    ) -> Result<Option<Record>, StoreError>;

    /// Remove a row; `false` when no row had that key
    async fn delete(&self, resource: Resource, key: &RecordKey) -> Result<bool, StoreError>;

    /// Check connectivity
    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Reject anything that is not a plain SQL identifier.
///
/// Column names come straight from request bodies and end up quoted inside
/// SQL text, so this is the only thing standing between a body key and the
/// statement.
pub fn validate_column(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidColumn(name.to_string()))
    }
}

/// Copy of `changes` without the primary-key column
pub(crate) fn without_primary_key(resource: Resource, changes: &Record) -> Record {
    changes
        .iter()
        .filter(|(column, _)| column.as_str() != resource.primary_key())
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}
