//! In-memory mock implementation of RecordStore for testing.
//!
//! Rows live in `tokio::sync::RwLock<HashMap<..>>` collections. Primary keys
//! are assigned like SQLite's AUTOINCREMENT and the unique columns declared
//! on [`Resource`] are enforced under the same write lock as the insert.

use super::resource::Resource;
use super::traits::{validate_column, without_primary_key, Record, RecordKey, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, Record>,
    last_id: i64,
}

/// In-memory mock implementation of RecordStore for testing.
#[derive(Default)]
pub struct MockStore {
    tables: RwLock<HashMap<Resource, Table>>,
}

/// Compare JSON values the way SQLite compares a bound parameter with a
/// numeric column: numbers and numeric strings meet on their numeric value.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    fn as_number(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Rows are keyed by integer; a text key can never match one
fn row_id(key: &RecordKey) -> Option<i64> {
    match key {
        RecordKey::Int(id) => Some(*id),
        RecordKey::Text(_) => None,
    }
}

fn check_unique(
    resource: Resource,
    table: &Table,
    candidate: &Record,
    skip_id: Option<i64>,
) -> Result<(), StoreError> {
    for column in resource.unique_columns() {
        let Some(value) = candidate.get(*column) else {
            continue;
        };
        let clash = table
            .rows
            .iter()
            .filter(|(id, _)| Some(**id) != skip_id)
            .any(|(_, row)| row.get(*column).is_some_and(|v| loosely_equal(v, value)));
        if clash {
            return Err(StoreError::UniqueViolation {
                table: resource.table(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored for a resource
    pub async fn count(&self, resource: Resource) -> usize {
        self.tables
            .read()
            .await
            .get(&resource)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MockStore {
    async fn list(&self, resource: Resource) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&resource)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(
        &self,
        resource: Resource,
        key: &RecordKey,
    ) -> Result<Option<Record>, StoreError> {
        let Some(id) = row_id(key) else {
            return Ok(None);
        };
        let tables = self.tables.read().await;
        Ok(tables.get(&resource).and_then(|t| t.rows.get(&id).cloned()))
    }

    async fn find_by(
        &self,
        resource: Resource,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        validate_column(column)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&resource)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|row| row.get(column).is_some_and(|v| loosely_equal(v, value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, resource: Resource, record: &Record) -> Result<Record, StoreError> {
        for column in record.keys() {
            validate_column(column)?;
        }

        let mut tables = self.tables.write().await;
        let table = tables.entry(resource).or_default();

        let explicit_id = record
            .get(resource.primary_key())
            .and_then(|v| v.as_i64());
        if let Some(id) = explicit_id {
            if table.rows.contains_key(&id) {
                return Err(StoreError::UniqueViolation {
                    table: resource.table(),
                    column: resource.primary_key().to_string(),
                });
            }
        }
        check_unique(resource, table, record, None)?;

        let id = explicit_id.unwrap_or(table.last_id + 1);
        table.last_id = table.last_id.max(id);

        let mut row = record.clone();
        row.insert(resource.primary_key().to_string(), Value::from(id));
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        resource: Resource,
        key: &RecordKey,
        changes: &Record,
    ) -> Result<Option<Record>, StoreError> {
        let changes = without_primary_key(resource, changes);
        for column in changes.keys() {
            validate_column(column)?;
        }
        let Some(id) = row_id(key) else {
            return Ok(None);
        };

        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&resource) else {
            return Ok(None);
        };
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        check_unique(resource, table, &changes, Some(id))?;

        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        for (column, value) in changes {
            row.insert(column, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, resource: Resource, key: &RecordKey) -> Result<bool, StoreError> {
        let Some(id) = row_id(key) else {
            return Ok(false);
        };
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&resource)
            .is_some_and(|t| t.rows.remove(&id).is_some()))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_ids_are_sequential_and_not_reused() {
        let store = MockStore::new();
        let a = store
            .insert(Resource::Prendas, &record(json!({"nombre": "Jean"})))
            .await
            .unwrap();
        let b = store
            .insert(Resource::Prendas, &record(json!({"nombre": "Camisa"})))
            .await
            .unwrap();
        assert_eq!(a["id_prenda"], 1);
        assert_eq!(b["id_prenda"], 2);

        store
            .delete(Resource::Prendas, &RecordKey::Int(2))
            .await
            .unwrap();
        let c = store
            .insert(Resource::Prendas, &record(json!({"nombre": "Falda"})))
            .await
            .unwrap();
        assert_eq!(c["id_prenda"], 3);
    }

    #[tokio::test]
    async fn test_unique_columns_enforced() {
        let store = MockStore::new();
        store
            .insert(Resource::BasesDiarias, &record(json!({"fecha": "2026-10-16"})))
            .await
            .unwrap();
        let err = store
            .insert(Resource::BasesDiarias, &record(json!({"fecha": "2026-10-16"})))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.count(Resource::BasesDiarias).await, 1);
    }

    #[tokio::test]
    async fn test_find_by_matches_numbers_loosely() {
        let store = MockStore::new();
        store
            .insert(Resource::Caja, &record(json!({"id_pedido": 5, "monto": 1.0})))
            .await
            .unwrap();
        let found = store
            .find_by(Resource::Caja, "id_pedido", &json!("5"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_loosely_equal() {
        assert!(loosely_equal(&json!(5), &json!(5.0)));
        assert!(loosely_equal(&json!("5"), &json!(5)));
        assert!(!loosely_equal(&json!("05"), &json!("5")));
        assert!(!loosely_equal(&Value::Null, &Value::Null));
    }
}
