//! SQLite implementation of [`RecordStore`] on top of `sqlx`

use super::resource::Resource;
use super::traits::{validate_column, without_primary_key, Record, RecordKey, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Record store backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open (creating if needed) the database at `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!(url = %url, max_connections, "Connected to database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn bind_key<'q>(query: SqliteQuery<'q>, key: &RecordKey) -> SqliteQuery<'q> {
    match key {
        RecordKey::Int(id) => query.bind(*id),
        RecordKey::Text(s) => query.bind(s.clone()),
    }
}

/// Convert a row into JSON using each value's storage class
fn row_to_record(row: &SqliteRow) -> Result<Record, StoreError> {
    let mut record = Record::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" | "NUMERIC" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(idx)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };

        record.insert(column.name().to_string(), value);
    }

    Ok(record)
}

/// Turn driver errors into store errors, recognising UNIQUE failures
fn map_db_error(resource: Resource, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            // SQLite: "UNIQUE constraint failed: table.column"
            let column = db
                .message()
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            return StoreError::UniqueViolation {
                table: resource.table(),
                column,
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl RecordStore for SqlStore {
    async fn list(&self, resource: Resource) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            quote(resource.table()),
            quote(resource.primary_key())
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        rows.iter().map(row_to_record).collect()
    }

    async fn get(
        &self,
        resource: Resource,
        key: &RecordKey,
    ) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote(resource.table()),
            quote(resource.primary_key())
        );
        let row = bind_key(sqlx::query(&sql), key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by(
        &self,
        resource: Resource,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        validate_column(column)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}",
            quote(resource.table()),
            quote(column),
            quote(resource.primary_key())
        );
        let rows = bind_value(sqlx::query(&sql), value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        rows.iter().map(row_to_record).collect()
    }

    async fn insert(&self, resource: Resource, record: &Record) -> Result<Record, StoreError> {
        for column in record.keys() {
            validate_column(column)?;
        }

        let sql = if record.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING *",
                quote(resource.table())
            )
        } else {
            let columns: Vec<String> = record.keys().map(|c| quote(c)).collect();
            let placeholders = vec!["?"; record.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                quote(resource.table()),
                columns.join(", "),
                placeholders
            )
        };

        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = bind_value(query, value);
        }

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        debug!(table = %resource, "Row inserted");
        row_to_record(&row)
    }

    async fn update(
        &self,
        resource: Resource,
        key: &RecordKey,
        changes: &Record,
    ) -> Result<Option<Record>, StoreError> {
        let changes = without_primary_key(resource, changes);
        if changes.is_empty() {
            return self.get(resource, key).await;
        }
        for column in changes.keys() {
            validate_column(column)?;
        }

        let assignments: Vec<String> = changes
            .keys()
            .map(|c| format!("{} = ?", quote(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ? RETURNING *",
            quote(resource.table()),
            assignments.join(", "),
            quote(resource.primary_key())
        );

        let mut query = sqlx::query(&sql);
        for value in changes.values() {
            query = bind_value(query, value);
        }
        let row = bind_key(query, key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn delete(&self, resource: Resource, key: &RecordKey) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(resource.table()),
            quote(resource.primary_key())
        );
        let result = bind_key(sqlx::query(&sql), key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(resource, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
