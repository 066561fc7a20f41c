//! Arbitrary SQL execution against Postgres.
//!
//! The SQL text handed to [`SqlExecutor::execute`] comes from a language
//! model, so it is untrusted input: the optional read-only guard rejects
//! anything that is not a plain read before it reaches the database.

use crate::db::schema::{fetch_schema, SchemaInfo};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};
use tracing::info;

/// One result row, column order preserved.
pub type Row = serde_json::Map<String, JsonValue>;

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute the SQL text verbatim and return all rows.
    async fn execute(&self, sql: &str) -> AppResult<Vec<Row>>;

    /// Run the fixed catalog introspection query.
    async fn introspect_schema(&self) -> AppResult<SchemaInfo>;
}

pub struct PgExecutor {
    pool: PgPool,
    read_only: bool,
}

impl PgExecutor {
    pub fn new(pool: PgPool, read_only: bool) -> Self {
        Self { pool, read_only }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> AppResult<Vec<Row>> {
        if self.read_only {
            ensure_read_only(sql)?;
        }

        info!(sql, "Executing SQL query");
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Query(e.to_string()))?;

        let decoded: Vec<Row> = rows.iter().map(decode_row).collect();
        info!(count = decoded.len(), "Query returned results");
        Ok(decoded)
    }

    async fn introspect_schema(&self) -> AppResult<SchemaInfo> {
        fetch_schema(&self.pool).await
    }
}

/// Statements whose first keyword is outside this list are rejected when the
/// read-only guard is enabled.
const READ_KEYWORDS: [&str; 6] = ["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES", "TABLE"];

fn ensure_read_only(sql: &str) -> AppResult<()> {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if READ_KEYWORDS.contains(&keyword.as_str()) {
        Ok(())
    } else {
        Err(AppError::Query(format!(
            "Statement rejected by read-only guard: starts with {:?}",
            keyword
        )))
    }
}

fn decode_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

/// Decode one cell by Postgres type name, falling back to a few generic
/// attempts for types we do not know about.
fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
    match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::from(i64::from(v)))
            .unwrap_or(JsonValue::Null),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::from(i64::from(v)))
            .unwrap_or(JsonValue::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| v as f64)
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(idx)
            .ok()
            .flatten()
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| JsonValue::String(format!("{}", dt.format("%Y-%m-%dT%H:%M:%S%.f"))))
            .unwrap_or(JsonValue::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| JsonValue::String(dt.to_rfc3339()))
            .unwrap_or(JsonValue::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null),
        _ => {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
                return JsonValue::String(s);
            }
            if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
                return JsonValue::from(v);
            }
            if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
                return serde_json::Number::from_f64(v)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null);
            }
            if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
                return JsonValue::Bool(v);
            }
            JsonValue::Null
        }
    }
}
