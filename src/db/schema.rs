//! Schema introspection and the per-agent schema cache.
//!
//! The schema is fetched once per agent from `information_schema.columns` and
//! reused for every question in the session. A failed fetch degrades to an
//! empty schema (logged, not raised) and is retried on the next question.

use crate::db::executor::SqlExecutor;
use crate::types::AppResult;
use sqlx::postgres::PgPool;
use sqlx::Row as SqlxRow;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Table name -> columns in ordinal position order.
pub type SchemaInfo = BTreeMap<String, Vec<ColumnInfo>>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

const SCHEMA_QUERY: &str = "\
    SELECT table_name, column_name, data_type \
    FROM information_schema.columns \
    WHERE table_schema = 'public' \
    ORDER BY table_name, ordinal_position";

/// Run the fixed introspection query and group columns by table.
pub async fn fetch_schema(pool: &PgPool) -> AppResult<SchemaInfo> {
    let rows = sqlx::query(SCHEMA_QUERY).fetch_all(pool).await?;

    let mut schema = SchemaInfo::new();
    for row in rows {
        let table: String = row.try_get("table_name")?;
        let column: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;
        schema.entry(table).or_default().push(ColumnInfo {
            name: column,
            data_type,
        });
    }

    debug!(tables = schema.len(), "Schema introspection complete");
    Ok(schema)
}

/// Render a schema as prompt context, one table per block.
pub fn render_schema(schema: &SchemaInfo) -> String {
    if schema.is_empty() {
        return "(no schema information available)".to_string();
    }

    let mut out = String::new();
    for (table, columns) in schema {
        out.push_str(table);
        out.push('\n');
        for column in columns {
            out.push_str(&format!("  - {} ({})\n", column.name, column.data_type));
        }
    }
    out
}

/// Once-populated schema cache, scoped to one agent instance.
pub struct SchemaCache {
    inner: RwLock<Option<SchemaInfo>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Return the cached schema, fetching it on first use. Introspection
    /// failures are logged and degrade to an empty schema without populating
    /// the cache, so the next call retries.
    pub async fn get_or_fetch(&self, executor: &dyn SqlExecutor) -> SchemaInfo {
        if let Some(schema) = self.inner.read().await.as_ref() {
            return schema.clone();
        }

        match executor.introspect_schema().await {
            Ok(schema) => {
                *self.inner.write().await = Some(schema.clone());
                schema
            }
            Err(e) => {
                warn!(error = %e, "Schema introspection failed, proceeding with empty schema");
                SchemaInfo::new()
            }
        }
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
