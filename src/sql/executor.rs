//! Statement execution against PostgreSQL. Rows come back as JSON objects keyed by column.

use crate::error::AppError;
use crate::sql::{PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

/// The relational backend's connection seam.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError>;

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError>;

    /// First column of the first row as an integer (COUNT queries).
    async fn fetch_count(&self, q: &QueryBuf) -> Result<u64, AppError>;

    /// Run statements in one transaction; returns the RETURNING row of each, if any.
    async fn execute_batch(&self, batch: &[QueryBuf]) -> Result<Vec<Option<Value>>, AppError>;
}

fn bind_all<'q>(
    sql: &'q str,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

#[async_trait]
impl SqlExecutor for PgPool {
    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(self).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_optional(self).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn fetch_count(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "count");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let n = query.fetch_one(self).await?;
        Ok(n.max(0) as u64)
    }

    async fn execute_batch(&self, batch: &[QueryBuf]) -> Result<Vec<Option<Value>>, AppError> {
        let mut out = Vec::with_capacity(batch.len());
        let mut tx = self.begin().await?;
        for q in batch {
            tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
            let row = bind_all(&q.sql, &q.params).fetch_optional(&mut *tx).await?;
            out.push(row.map(|r| row_to_json(&r)));
        }
        tx.commit().await?;
        Ok(out)
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
