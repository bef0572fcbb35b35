#![allow(dead_code)]

use async_trait::async_trait;
use backoffice_sdk::config::MappingSet;
use backoffice_sdk::sql::QueryBuf;
use backoffice_sdk::{AppError, Backends, DataProxy, InMemoryDocumentStore, QueryHooks, SqlExecutor};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const CATEGORY: &str = "App\\Entity\\Category";
pub const PRODUCT: &str = "App\\Entity\\Product";
pub const ORDER_LINE: &str = "App\\Entity\\OrderLine";
pub const ARTICLE: &str = "App\\Document\\Article";

pub fn mappings_json() -> Value {
    json!({
        "entities": [
            {
                "class": CATEGORY,
                "fields": [
                    { "field_name": "id", "type": "integer", "id": true },
                    { "field_name": "name", "type": "string" }
                ],
                "associations": [
                    { "field_name": "parent", "target_entity": CATEGORY, "type": 2 },
                    { "field_name": "products", "target_entity": PRODUCT, "type": 4, "mapped_by": "category" }
                ]
            },
            {
                "class": PRODUCT,
                "fields": [
                    { "field_name": "id", "type": "integer", "id": true },
                    { "field_name": "name", "type": "string" },
                    { "field_name": "price", "type": "decimal" },
                    { "field_name": "releasedAt", "column_name": "released_at", "type": "datetime" }
                ],
                "associations": [
                    { "field_name": "category", "target_entity": CATEGORY, "type": 2, "inversed_by": "products" }
                ]
            },
            {
                "class": ORDER_LINE,
                "identifier": ["order", "line"],
                "fields": [
                    { "field_name": "order", "type": "integer", "id": true },
                    { "field_name": "line", "type": "integer", "id": true }
                ]
            }
        ],
        "documents": [
            {
                "class": ARTICLE,
                "collection": "articles",
                "fields": [
                    { "field_name": "id", "type": "string", "id": true },
                    { "field_name": "title", "type": "string" },
                    { "field_name": "views", "type": "integer" },
                    { "field_name": "published", "type": "boolean" }
                ]
            }
        ]
    })
}

/// Executor fake over an in-memory table of rows keyed by `id`. Records every statement.
/// SELECT and COUNT evaluate the WHERE clause (`=`, `ILIKE`, `IS NULL`, OR groups) against
/// the rows; SELECT honors an `"id" DESC` order and LIMIT/OFFSET.
#[derive(Default)]
pub struct RecordingExecutor {
    pub rows: Vec<Value>,
    pub statements: Mutex<Vec<QueryBuf>>,
    pub returning: Mutex<VecDeque<Option<Value>>>,
    /// Fail the next `execute_batch` as a rolled back transaction.
    pub fail_next_batch: Mutex<bool>,
}

impl RecordingExecutor {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        RecordingExecutor {
            rows,
            ..Default::default()
        }
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements.lock().unwrap().iter().map(|q| q.sql.clone()).collect()
    }

    fn record(&self, q: &QueryBuf) {
        self.statements.lock().unwrap().push(q.clone());
    }

    fn matching(&self, q: &QueryBuf) -> Vec<Value> {
        self.rows
            .iter()
            .filter(|row| row_matches(&q.sql, &q.params, row))
            .cloned()
            .collect()
    }
}

fn where_clause(sql: &str) -> Option<&str> {
    let rest = &sql[sql.find(" WHERE ")? + " WHERE ".len()..];
    let end = [" ORDER BY ", " LIMIT ", " OFFSET "]
        .iter()
        .filter_map(|k| rest.find(k))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn param(params: &[Value], placeholder: &str) -> Value {
    let n: usize = placeholder
        .trim_start_matches('$')
        .split("::")
        .next()
        .unwrap()
        .parse()
        .unwrap();
    params[n - 1].clone()
}

fn cell(row: &Value, quoted: &str) -> Value {
    row.get(quoted.trim_matches('"')).cloned().unwrap_or(Value::Null)
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str()?.parse().ok())
}

fn clause_matches(clause: &str, params: &[Value], row: &Value) -> bool {
    if clause == "1 = 0" {
        return false;
    }
    if let Some((lhs, rhs)) = clause.split_once("::text ILIKE ") {
        let text = match cell(row, lhs) {
            Value::Null => return false,
            Value::String(s) => s,
            other => other.to_string(),
        };
        let pattern = param(params, rhs);
        let needle = pattern
            .as_str()
            .unwrap()
            .trim_matches('%')
            .replace("\\%", "%")
            .replace("\\_", "_")
            .replace("\\\\", "\\");
        return text.to_lowercase().contains(&needle.to_lowercase());
    }
    if let Some(lhs) = clause.strip_suffix(" IS NULL") {
        return cell(row, lhs).is_null();
    }
    if let Some((lhs, rhs)) = clause.split_once(" = ") {
        let (actual, expected) = (cell(row, lhs), param(params, rhs));
        return match (as_f64(&actual), as_f64(&expected)) {
            (Some(a), Some(b)) => a == b,
            _ => actual == expected,
        };
    }
    panic!("recording executor cannot evaluate `{clause}`");
}

fn row_matches(sql: &str, params: &[Value], row: &Value) -> bool {
    let Some(clause) = where_clause(sql) else {
        return true;
    };
    clause.split(" AND ").all(|part| {
        let part = part
            .strip_prefix('(')
            .and_then(|p| p.strip_suffix(')'))
            .unwrap_or(part);
        part.split(" OR ").any(|c| clause_matches(c, params, row))
    })
}

fn clause(sql: &str, keyword: &str) -> Option<usize> {
    let rest = &sql[sql.find(keyword)? + keyword.len()..];
    rest.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        self.record(q);
        let mut rows = self.matching(q);
        if q.sql.contains(".\"id\" DESC") {
            rows.reverse();
        }
        let offset = clause(&q.sql, " OFFSET ").unwrap_or(0);
        let limit = clause(&q.sql, " LIMIT ").unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        self.record(q);
        let id = q.params.first().cloned().unwrap_or(Value::Null);
        Ok(self.rows.iter().find(|r| r.get("id") == Some(&id)).cloned())
    }

    async fn fetch_count(&self, q: &QueryBuf) -> Result<u64, AppError> {
        self.record(q);
        Ok(self.matching(q).len() as u64)
    }

    async fn execute_batch(&self, batch: &[QueryBuf]) -> Result<Vec<Option<Value>>, AppError> {
        if std::mem::take(&mut *self.fail_next_batch.lock().unwrap()) {
            return Err(AppError::Store("transaction rolled back".into()));
        }
        let mut returning = self.returning.lock().unwrap();
        Ok(batch
            .iter()
            .map(|q| {
                self.record(q);
                returning.pop_front().flatten()
            })
            .collect())
    }
}

pub const TITLES: [&str; 6] = ["Cat care", "Dogs", "Concatenation tips", "CATALOG 2024", "Birds", "The cathedral"];

pub fn category_rows(n: i64) -> Vec<Value> {
    (1..=n)
        .map(|id| json!({ "id": id, "name": format!("Category {}", id), "parent_id": null }))
        .collect()
}

pub fn doc(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

pub struct Fixture {
    pub proxy: DataProxy,
    pub executor: Arc<RecordingExecutor>,
    pub store: Arc<InMemoryDocumentStore>,
}

/// Log output for failing tests; `RUST_LOG=backoffice_sdk=debug` shows every statement.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture_with(executor: RecordingExecutor, hooks: QueryHooks) -> Fixture {
    init_tracing();
    let (relational, document) = serde_json::from_value::<MappingSet>(mappings_json())
        .unwrap()
        .into_providers("public")
        .unwrap();
    let executor = Arc::new(executor);
    let store = Arc::new(InMemoryDocumentStore::new());
    let proxy = DataProxy::new(Backends {
        relational: Arc::new(relational),
        document: Arc::new(document),
        executor: executor.clone(),
        store: store.clone(),
        hooks,
    });
    Fixture { proxy, executor, store }
}

pub fn fixture() -> Fixture {
    fixture_with(RecordingExecutor::with_rows(category_rows(200)), QueryHooks::default())
}

pub fn seed_articles(store: &InMemoryDocumentStore) {
    store
        .seed(
            "articles",
            TITLES.iter().enumerate().map(|(i, title)| {
                doc(json!({ "id": format!("a{}", i + 1), "title": title, "views": (i as i64 + 1) * 10 }))
            }),
        )
        .unwrap();
}
