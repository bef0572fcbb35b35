//! Document persistence seam and an in-memory implementation.

use crate::error::AppError;
use crate::query::DocumentQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

pub type Document = Map<String, Value>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Matching documents in query order, skipping `skip`, at most `limit`.
    async fn find(&self, query: &DocumentQuery, skip: u64, limit: Option<u64>) -> Result<Vec<Document>, AppError>;

    async fn count(&self, query: &DocumentQuery) -> Result<u64, AppError>;

    async fn find_by_id(&self, collection: &str, id_field: &str, id: &Value) -> Result<Option<Document>, AppError>;

    /// Insert or replace by identifier. A document without one gets a generated id.
    async fn save(&self, collection: &str, id_field: &str, doc: Document) -> Result<Document, AppError>;

    /// Whether a document was deleted.
    async fn delete(&self, collection: &str, id_field: &str, id: &Value) -> Result<bool, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Store("document store lock poisoned".into())
}

fn has_id(doc: &Document, id_field: &str, id: &Value) -> bool {
    doc.get(id_field) == Some(id)
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents as-is.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) -> Result<(), AppError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.entry(collection.to_string()).or_default().extend(docs);
        Ok(())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, query: &DocumentQuery, skip: u64, limit: Option<u64>) -> Result<Vec<Document>, AppError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<&Document> = docs.iter().filter(|d| query.matches(d)).collect();
        matched.sort_by(|a, b| query.compare(a, b));
        let limit = limit.map_or(usize::MAX, |n| n as usize);
        Ok(matched
            .into_iter()
            .skip(skip as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, query: &DocumentQuery) -> Result<u64, AppError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(&query.collection)
            .map_or(0, |docs| docs.iter().filter(|d| query.matches(d)).count() as u64))
    }

    async fn find_by_id(&self, collection: &str, id_field: &str, id: &Value) -> Result<Option<Document>, AppError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| has_id(d, id_field, id)))
            .cloned())
    }

    async fn save(&self, collection: &str, id_field: &str, mut doc: Document) -> Result<Document, AppError> {
        let id = match doc.get(id_field) {
            Some(v) if !v.is_null() => v.clone(),
            _ => {
                let generated = Value::String(uuid::Uuid::new_v4().to_string());
                doc.insert(id_field.to_string(), generated.clone());
                generated
            }
        };
        let mut collections = self.collections.write().map_err(poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| has_id(d, id_field, &id)) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id_field: &str, id: &Value) -> Result<bool, AppError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| !has_id(d, id_field, id));
        Ok(docs.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, SortDirection};
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn query() -> DocumentQuery {
        DocumentQuery {
            class: "App\\Document\\Tag".into(),
            collection: "tag".into(),
            filters: Vec::new(),
            search: None,
            sort: None,
        }
    }

    #[tokio::test]
    async fn save_assigns_id_and_replaces_existing() {
        let store = InMemoryDocumentStore::new();
        let saved = store.save("tag", "id", doc(json!({ "name": "a" }))).await.unwrap();
        let id = saved.get("id").cloned().unwrap();
        assert!(id.is_string());
        let mut changed = saved.clone();
        changed.insert("name".into(), json!("b"));
        store.save("tag", "id", changed).await.unwrap();
        assert_eq!(store.len("tag"), 1);
        let found = store.find_by_id("tag", "id", &id).await.unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&json!("b")));
        assert!(store.delete("tag", "id", &id).await.unwrap());
        assert!(!store.delete("tag", "id", &id).await.unwrap());
    }

    #[tokio::test]
    async fn find_filters_sorts_and_slices() {
        let store = InMemoryDocumentStore::new();
        store
            .seed("tag", (1..=10).map(|n| doc(json!({ "id": n, "even": n % 2 == 0 }))))
            .unwrap();
        let mut q = query();
        q.and_where(Filter::Eq { field: "even".into(), value: json!(true) });
        q.sort_by("id", SortDirection::Desc);
        assert_eq!(store.count(&q).await.unwrap(), 5);
        let page = store.find(&q, 1, Some(2)).await.unwrap();
        let ids: Vec<_> = page.iter().map(|d| d.get("id").cloned().unwrap()).collect();
        assert_eq!(ids, vec![json!(8), json!(6)]);
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let store = InMemoryDocumentStore::new();
        assert!(store.find(&query(), 0, None).await.unwrap().is_empty());
        assert_eq!(store.count(&query()).await.unwrap(), 0);
    }
}
