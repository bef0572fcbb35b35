use super::{DataService, PendingOp, QuerySpec, UnitOfWork};
use crate::config::SearchableField;
use crate::error::AppError;
use crate::events::{AdminEvent, EventDispatcher, EventPayload};
use crate::metadata::{Backend, DocumentMetadata, DocumentSchemaProvider};
use crate::pagination::{PaginationAdapter, Paginator};
use crate::query::{BuiltQuery, DocumentQuery, QueryBuilderFactory};
use crate::record::ModelRecord;
use crate::store::DocumentStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct DocumentQueryAdapter {
    store: Arc<dyn DocumentStore>,
    query: DocumentQuery,
}

impl DocumentQueryAdapter {
    pub fn new(store: Arc<dyn DocumentStore>, query: DocumentQuery) -> Self {
        DocumentQueryAdapter { store, query }
    }
}

#[async_trait]
impl PaginationAdapter for DocumentQueryAdapter {
    async fn nb_results(&self) -> Result<u64, AppError> {
        self.store.count(&self.query).await
    }

    async fn slice(&self, offset: u64, length: u64) -> Result<Vec<ModelRecord>, AppError> {
        let docs = self.store.find(&self.query, offset, Some(length)).await?;
        Ok(docs
            .into_iter()
            .map(|doc| ModelRecord::from_fields(self.query.class.clone(), doc))
            .collect())
    }
}

pub struct DocumentDataService {
    schema: Arc<DocumentSchemaProvider>,
    factory: Arc<QueryBuilderFactory>,
    store: Arc<dyn DocumentStore>,
    events: EventDispatcher,
}

fn id_field(doc: &DocumentMetadata) -> &str {
    doc.identifier_field().unwrap_or("id")
}

impl DocumentDataService {
    pub fn new(
        schema: Arc<DocumentSchemaProvider>,
        factory: Arc<QueryBuilderFactory>,
        store: Arc<dyn DocumentStore>,
        events: EventDispatcher,
    ) -> Self {
        DocumentDataService {
            schema,
            factory,
            store,
            events,
        }
    }

    fn document(&self, class: &str) -> Result<Arc<DocumentMetadata>, AppError> {
        self.schema
            .document(class)
            .ok_or_else(|| AppError::UnmanagedClass(class.to_string()))
    }

    /// Apply one op; returns the saved document for a persist.
    async fn apply(&self, op: &PendingOp) -> Result<Option<ModelRecord>, AppError> {
        let doc = self.document(&op.record().class)?;
        match op {
            PendingOp::Persist(record) => {
                let saved = self
                    .store
                    .save(&doc.collection, id_field(&doc), record.fields.clone())
                    .await?;
                Ok(Some(ModelRecord::from_fields(record.class.clone(), saved)))
            }
            PendingOp::Remove(record) => {
                let id = record.id(id_field(&doc)).cloned().unwrap_or(Value::Null);
                if !self.store.delete(&doc.collection, id_field(&doc), &id).await? {
                    tracing::debug!(class = %record.class, "remove: document already absent");
                }
                Ok(None)
            }
        }
    }

    fn paginate(&self, query: BuiltQuery, spec: &QuerySpec) -> Result<Paginator, AppError> {
        match query {
            BuiltQuery::Document(query) => spec.paginate(Paginator::new(DocumentQueryAdapter::new(self.store.clone(), query))),
            other => Err(AppError::BadRequest(format!(
                "query for {} is not a document query",
                other.class()
            ))),
        }
    }
}

#[async_trait]
impl DataService for DocumentDataService {
    fn backend(&self) -> Backend {
        Backend::Document
    }

    async fn find_one(&self, class: &str, id: &Value) -> Result<Option<ModelRecord>, AppError> {
        let doc = self.document(class)?;
        let found = self.store.find_by_id(&doc.collection, id_field(&doc), id).await?;
        Ok(found.map(|fields| ModelRecord::from_fields(doc.name.clone(), fields)))
    }

    async fn find_all(&self, class: &str, spec: &QuerySpec) -> Result<Paginator, AppError> {
        let sort_field = spec.sort_field.as_deref();
        let mut query =
            self.factory
                .create_list_query(Some(Backend::Document), class, sort_field, spec.sort_direction)?;
        self.events.dispatch(
            AdminEvent::PostListQueryBuilder,
            &mut EventPayload::ListQuery {
                query: &mut query,
                sort_field,
                sort_direction: spec.sort_direction,
            },
        );
        self.paginate(query, spec)
    }

    async fn find_by(
        &self,
        class: &str,
        search_query: &str,
        fields: &[SearchableField],
        spec: &QuerySpec,
    ) -> Result<Paginator, AppError> {
        let sort_field = spec.sort_field.as_deref();
        let mut query = self.factory.create_search_query(
            Some(Backend::Document),
            class,
            search_query,
            fields,
            sort_field,
            spec.sort_direction,
        )?;
        self.events.dispatch(
            AdminEvent::PostSearchQueryBuilder,
            &mut EventPayload::SearchQuery {
                query: &mut query,
                search_query,
                searchable_fields: fields,
                sort_field,
                sort_direction: spec.sort_direction,
            },
        );
        self.paginate(query, spec)
    }

    fn persist(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError> {
        self.document(&record.class)?;
        uow.push(Backend::Document, PendingOp::Persist(record.clone()));
        Ok(())
    }

    fn remove(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError> {
        let doc = self.document(&record.class)?;
        if record.id(id_field(&doc)).is_none() {
            return Err(AppError::BadRequest(format!(
                "cannot remove {} without a value for '{}'",
                record.class,
                id_field(&doc)
            )));
        }
        uow.push(Backend::Document, PendingOp::Remove(record.clone()));
        Ok(())
    }

    /// Ops run in order; on failure the failed op and the ones after it stay queued.
    async fn flush(&self, uow: &mut UnitOfWork) -> Result<Vec<ModelRecord>, AppError> {
        let mut ops = uow.take(Backend::Document).into_iter();
        let mut stored = Vec::new();
        while let Some(op) = ops.next() {
            match self.apply(&op).await {
                Ok(saved) => stored.extend(saved),
                Err(e) => {
                    tracing::warn!(error = %e, class = %op.record().class, "document flush stopped");
                    uow.restore(Backend::Document, std::iter::once(op).chain(ops).collect());
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }
}
