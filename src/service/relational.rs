use super::{DataService, PendingOp, QuerySpec, UnitOfWork};
use crate::config::SearchableField;
use crate::error::AppError;
use crate::events::{AdminEvent, EventDispatcher, EventPayload};
use crate::metadata::{Backend, EntityMetadata, RelationalSchemaProvider};
use crate::pagination::{PaginationAdapter, Paginator};
use crate::query::{BuiltQuery, QueryBuilderFactory};
use crate::record::ModelRecord;
use crate::sql::{delete_by_id, select_by_id, upsert, SqlExecutor, SqlQuery};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Map a row keyed by column onto the entity's property names.
fn row_to_record(class: &str, columns: &[(String, String)], row: Value) -> ModelRecord {
    let mut fields = Map::new();
    if let Value::Object(mut cells) = row {
        for (column, property) in columns {
            if let Some(v) = cells.remove(column) {
                fields.insert(property.clone(), v);
            }
        }
    }
    ModelRecord::from_fields(class, fields)
}

pub struct SqlQueryAdapter {
    executor: Arc<dyn SqlExecutor>,
    query: SqlQuery,
}

impl SqlQueryAdapter {
    pub fn new(executor: Arc<dyn SqlExecutor>, query: SqlQuery) -> Self {
        SqlQueryAdapter { executor, query }
    }
}

#[async_trait]
impl PaginationAdapter for SqlQueryAdapter {
    async fn nb_results(&self) -> Result<u64, AppError> {
        self.executor.fetch_count(&self.query.to_count()).await
    }

    async fn slice(&self, offset: u64, length: u64) -> Result<Vec<ModelRecord>, AppError> {
        let rows = self
            .executor
            .fetch_all(&self.query.to_select(Some(length), Some(offset)))
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row_to_record(&self.query.class, &self.query.columns, row))
            .collect())
    }
}

pub struct RelationalDataService {
    schema: Arc<RelationalSchemaProvider>,
    factory: Arc<QueryBuilderFactory>,
    executor: Arc<dyn SqlExecutor>,
    events: EventDispatcher,
}

impl RelationalDataService {
    pub fn new(
        schema: Arc<RelationalSchemaProvider>,
        factory: Arc<QueryBuilderFactory>,
        executor: Arc<dyn SqlExecutor>,
        events: EventDispatcher,
    ) -> Self {
        RelationalDataService {
            schema,
            factory,
            executor,
            events,
        }
    }

    fn entity(&self, class: &str) -> Result<Arc<EntityMetadata>, AppError> {
        self.schema
            .entity(class)
            .ok_or_else(|| AppError::UnmanagedClass(class.to_string()))
    }

    /// Run the ops as one transaction.
    async fn apply(&self, ops: &[PendingOp]) -> Result<Vec<ModelRecord>, AppError> {
        let entities = ops
            .iter()
            .map(|op| self.entity(&op.record().class))
            .collect::<Result<Vec<_>, _>>()?;
        let batch: Vec<_> = ops
            .iter()
            .zip(&entities)
            .map(|(op, entity)| match op {
                PendingOp::Persist(record) => upsert(entity, record),
                PendingOp::Remove(record) => {
                    let id_field = entity.identifier.first().map(String::as_str).unwrap_or("id");
                    delete_by_id(entity, record.id(id_field).unwrap_or(&Value::Null))
                }
            })
            .collect();
        tracing::debug!(statements = batch.len(), "flushing relational unit of work");
        let returned = self.executor.execute_batch(&batch).await?;

        let mut stored = Vec::new();
        for ((op, entity), row) in ops.iter().zip(&entities).zip(returned) {
            if let PendingOp::Persist(record) = op {
                stored.push(match row {
                    Some(row) => row_to_record(&entity.name, &entity.selected_columns(), row),
                    None => record.clone(),
                });
            }
        }
        Ok(stored)
    }

    fn paginate(&self, query: BuiltQuery, spec: &QuerySpec) -> Result<Paginator, AppError> {
        match query {
            BuiltQuery::Sql(query) => spec.paginate(Paginator::new(SqlQueryAdapter::new(self.executor.clone(), query))),
            other => Err(AppError::BadRequest(format!(
                "query for {} is not a relational query",
                other.class()
            ))),
        }
    }
}

#[async_trait]
impl DataService for RelationalDataService {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    async fn find_one(&self, class: &str, id: &Value) -> Result<Option<ModelRecord>, AppError> {
        let entity = self.entity(class)?;
        let row = self.executor.fetch_optional(&select_by_id(&entity, id)).await?;
        Ok(row.map(|row| row_to_record(&entity.name, &entity.selected_columns(), row)))
    }

    async fn find_all(&self, class: &str, spec: &QuerySpec) -> Result<Paginator, AppError> {
        let sort_field = spec.sort_field.as_deref();
        let mut query =
            self.factory
                .create_list_query(Some(Backend::Relational), class, sort_field, spec.sort_direction)?;
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
            Some(Backend::Relational),
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
        self.entity(&record.class)?;
        uow.push(Backend::Relational, PendingOp::Persist(record.clone()));
        Ok(())
    }

    fn remove(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError> {
        let entity = self.entity(&record.class)?;
        let id_field = entity.identifier.first().cloned().unwrap_or_default();
        if record.id(&id_field).is_none() {
            return Err(AppError::BadRequest(format!(
                "cannot remove {} without a value for '{}'",
                record.class, id_field
            )));
        }
        uow.push(Backend::Relational, PendingOp::Remove(record.clone()));
        Ok(())
    }

    async fn flush(&self, uow: &mut UnitOfWork) -> Result<Vec<ModelRecord>, AppError> {
        let ops = uow.take(Backend::Relational);
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        match self.apply(&ops).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                // The transaction rolled back; nothing was applied.
                uow.restore(Backend::Relational, ops);
                Err(e)
            }
        }
    }
}
