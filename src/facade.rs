//! Data access facade: one surface over the relational and document backends.
//!
//! Every call classifies the class first. Classification probes the schema providers in
//! registration order (relational, then document) and memoizes the answer per class name.

use crate::config::SearchableField;
use crate::error::AppError;
use crate::events::{AdminEvent, EventDispatcher, EventListener, EventPayload};
use crate::metadata::{
    Backend, ClassMetadataWrapper, DocumentSchemaProvider, RelationalSchemaProvider, SchemaProvider,
};
use crate::pagination::Paginator;
use crate::query::{QueryBuilderFactory, QueryHooks};
use crate::record::{display_id, ClassRef, ModelRecord};
use crate::service::{DataService, DocumentDataService, QuerySpec, RelationalDataService, UnitOfWork};
use crate::sql::SqlExecutor;
use crate::store::DocumentStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// What the facade is assembled from.
pub struct Backends {
    pub relational: Arc<RelationalSchemaProvider>,
    pub document: Arc<DocumentSchemaProvider>,
    pub executor: Arc<dyn SqlExecutor>,
    pub store: Arc<dyn DocumentStore>,
    pub hooks: QueryHooks,
}

pub struct DataProxy {
    providers: Vec<Arc<dyn SchemaProvider>>,
    services: HashMap<Backend, Arc<dyn DataService>>,
    factory: Arc<QueryBuilderFactory>,
    classification: RwLock<HashMap<String, Backend>>,
    events: EventDispatcher,
}

impl DataProxy {
    pub fn new(backends: Backends) -> Self {
        let Backends {
            relational,
            document,
            executor,
            store,
            hooks,
        } = backends;
        let events = EventDispatcher::default();
        let factory = Arc::new(QueryBuilderFactory::new(relational.clone(), document.clone()).with_hooks(hooks));

        let mut services: HashMap<Backend, Arc<dyn DataService>> = HashMap::new();
        services.insert(
            Backend::Relational,
            Arc::new(RelationalDataService::new(
                relational.clone(),
                factory.clone(),
                executor,
                events.clone(),
            )),
        );
        services.insert(
            Backend::Document,
            Arc::new(DocumentDataService::new(document.clone(), factory.clone(), store, events.clone())),
        );

        DataProxy {
            providers: vec![
                relational as Arc<dyn SchemaProvider>,
                document as Arc<dyn SchemaProvider>,
            ],
            services,
            factory,
            classification: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn query_factory(&self) -> &Arc<QueryBuilderFactory> {
        &self.factory
    }

    /// Listener for every lifecycle event of the facade and both services.
    pub fn set_event_listener(&self, listener: Arc<dyn EventListener>) {
        self.events.set_listener(listener);
    }

    fn cached(&self, class: &str) -> Option<Backend> {
        self.classification
            .read()
            .ok()
            .and_then(|cache| cache.get(class).copied())
    }

    fn remember(&self, class: &str, backend: Backend) {
        if let Ok(mut cache) = self.classification.write() {
            cache.entry(class.to_string()).or_insert(backend);
        }
    }

    /// Classification memo, if this class was already probed.
    pub fn cached_classification(&self, class: &str) -> Option<Backend> {
        self.cached(class)
    }

    /// Forget every classification; the next call re-probes.
    pub fn clear_classification_cache(&self) {
        if let Ok(mut cache) = self.classification.write() {
            cache.clear();
        }
    }

    /// Schema metadata of the class from whichever backend manages it.
    pub fn metadata<C: ClassRef + ?Sized>(&self, class: &C) -> Result<Arc<dyn ClassMetadataWrapper>, AppError> {
        let class = class.class_name();
        if let Some(backend) = self.cached(class) {
            if let Some(meta) = self
                .providers
                .iter()
                .find(|p| p.backend() == backend)
                .and_then(|p| p.metadata_for(class))
            {
                return Ok(meta);
            }
        }
        for provider in &self.providers {
            if let Some(meta) = provider.metadata_for(class) {
                tracing::debug!(class = %class, backend = %provider.backend(), "classified");
                self.remember(class, provider.backend());
                return Ok(meta);
            }
        }
        Err(AppError::UnmanagedClass(class.to_string()))
    }

    pub fn classify<C: ClassRef + ?Sized>(&self, class: &C) -> Result<Backend, AppError> {
        if let Some(backend) = self.cached(class.class_name()) {
            return Ok(backend);
        }
        Ok(self.metadata(class)?.backend())
    }

    fn service_for<C: ClassRef + ?Sized>(&self, class: &C) -> Result<&Arc<dyn DataService>, AppError> {
        let backend = self.classify(class)?;
        self.services
            .get(&backend)
            .ok_or_else(|| AppError::UnmanagedClass(class.class_name().to_string()))
    }

    pub async fn find_one<C: ClassRef + ?Sized>(&self, class: &C, id: &Value) -> Result<Option<ModelRecord>, AppError> {
        self.service_for(class)?.find_one(class.class_name(), id).await
    }

    pub async fn get_one<C: ClassRef + ?Sized>(&self, class: &C, id: &Value) -> Result<ModelRecord, AppError> {
        match self.find_one(class, id).await? {
            Some(record) => Ok(record),
            None => Err(AppError::RecordNotFound {
                class: class.class_name().to_string(),
                id_field: self.metadata(class)?.single_identifier_field_name()?,
                id: display_id(id),
            }),
        }
    }

    pub async fn find_all<C: ClassRef + ?Sized>(&self, class: &C, spec: &QuerySpec) -> Result<Paginator, AppError> {
        let name = class.class_name();
        let service = self.service_for(class)?;
        self.events
            .dispatch(AdminEvent::PreList, &mut EventPayload::Class { class: name });
        let paginator = service.find_all(name, spec).await?;
        self.events
            .dispatch(AdminEvent::PostList, &mut EventPayload::Class { class: name });
        Ok(paginator)
    }

    pub async fn find_by<C: ClassRef + ?Sized>(
        &self,
        class: &C,
        search_query: &str,
        fields: &[SearchableField],
        spec: &QuerySpec,
    ) -> Result<Paginator, AppError> {
        let name = class.class_name();
        let service = self.service_for(class)?;
        self.events
            .dispatch(AdminEvent::PreSearch, &mut EventPayload::Class { class: name });
        let paginator = service.find_by(name, search_query, fields, spec).await?;
        self.events
            .dispatch(AdminEvent::PostSearch, &mut EventPayload::Class { class: name });
        Ok(paginator)
    }

    /// Queue an insert or update in the caller's unit of work.
    pub fn persist(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError> {
        self.service_for(record)?.persist(uow, record)
    }

    /// Queue a delete in the caller's unit of work.
    pub fn remove(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError> {
        self.service_for(record)?.remove(uow, record)
    }

    pub async fn remove_and_flush(&self, record: &ModelRecord) -> Result<(), AppError> {
        let service = self.service_for(record)?;
        self.events
            .dispatch(AdminEvent::PreRemove, &mut EventPayload::Record { record });
        let mut uow = UnitOfWork::new();
        service.remove(&mut uow, record)?;
        service.flush(&mut uow).await?;
        self.events
            .dispatch(AdminEvent::PostRemove, &mut EventPayload::Record { record });
        Ok(())
    }

    /// Store the record now; returns it as stored, generated identifiers included.
    pub async fn persist_and_flush(&self, record: &ModelRecord) -> Result<ModelRecord, AppError> {
        let service = self.service_for(record)?;
        self.events
            .dispatch(AdminEvent::PrePersist, &mut EventPayload::Record { record });
        let stored = service.persist_and_flush(record).await?;
        self.events
            .dispatch(AdminEvent::PostPersist, &mut EventPayload::Record { record: &stored });
        Ok(stored)
    }

    /// Apply the unit of work on both backends, relational first. Returns the stored state
    /// of each persisted record. On error, whatever was not applied stays in `uow`.
    pub async fn flush(&self, uow: &mut UnitOfWork) -> Result<Vec<ModelRecord>, AppError> {
        let mut stored = Vec::new();
        for backend in [Backend::Relational, Backend::Document] {
            if let Some(service) = self.services.get(&backend) {
                stored.extend(service.flush(uow).await?);
            }
        }
        Ok(stored)
    }

    /// Set one scalar property and persist the record.
    pub async fn update_property(
        &self,
        record: &ModelRecord,
        property: &str,
        value: Value,
    ) -> Result<ModelRecord, AppError> {
        let meta = self.metadata(record)?;
        let unwritable = || AppError::UnwritableProperty {
            class: record.class.clone(),
            property: property.to_string(),
        };
        let field = meta.field_mappings().get(property).cloned().ok_or_else(unwritable)?;
        if field.id || field.virtual_field {
            return Err(unwritable());
        }

        self.events.dispatch(
            AdminEvent::PreUpdate,
            &mut EventPayload::PropertyUpdate {
                record,
                property,
                new_value: &value,
            },
        );
        let mut updated = record.clone();
        updated.set(property, value.clone());
        let stored = self.service_for(record)?.persist_and_flush(&updated).await?;
        self.events.dispatch(
            AdminEvent::PostUpdate,
            &mut EventPayload::PropertyUpdate {
                record: &stored,
                property,
                new_value: &value,
            },
        );
        Ok(stored)
    }
}
