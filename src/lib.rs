//! Backoffice SDK: metadata-driven admin backend core over relational and document persistence.

pub mod case;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod metadata;
pub mod pagination;
pub mod query;
pub mod record;
pub mod response;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{
    load_from_path, load_from_str, AdminConfig, MappingSet, MetadataIntrospector, ModelEntry, PropertyConfig,
    SearchableField,
};
pub use error::{AppError, ConfigError};
pub use events::{AdminEvent, EventListener, EventPayload};
pub use facade::{Backends, DataProxy};
pub use metadata::{Backend, Cardinality, ClassMetadataWrapper, SchemaProvider};
pub use pagination::{Page, Paginator};
pub use query::{BuiltQuery, HookKind, QueryBuilderFactory, QueryHooks, SortDirection};
pub use record::ModelRecord;
pub use response::{success_created, success_one, success_page};
pub use service::{QuerySpec, UnitOfWork};
pub use sql::SqlExecutor;
pub use state::{AppState, ListRequest};
pub use store::{DocumentStore, InMemoryDocumentStore};
