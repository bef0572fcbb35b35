//! Per-model overrides of the default query builders.

use crate::config::SearchableField;
use crate::error::AppError;
use crate::metadata::Backend;
use crate::query::{BuiltQuery, QueryBuilderFactory, SortDirection};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    ListQuery,
    SearchQuery,
}

/// Everything a builder needs; `search_text` is `None` for list queries.
#[derive(Clone, Debug)]
pub struct QueryRequest<'a> {
    pub backend: Backend,
    pub class: &'a str,
    pub search_text: Option<&'a str>,
    pub searchable_fields: &'a [SearchableField],
    pub sort_field: Option<&'a str>,
    pub sort_direction: SortDirection,
}

pub type QueryHook =
    Arc<dyn Fn(&QueryBuilderFactory, &QueryRequest<'_>) -> Result<BuiltQuery, AppError> + Send + Sync>;

/// Map of (model short name, hook kind) to an override.
#[derive(Clone, Default)]
pub struct QueryHooks {
    hooks: HashMap<(String, HookKind), QueryHook>,
}

impl QueryHooks {
    pub fn register<F>(&mut self, model: impl Into<String>, kind: HookKind, hook: F) -> &mut Self
    where
        F: Fn(&QueryBuilderFactory, &QueryRequest<'_>) -> Result<BuiltQuery, AppError> + Send + Sync + 'static,
    {
        self.hooks.insert((model.into(), kind), Arc::new(hook));
        self
    }

    pub fn get(&self, model: &str, kind: HookKind) -> Option<&QueryHook> {
        self.hooks.get(&(model.to_string(), kind))
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for QueryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}
