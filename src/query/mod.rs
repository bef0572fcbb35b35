//! Query builder factory: backend-appropriate list and search queries for a managed class.

pub mod document;
pub mod hooks;
mod relational;

pub use document::{DocumentQuery, Filter};
pub use hooks::{HookKind, QueryHook, QueryHooks, QueryRequest};

use crate::case::class_short_name;
use crate::config::SearchableField;
use crate::error::AppError;
use crate::metadata::{Backend, DocumentSchemaProvider, RelationalSchemaProvider};
use crate::sql::SqlQuery;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `ASC` in any case is ascending; anything else, including nothing, is DESC.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// The search text as a JSON number, when it is one.
pub fn parse_numeric(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Whether a search field is compared by exact numeric equality.
fn is_exact_match_field(field: &SearchableField) -> bool {
    field.is_numeric() || (field.id && !field.is_text())
}

/// A query built for one backend, mutable by listeners until it is executed.
#[derive(Clone, Debug)]
pub enum BuiltQuery {
    Sql(SqlQuery),
    Document(DocumentQuery),
}

impl BuiltQuery {
    pub fn backend(&self) -> Backend {
        match self {
            BuiltQuery::Sql(_) => Backend::Relational,
            BuiltQuery::Document(_) => Backend::Document,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            BuiltQuery::Sql(q) => q.class.as_str(),
            BuiltQuery::Document(q) => q.class.as_str(),
        }
    }

    pub fn as_sql(&self) -> Option<&SqlQuery> {
        match self {
            BuiltQuery::Sql(q) => Some(q),
            BuiltQuery::Document(_) => None,
        }
    }

    pub fn as_sql_mut(&mut self) -> Option<&mut SqlQuery> {
        match self {
            BuiltQuery::Sql(q) => Some(q),
            BuiltQuery::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&DocumentQuery> {
        match self {
            BuiltQuery::Document(q) => Some(q),
            BuiltQuery::Sql(_) => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut DocumentQuery> {
        match self {
            BuiltQuery::Document(q) => Some(q),
            BuiltQuery::Sql(_) => None,
        }
    }
}

pub struct QueryBuilderFactory {
    relational: Arc<RelationalSchemaProvider>,
    document: Arc<DocumentSchemaProvider>,
    hooks: QueryHooks,
}

impl QueryBuilderFactory {
    pub fn new(relational: Arc<RelationalSchemaProvider>, document: Arc<DocumentSchemaProvider>) -> Self {
        QueryBuilderFactory {
            relational,
            document,
            hooks: QueryHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: QueryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Select-all query, ordered when a sort field is given. Without an explicit backend
    /// the class namespace decides.
    pub fn create_list_query(
        &self,
        backend: Option<Backend>,
        class: &str,
        sort_field: Option<&str>,
        sort_direction: SortDirection,
    ) -> Result<BuiltQuery, AppError> {
        let req = QueryRequest {
            backend: backend.unwrap_or_else(|| Backend::from_namespace(class)),
            class,
            search_text: None,
            searchable_fields: &[],
            sort_field,
            sort_direction,
        };
        self.run(HookKind::ListQuery, &req)
    }

    /// OR-combined multi-field search.
    pub fn create_search_query(
        &self,
        backend: Option<Backend>,
        class: &str,
        search_text: &str,
        searchable_fields: &[SearchableField],
        sort_field: Option<&str>,
        sort_direction: SortDirection,
    ) -> Result<BuiltQuery, AppError> {
        let req = QueryRequest {
            backend: backend.unwrap_or_else(|| Backend::from_namespace(class)),
            class,
            search_text: Some(search_text),
            searchable_fields,
            sort_field,
            sort_direction,
        };
        self.run(HookKind::SearchQuery, &req)
    }

    /// A registered hook for the class's model name wins over the default builder.
    fn run(&self, kind: HookKind, req: &QueryRequest<'_>) -> Result<BuiltQuery, AppError> {
        if let Some(hook) = self.hooks.get(class_short_name(req.class), kind) {
            tracing::debug!(class = %req.class, ?kind, "query hook override");
            return (**hook)(self, req);
        }
        self.build_default(kind, req)
    }

    /// The built-in builder, also callable from hooks that only want to adjust it.
    pub fn build_default(&self, kind: HookKind, req: &QueryRequest<'_>) -> Result<BuiltQuery, AppError> {
        match req.backend {
            Backend::Relational => {
                let entity = self
                    .relational
                    .entity(req.class)
                    .ok_or_else(|| AppError::UnmanagedClass(req.class.to_string()))?;
                let query = match kind {
                    HookKind::ListQuery => relational::list_query(&entity, req.sort_field, req.sort_direction)?,
                    HookKind::SearchQuery => relational::search_query(
                        &entity,
                        req.search_text.unwrap_or_default(),
                        req.searchable_fields,
                        req.sort_field,
                        req.sort_direction,
                    )?,
                };
                Ok(BuiltQuery::Sql(query))
            }
            Backend::Document => {
                let doc = self
                    .document
                    .document(req.class)
                    .ok_or_else(|| AppError::UnmanagedClass(req.class.to_string()))?;
                let query = match kind {
                    HookKind::ListQuery => document::list_query(&doc, req.sort_field, req.sort_direction)?,
                    HookKind::SearchQuery => document::search_query(
                        &doc,
                        req.search_text.unwrap_or_default(),
                        req.searchable_fields,
                        req.sort_field,
                        req.sort_direction,
                    )?,
                };
                Ok(BuiltQuery::Document(query))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DocumentMapping, EntityMapping};
    use crate::sql::SqlCondition;
    use serde_json::json;

    fn factory() -> QueryBuilderFactory {
        let entity: EntityMapping = serde_json::from_value(json!({
            "class": "App\\Entity\\Category",
            "fields": [
                { "field_name": "id", "type": "integer", "id": true },
                { "field_name": "name", "type": "string" }
            ]
        }))
        .unwrap();
        let doc: DocumentMapping = serde_json::from_value(json!({
            "class": "App\\Document\\Category",
            "fields": [
                { "field_name": "id", "type": "string", "id": true },
                { "field_name": "name", "type": "string" }
            ]
        }))
        .unwrap();
        QueryBuilderFactory::new(
            Arc::new(RelationalSchemaProvider::new(&[entity], "public").unwrap()),
            Arc::new(DocumentSchemaProvider::new(&[doc])),
        )
    }

    #[test]
    fn sort_direction_defaults_to_desc() {
        assert_eq!(SortDirection::parse(None), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("asc")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("sideways")), SortDirection::Desc);
    }

    #[test]
    fn numeric_parsing() {
        assert_eq!(parse_numeric(" 42 "), Some(json!(42)));
        assert_eq!(parse_numeric("4.5"), Some(json!(4.5)));
        assert_eq!(parse_numeric("cat"), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn namespace_selects_backend_when_not_given() {
        let f = factory();
        let q = f
            .create_list_query(None, "App\\Entity\\Category", None, SortDirection::Desc)
            .unwrap();
        assert_eq!(q.backend(), Backend::Relational);
        let q = f
            .create_list_query(None, "App\\Document\\Category", None, SortDirection::Desc)
            .unwrap();
        assert_eq!(q.backend(), Backend::Document);
    }

    #[test]
    fn unknown_class_is_unmanaged() {
        let err = factory()
            .create_list_query(Some(Backend::Relational), "App\\Entity\\Nope", None, SortDirection::Desc)
            .unwrap_err();
        assert!(matches!(err, AppError::UnmanagedClass(c) if c == "App\\Entity\\Nope"));
    }

    #[test]
    fn hook_overrides_default_builder_for_its_model_only() {
        let mut hooks = QueryHooks::default();
        hooks.register("Category", HookKind::ListQuery, |factory, req| {
            let mut q = factory.build_default(HookKind::ListQuery, req)?;
            if let Some(sql) = q.as_sql_mut() {
                sql.and_where(SqlCondition::IsNull { column: "name".into() });
            }
            Ok(q)
        });
        let f = factory().with_hooks(hooks);
        let q = f
            .create_list_query(Some(Backend::Relational), "App\\Entity\\Category", None, SortDirection::Desc)
            .unwrap();
        assert_eq!(q.as_sql().unwrap().filters.len(), 1);
        let q = f
            .create_search_query(
                Some(Backend::Relational),
                "App\\Entity\\Category",
                "x",
                &[SearchableField::new("name", "string")],
                None,
                SortDirection::Desc,
            )
            .unwrap();
        assert!(q.as_sql().unwrap().filters.is_empty());
    }
}
