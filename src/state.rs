//! Shared application state for collaborators (HTTP handlers, jobs). Config is reloadable.

use crate::config::{AdminConfig, MetadataIntrospector, ModelEntry, NUMERIC_TYPES};
use crate::error::{AppError, ConfigError};
use crate::facade::DataProxy;
use crate::pagination::Page;
use crate::query::SortDirection;
use crate::record::ModelRecord;
use crate::service::QuerySpec;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Page, sort and search text as a collaborator receives them (e.g. query string).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub page: Option<u64>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub query: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<DataProxy>,
    /// Introspected config; replaced as a whole by `reload`.
    pub config: Arc<RwLock<AdminConfig>>,
}

fn config_lock_error<T>(_: T) -> AppError {
    AppError::Config(ConfigError::Load("admin config lock poisoned".into()))
}

impl AppState {
    pub fn bootstrap(proxy: Arc<DataProxy>, raw: AdminConfig) -> Result<Self, ConfigError> {
        let config = MetadataIntrospector::new(&proxy).process(raw)?;
        Ok(AppState {
            proxy,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Introspect a new config and swap it in; the current one stays on failure.
    pub fn reload(&self, raw: AdminConfig) -> Result<(), ConfigError> {
        let config = MetadataIntrospector::new(&self.proxy).process(raw)?;
        let mut slot = self
            .config
            .write()
            .map_err(|_| ConfigError::Load("admin config lock poisoned".into()))?;
        tracing::info!(
            entities = config.entities.len(),
            documents = config.documents.len(),
            "admin config reloaded"
        );
        *slot = config;
        Ok(())
    }

    /// Model entry and configured page size.
    pub fn model(&self, name: &str) -> Result<(ModelEntry, u64), AppError> {
        let config = self.config.read().map_err(config_lock_error)?;
        let entry = config
            .model(name)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("unknown model '{}'", name)))?;
        Ok((entry, config.list.max_results))
    }

    fn query_spec(entry: &ModelEntry, page_size: u64, req: &ListRequest) -> Result<QuerySpec, AppError> {
        let sort_field = req
            .sort_field
            .clone()
            .or_else(|| entry.primary_key_field_name.clone());
        if let Some(property) = sort_field.as_deref().and_then(|f| entry.property(f)) {
            if !property.is_sortable() {
                return Err(AppError::BadRequest(format!(
                    "{} cannot be sorted by '{}'",
                    entry.name, property.field_name
                )));
            }
        }
        Ok(QuerySpec {
            page: req.page.unwrap_or(1),
            page_size,
            sort_field,
            sort_direction: SortDirection::parse(req.sort_direction.as_deref()),
        })
    }

    /// List view: sorted by the primary key unless the request says otherwise.
    pub async fn list(&self, model: &str, req: &ListRequest) -> Result<Page<ModelRecord>, AppError> {
        let (entry, page_size) = self.model(model)?;
        let spec = Self::query_spec(&entry, page_size, req)?;
        self.proxy.find_all(entry.class.as_str(), &spec).await?.fetch().await
    }

    /// Search view over the model's searchable fields; a blank query lists everything.
    pub async fn search(&self, model: &str, req: &ListRequest) -> Result<Page<ModelRecord>, AppError> {
        let text = req.query.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return self.list(model, req).await;
        }
        let (entry, page_size) = self.model(model)?;
        let spec = Self::query_spec(&entry, page_size, req)?;
        let fields = entry.searchable_fields();
        self.proxy
            .find_by(entry.class.as_str(), text, &fields, &spec)
            .await?
            .fetch()
            .await
    }

    /// Show view: `raw_id` comes from a path segment and is typed after the identifier.
    pub async fn show(&self, model: &str, raw_id: &str) -> Result<ModelRecord, AppError> {
        let (entry, _) = self.model(model)?;
        let id = parse_id(&entry, raw_id)?;
        self.proxy.get_one(entry.class.as_str(), &id).await
    }
}

fn parse_id(entry: &ModelEntry, raw: &str) -> Result<Value, AppError> {
    let id_type = entry
        .primary_key_field_name
        .as_deref()
        .and_then(|pk| entry.property(pk))
        .map(|p| p.type_.as_str());
    match id_type {
        Some("integer" | "smallint" | "bigint") => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", raw))),
        Some(t) if NUMERIC_TYPES.contains(&t) => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| AppError::BadRequest(format!("invalid id '{}'", raw))),
        Some("guid") => uuid::Uuid::parse_str(raw)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| AppError::BadRequest("invalid uuid".into())),
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyConfig;
    use crate::metadata::FieldDescriptor;
    use serde_json::json;

    fn entry(id_type: &str) -> ModelEntry {
        let mut entry = ModelEntry::new("Category", "App\\Entity\\Category");
        entry.primary_key_field_name = Some("id".into());
        entry.properties.insert(
            "id".into(),
            PropertyConfig::from_field(&FieldDescriptor {
                name: "id".into(),
                storage_type: id_type.into(),
                nullable: false,
                virtual_field: false,
                id: true,
            }),
        );
        entry
            .properties
            .insert("notes".into(), PropertyConfig::virtual_property("notes"));
        entry
    }

    #[test]
    fn ids_are_typed_after_the_identifier() {
        assert_eq!(parse_id(&entry("integer"), "42").unwrap(), json!(42));
        assert!(parse_id(&entry("integer"), "x").is_err());
        assert_eq!(parse_id(&entry("string"), "abc").unwrap(), json!("abc"));
        assert!(parse_id(&entry("guid"), "not-a-uuid").is_err());
    }

    #[test]
    fn default_sort_is_primary_key_descending() {
        let spec = AppState::query_spec(&entry("integer"), 15, &ListRequest::default()).unwrap();
        assert_eq!(spec.sort_field.as_deref(), Some("id"));
        assert_eq!(spec.sort_direction, SortDirection::Desc);
        assert_eq!(spec.page, 1);
    }

    #[test]
    fn unsortable_property_is_rejected() {
        let req = ListRequest {
            sort_field: Some("notes".into()),
            ..Default::default()
        };
        assert!(matches!(
            AppState::query_spec(&entry("integer"), 15, &req),
            Err(AppError::BadRequest(_))
        ));
    }
}
