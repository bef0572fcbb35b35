//! Enrich configured models with properties read from their schema metadata.

use crate::config::{validate_enriched, AdminConfig, ModelEntry, PropertyConfig};
use crate::error::{AppError, ConfigError};
use crate::facade::DataProxy;
use indexmap::IndexMap;

pub struct MetadataIntrospector<'a> {
    proxy: &'a DataProxy,
}

impl<'a> MetadataIntrospector<'a> {
    pub fn new(proxy: &'a DataProxy) -> Self {
        MetadataIntrospector { proxy }
    }

    /// Fill `properties` and `primary_key_field_name` of every model. Prior enrichment is
    /// replaced, so running this twice gives the same result.
    pub fn process(&self, mut config: AdminConfig) -> Result<AdminConfig, ConfigError> {
        for entry in config.entities.values_mut().chain(config.documents.values_mut()) {
            self.process_entry(entry)?;
        }
        validate_enriched(&config)?;
        tracing::info!(models = config.models().count(), "admin config introspected");
        Ok(config)
    }

    fn process_entry(&self, entry: &mut ModelEntry) -> Result<(), ConfigError> {
        let meta = self.proxy.metadata(entry.class.as_str()).map_err(|e| match e {
            AppError::Config(e) => e,
            AppError::UnmanagedClass(class) => ConfigError::UnmanagedClass(class),
            other => ConfigError::Load(other.to_string()),
        })?;
        let backend = meta.backend();
        if let Some(declared) = entry.backend {
            if declared != backend {
                return Err(ConfigError::BackendMismatch {
                    model: entry.name.clone(),
                    class: entry.class.clone(),
                    declared: declared.as_str(),
                    actual: backend.as_str(),
                });
            }
        }
        // composite identifiers fail here
        let primary_key = meta.single_identifier_field_name()?;

        let mut properties: IndexMap<String, PropertyConfig> = meta
            .field_mappings()
            .values()
            .map(|f| (f.name.clone(), PropertyConfig::from_field(f)))
            .collect();
        for assoc in meta.association_mappings()?.values() {
            properties.insert(assoc.name.clone(), PropertyConfig::from_association(assoc, backend));
        }
        for name in &entry.fields {
            if !properties.contains_key(name) {
                properties.insert(name.clone(), PropertyConfig::virtual_property(name));
            }
        }

        tracing::debug!(
            model = %entry.name,
            class = %entry.class,
            backend = %backend,
            properties = properties.len(),
            "model introspected"
        );
        entry.backend = Some(backend);
        entry.primary_key_field_name = Some(primary_key);
        entry.properties = properties;
        Ok(())
    }
}
