use super::{is_exact_match_field, parse_numeric, SortDirection};
use crate::config::SearchableField;
use crate::error::AppError;
use crate::metadata::EntityMetadata;
use crate::sql::{SqlCondition, SqlQuery};

fn sort_column(entity: &EntityMetadata, field: &str) -> Result<String, AppError> {
    entity
        .column_for(field)
        .ok_or_else(|| AppError::BadRequest(format!("cannot sort {} by '{}'", entity.name, field)))
}

/// LIKE wildcards in user text match literally.
fn like_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub(super) fn list_query(
    entity: &EntityMetadata,
    sort_field: Option<&str>,
    sort_direction: SortDirection,
) -> Result<SqlQuery, AppError> {
    let mut query = SqlQuery::select_all(entity);
    if let Some(field) = sort_field {
        query.order_by(sort_column(entity, field)?, sort_direction);
    }
    Ok(query)
}

pub(super) fn search_query(
    entity: &EntityMetadata,
    search_text: &str,
    fields: &[SearchableField],
    sort_field: Option<&str>,
    sort_direction: SortDirection,
) -> Result<SqlQuery, AppError> {
    let mut query = list_query(entity, sort_field, sort_direction)?;
    let text = search_text.trim();
    let numeric = parse_numeric(text);
    // an explicit empty group: no clause means no match
    query.search = Some(Vec::new());

    for field in fields {
        let column = entity.column_for(&field.name).ok_or_else(|| {
            AppError::BadRequest(format!("unknown search field '{}' on {}", field.name, entity.name))
        })?;
        match &numeric {
            Some(value) if is_exact_match_field(field) => {
                query.or_search(SqlCondition::Eq {
                    column,
                    value: value.clone(),
                    cast: Some("numeric".into()),
                });
            }
            _ if field.is_text() => {
                query.or_search(SqlCondition::ILike {
                    column,
                    pattern: format!("%{}%", like_escape(text)),
                });
            }
            _ => {
                tracing::warn!(
                    class = %entity.name,
                    field = %field.name,
                    data_type = %field.data_type,
                    "search field type not searchable on the relational backend, skipped"
                );
            }
        }
    }
    Ok(query)
}
