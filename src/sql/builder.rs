//! Builds parameterized SELECT, COUNT, upsert and DELETE statements from entity metadata.
//!
//! Identifiers come from mapping declarations only; values are always parameters. Every
//! parameter is sent as text and cast in SQL to the column's type, so one bind type covers
//! all columns.

use crate::metadata::EntityMetadata;
use crate::query::SortDirection;
use crate::record::ModelRecord;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// PostgreSQL type a mapping storage type is cast to when bound as text.
pub fn pg_cast_for(storage_type: &str) -> Option<&'static str> {
    Some(match storage_type {
        "integer" => "int4",
        "smallint" => "int2",
        "bigint" => "int8",
        "float" => "float8",
        "decimal" | "number" => "numeric",
        "boolean" => "boolean",
        "string" | "text" => "text",
        "guid" => "uuid",
        "date" => "date",
        "time" => "time",
        "datetime" => "timestamp",
        "datetimetz" => "timestamptz",
        "json" | "json_array" => "jsonb",
        _ => return None,
    })
}

fn placeholder(n: u32, cast: Option<&str>) -> String {
    match cast {
        Some(t) => format!("${}::{}", n, t),
        None => format!("${}", n),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// One WHERE predicate on a column.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlCondition {
    Eq {
        column: String,
        value: Value,
        cast: Option<String>,
    },
    /// Case-insensitive pattern match on the column's text form.
    ILike { column: String, pattern: String },
    In {
        column: String,
        values: Vec<Value>,
        cast: Option<String>,
    },
    IsNull { column: String },
}

impl SqlCondition {
    pub fn column(&self) -> &str {
        match self {
            SqlCondition::Eq { column, .. }
            | SqlCondition::ILike { column, .. }
            | SqlCondition::In { column, .. }
            | SqlCondition::IsNull { column } => column,
        }
    }

    fn render(&self, q: &mut QueryBuf) -> String {
        match self {
            SqlCondition::Eq { column, value, cast } => {
                let n = q.push_param(value.clone());
                format!("{} = {}", quoted(column), placeholder(n, cast.as_deref()))
            }
            SqlCondition::ILike { column, pattern } => {
                let n = q.push_param(Value::String(pattern.clone()));
                format!("{}::text ILIKE ${}", quoted(column), n)
            }
            SqlCondition::In { column, values, cast } => {
                if values.is_empty() {
                    return "1 = 0".into();
                }
                let phs: Vec<String> = values
                    .iter()
                    .map(|v| {
                        let n = q.push_param(v.clone());
                        placeholder(n, cast.as_deref())
                    })
                    .collect();
                format!("{} IN ({})", quoted(column), phs.join(", "))
            }
            SqlCondition::IsNull { column } => format!("{} IS NULL", quoted(column)),
        }
    }
}

/// A SELECT over one entity table: AND filters, an optional OR search group and ordering.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    pub class: String,
    pub schema: String,
    pub table: String,
    /// (column, property) pairs, in select order.
    pub columns: Vec<(String, String)>,
    /// Columns selected as text because the driver has no native decoding for them.
    pub text_columns: Vec<String>,
    pub filters: Vec<SqlCondition>,
    /// `Some(empty)` matches nothing.
    pub search: Option<Vec<SqlCondition>>,
    pub order_by: Option<(String, SortDirection)>,
}

impl SqlQuery {
    /// SELECT every mapped column of the entity, unfiltered and unordered.
    pub fn select_all(entity: &EntityMetadata) -> Self {
        let columns = entity.selected_columns();
        let text_columns = columns
            .iter()
            .filter(|(c, _)| matches!(entity.column_type(c), Some("decimal" | "number")))
            .map(|(c, _)| c.clone())
            .collect();
        SqlQuery {
            class: entity.name.clone(),
            schema: entity.schema.clone(),
            table: entity.table.clone(),
            columns,
            text_columns,
            filters: Vec::new(),
            search: None,
            order_by: None,
        }
    }

    pub fn and_where(&mut self, condition: SqlCondition) -> &mut Self {
        self.filters.push(condition);
        self
    }

    pub fn or_search(&mut self, condition: SqlCondition) -> &mut Self {
        self.search.get_or_insert_with(Vec::new).push(condition);
        self
    }

    pub fn order_by(&mut self, column: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    /// Property name for a selected column.
    pub fn property_for(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, p)| p.as_str())
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|(c, _)| {
                if self.text_columns.contains(c) {
                    format!("{}::text AS {}", quoted(c), quoted(c))
                } else {
                    quoted(c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn where_clause(&self, q: &mut QueryBuf) -> String {
        let mut parts: Vec<String> = self.filters.iter().map(|c| c.render(q)).collect();
        match &self.search {
            Some(group) if group.is_empty() => parts.push("1 = 0".into()),
            Some(group) => {
                let ors: Vec<String> = group.iter().map(|c| c.render(q)).collect();
                if ors.len() == 1 {
                    parts.extend(ors);
                } else {
                    parts.push(format!("({})", ors.join(" OR ")));
                }
            }
            None => {}
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    /// SELECT with optional LIMIT/OFFSET.
    pub fn to_select(&self, limit: Option<u64>, offset: Option<u64>) -> QueryBuf {
        let mut q = QueryBuf::new();
        let where_clause = self.where_clause(&mut q);
        // Table-qualified so the key binds to the stored column, not a `::text` output alias.
        let order_clause = self
            .order_by
            .as_ref()
            .map(|(c, d)| format!(" ORDER BY {}.{} {}", quoted(&self.table), quoted(c), d.as_sql()))
            .unwrap_or_default();
        let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
        q.sql = format!(
            "SELECT {} FROM {}{}{}{}{}",
            self.select_list(),
            qualified_table(&self.schema, &self.table),
            where_clause,
            order_clause,
            limit_clause,
            offset_clause
        );
        q
    }

    /// COUNT(*) over the same filters, ignoring ordering.
    pub fn to_count(&self) -> QueryBuf {
        let mut q = QueryBuf::new();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            qualified_table(&self.schema, &self.table),
            where_clause
        );
        q
    }
}

fn cast_for_column(entity: &EntityMetadata, column: &str) -> Option<&'static str> {
    entity.column_type(column).and_then(pg_cast_for)
}

fn identifier_column(entity: &EntityMetadata) -> String {
    entity
        .identifier_column()
        .unwrap_or_else(|| entity.identifier.first().cloned().unwrap_or_else(|| "id".into()))
}

/// SELECT by primary key (single column PK only).
pub fn select_by_id(entity: &EntityMetadata, id: &Value) -> QueryBuf {
    let pk = identifier_column(entity);
    let mut select = SqlQuery::select_all(entity);
    select.and_where(SqlCondition::Eq {
        cast: cast_for_column(entity, &pk).map(str::to_string),
        column: pk,
        value: id.clone(),
    });
    select.to_select(None, None)
}

/// INSERT, or INSERT ... ON CONFLICT (pk) DO UPDATE when the record carries an identifier.
/// Only properties present in the record are written; omitted columns keep their DB default.
pub fn upsert(entity: &EntityMetadata, record: &ModelRecord) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema, &entity.table);
    let pk = identifier_column(entity);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (column, property) in entity.selected_columns() {
        let Some(val) = record.get(&property) else { continue };
        if column == pk && val.is_null() {
            continue;
        }
        let n = q.push_param(val.clone());
        placeholders.push(placeholder(n, cast_for_column(entity, &column)));
        cols.push(column);
    }
    let returning = SqlQuery::select_all(entity).select_list();
    if cols.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning);
        return q;
    }
    let conflict = if cols.contains(&pk) {
        let updates: Vec<String> = cols
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", quoted(c), quoted(c)))
            .collect();
        format!(" ON CONFLICT ({}) DO UPDATE SET {}", quoted(&pk), updates.join(", "))
    } else {
        String::new()
    };
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){} RETURNING {}",
        table,
        cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", "),
        conflict,
        returning
    );
    q
}

/// DELETE by id.
pub fn delete_by_id(entity: &EntityMetadata, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema, &entity.table);
    let pk = identifier_column(entity);
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table,
        quoted(&pk),
        placeholder(n, cast_for_column(entity, &pk))
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMapping, RelationalSchemaProvider};
    use serde_json::json;

    fn category() -> std::sync::Arc<EntityMetadata> {
        let mapping: EntityMapping = serde_json::from_value(json!({
            "class": "App\\Entity\\Category",
            "fields": [
                { "field_name": "id", "type": "integer", "id": true },
                { "field_name": "name", "type": "string" },
                { "field_name": "rating", "type": "decimal" }
            ],
            "associations": [
                { "field_name": "parent", "target_entity": "App\\Entity\\Category", "type": 2 }
            ]
        }))
        .unwrap();
        RelationalSchemaProvider::new(&[mapping], "shop")
            .unwrap()
            .entity("App\\Entity\\Category")
            .unwrap()
    }

    #[test]
    fn select_page_with_order() {
        let mut query = SqlQuery::select_all(&category());
        query.order_by("id", SortDirection::Desc);
        let q = query.to_select(Some(15), Some(15));
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"rating\"::text AS \"rating\", \"parent_id\" FROM \"shop\".\"category\" ORDER BY \"category\".\"id\" DESC LIMIT 15 OFFSET 15"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn decimal_sort_orders_on_the_numeric_column() {
        let mut query = SqlQuery::select_all(&category());
        query.order_by("rating", SortDirection::Asc);
        let sql = query.to_select(None, None).sql;
        assert!(sql.contains("\"rating\"::text AS \"rating\""));
        assert!(sql.ends_with(" ORDER BY \"category\".\"rating\" ASC"), "{sql}");
    }

    #[test]
    fn filters_and_search_group_number_params_in_order() {
        let mut query = SqlQuery::select_all(&category());
        query.and_where(SqlCondition::IsNull { column: "parent_id".into() });
        query.or_search(SqlCondition::Eq {
            column: "id".into(),
            value: json!(7),
            cast: Some("numeric".into()),
        });
        query.or_search(SqlCondition::ILike {
            column: "name".into(),
            pattern: "%7%".into(),
        });
        let q = query.to_count();
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"shop\".\"category\" WHERE \"parent_id\" IS NULL AND (\"id\" = $1::numeric OR \"name\"::text ILIKE $2)"
        );
        assert_eq!(q.params, vec![json!(7), json!("%7%")]);
    }

    #[test]
    fn empty_search_group_matches_nothing() {
        let mut query = SqlQuery::select_all(&category());
        query.search = Some(Vec::new());
        assert!(query.to_count().sql.ends_with(" WHERE 1 = 0"));
    }

    #[test]
    fn upsert_with_and_without_identifier() {
        let meta = category();
        let new = ModelRecord::new("App\\Entity\\Category").with("name", "Books").with("parent", 3);
        let q = upsert(&meta, &new);
        assert!(q.sql.starts_with(
            "INSERT INTO \"shop\".\"category\" (\"name\", \"parent_id\") VALUES ($1::text, $2::int4) RETURNING"
        ));
        assert_eq!(q.params, vec![json!("Books"), json!(3)]);

        let existing = new.with("id", 9);
        let q = upsert(&meta, &existing);
        assert!(q.sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"id\" = EXCLUDED.\"id\""));
    }

    #[test]
    fn lookup_and_delete_by_id_cast_the_key() {
        let meta = category();
        let q = select_by_id(&meta, &json!(5));
        assert!(q.sql.ends_with("WHERE \"id\" = $1::int4"));
        let q = delete_by_id(&meta, &json!(5));
        assert_eq!(q.sql, "DELETE FROM \"shop\".\"category\" WHERE \"id\" = $1::int4");
        assert_eq!(q.params, vec![json!(5)]);
    }
}
