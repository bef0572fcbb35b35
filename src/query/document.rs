//! Document-store queries: a filter tree evaluated against JSON documents, plus a sort.

use super::{is_exact_match_field, parse_numeric, SortDirection};
use crate::config::SearchableField;
use crate::error::AppError;
use crate::metadata::DocumentMetadata;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Clone, Debug)]
pub enum Filter {
    All,
    Eq { field: String, value: Value },
    /// Matches string values (and the text form of numbers).
    Regex { field: String, pattern: Regex },
    In { field: String, values: Vec<Value> },
    IsNull { field: String },
    And(Vec<Filter>),
    /// An empty `Or` matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    /// Case-insensitive substring match on `field`.
    pub fn contains(field: impl Into<String>, text: &str) -> Result<Filter, AppError> {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(text)))
            .map_err(|e| AppError::BadRequest(format!("invalid search text: {}", e)))?;
        Ok(Filter::Regex { field: field.into(), pattern })
    }

    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => any_value(doc.get(field), |v| values_equal(v, value)),
            Filter::Regex { field, pattern } => any_value(doc.get(field), |v| match v {
                Value::String(s) => pattern.is_match(s),
                Value::Number(n) => pattern.is_match(&n.to_string()),
                _ => false,
            }),
            Filter::In { field, values } => {
                any_value(doc.get(field), |v| values.iter().any(|c| values_equal(v, c)))
            }
            Filter::IsNull { field } => doc.get(field).map_or(true, Value::is_null),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Array values match when any element does.
fn any_value(value: Option<&Value>, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Some(Value::Array(items)) => items.iter().any(&pred),
        Some(v) => pred(v),
        None => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null, numbers, strings, objects, arrays, booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[derive(Clone, Debug)]
pub struct DocumentQuery {
    pub class: String,
    pub collection: String,
    /// AND-combined.
    pub filters: Vec<Filter>,
    /// OR-combined search group; `Some(empty)` matches nothing.
    pub search: Option<Vec<Filter>>,
    pub sort: Option<(String, SortDirection)>,
}

impl DocumentQuery {
    pub fn all(metadata: &DocumentMetadata) -> Self {
        DocumentQuery {
            class: metadata.name.clone(),
            collection: metadata.collection.clone(),
            filters: Vec::new(),
            search: None,
            sort: None,
        }
    }

    pub fn and_where(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn or_search(&mut self, filter: Filter) -> &mut Self {
        self.search.get_or_insert_with(Vec::new).push(filter);
        self
    }

    pub fn sort_by(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.sort = Some((field.into(), direction));
        self
    }

    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
            && self
                .search
                .as_ref()
                .map_or(true, |group| group.iter().any(|f| f.matches(doc)))
    }

    /// Ordering of two documents under this query's sort; equal when unsorted.
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        let Some((field, direction)) = &self.sort else {
            return Ordering::Equal;
        };
        let ord = compare_values(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        );
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

pub(super) fn list_query(
    metadata: &DocumentMetadata,
    sort_field: Option<&str>,
    sort_direction: SortDirection,
) -> Result<DocumentQuery, AppError> {
    let mut query = DocumentQuery::all(metadata);
    if let Some(field) = sort_field {
        if !metadata.is_stored_property(field) {
            return Err(AppError::BadRequest(format!(
                "cannot sort {} by '{}'",
                metadata.name, field
            )));
        }
        query.sort_by(field, sort_direction);
    }
    Ok(query)
}

pub(super) fn search_query(
    metadata: &DocumentMetadata,
    search_text: &str,
    fields: &[SearchableField],
    sort_field: Option<&str>,
    sort_direction: SortDirection,
) -> Result<DocumentQuery, AppError> {
    let mut query = list_query(metadata, sort_field, sort_direction)?;
    let text = search_text.trim();
    let numeric = parse_numeric(text);
    query.search = Some(Vec::new());

    for field in fields {
        let filter = match &numeric {
            Some(value) if is_exact_match_field(field) => Filter::Eq {
                field: field.name.clone(),
                value: value.clone(),
            },
            _ if field.is_text() => Filter::contains(&field.name, text)?,
            _ => Filter::In {
                field: field.name.clone(),
                values: text.split_whitespace().map(|t| Value::String(t.to_string())).collect(),
            },
        };
        query.or_search(filter);
    }
    Ok(query)
}
