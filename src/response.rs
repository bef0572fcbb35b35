//! Standard response envelope helpers.

use crate::pagination::Page;
use crate::record::ModelRecord;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_count: u64,
    pub current_page: u64,
    pub page_size: u64,
    pub last_page: u64,
}

/// A single record, as its property map.
pub fn success_one(record: ModelRecord) -> (StatusCode, Json<SuccessOne<Map<String, Value>>>) {
    (StatusCode::OK, Json(SuccessOne { data: record.fields }))
}

pub fn success_created(record: ModelRecord) -> (StatusCode, Json<SuccessOne<Map<String, Value>>>) {
    (StatusCode::CREATED, Json(SuccessOne { data: record.fields }))
}

pub fn success_page(page: Page<ModelRecord>) -> (StatusCode, Json<SuccessMany<Map<String, Value>>>) {
    let meta = PageMeta {
        total_count: page.total_count,
        current_page: page.current_page,
        page_size: page.page_size,
        last_page: page.last_page,
    };
    (
        StatusCode::OK,
        Json(SuccessMany {
            data: page.items.into_iter().map(|r| r.fields).collect(),
            meta,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_envelope_carries_pagination_meta() {
        let page = Page {
            items: vec![ModelRecord::new("App\\Entity\\Tag").with("id", 3)],
            total_count: 31,
            current_page: 3,
            page_size: 15,
            last_page: 3,
        };
        let (status, Json(body)) = success_page(page);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "data": [{ "id": 3 }],
                "meta": { "totalCount": 31, "currentPage": 3, "pageSize": 15, "lastPage": 3 }
            })
        );
    }
}
