//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Static misconfiguration detected while building the admin configuration. Never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the '{class}' element isn't valid because it contains a composite primary key ({fields:?})")]
    CompositeKey { class: String, fields: Vec<String> },
    #[error("{class} has no single primary key field defined")]
    MissingIdentifier { class: String },
    #[error("association metadata type unknown for {class}.{field}: {code}")]
    UnknownCardinality {
        class: String,
        field: String,
        code: String,
    },
    #[error("the following element has not been registered by any data manager: {0}")]
    UnmanagedClass(String),
    #[error("no entities or documents configured")]
    NoModelsConfigured,
    #[error("duplicate model name: {0}")]
    DuplicateModelName(String),
    #[error("model '{model}' is declared as {declared} but {class} is managed by the {actual} backend")]
    BackendMismatch {
        model: String,
        class: String,
        declared: &'static str,
        actual: &'static str,
    },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("the following element has not been registered by any data manager: {0}")]
    UnmanagedClass(String),
    #[error("the \"{class}\" element with \"{id_field} = {id}\" does not exist")]
    RecordNotFound {
        class: String,
        id_field: String,
        id: String,
    },
    #[error("the \"{property}\" property of the \"{class}\" element is not writable")]
    UnwritableProperty { class: String, property: String },
    #[error("page {page} is out of range (last page is {last_page})")]
    PageOutOfRange { page: u64, last_page: u64 },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("document store: {0}")]
    Store(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::UnmanagedClass(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RecordNotFound { .. } | AppError::PageOutOfRange { .. } => StatusCode::NOT_FOUND,
            AppError::UnwritableProperty { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::UnmanagedClass(_) => "unmanaged_class",
            AppError::RecordNotFound { .. } => "not_found",
            AppError::UnwritableProperty { .. } => "unwritable_property",
            AppError::PageOutOfRange { .. } => "page_out_of_range",
            AppError::BadRequest(_) => "bad_request",
            AppError::Db(sqlx::Error::RowNotFound) => "not_found",
            AppError::Db(_) => "database_error",
            AppError::Store(_) => "store_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            AppError::PageOutOfRange { page, last_page } => {
                Some(serde_json::json!({ "page": page, "lastPage": last_page }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_map_to_client_statuses() {
        let not_found = AppError::RecordNotFound {
            class: "App\\Entity\\Category".into(),
            id_field: "id".into(),
            id: "7".into(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        let unwritable = AppError::UnwritableProperty {
            class: "App\\Entity\\Category".into(),
            property: "id".into(),
        };
        assert_eq!(unwritable.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnmanagedClass("Nope".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn composite_key_message_names_the_class() {
        let err = ConfigError::CompositeKey {
            class: "App\\Entity\\OrderLine".into(),
            fields: vec!["order".into(), "line".into()],
        };
        assert!(err.to_string().contains("App\\Entity\\OrderLine"));
        assert!(err.to_string().contains("composite primary key"));
    }
}
