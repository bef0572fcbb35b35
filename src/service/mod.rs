//! Backend data services: lookup, paginated list/search and flushing a caller's unit of work.

mod document;
mod relational;

pub use document::{DocumentDataService, DocumentQueryAdapter};
pub use relational::{RelationalDataService, SqlQueryAdapter};

use crate::config::{SearchableField, DEFAULT_MAX_RESULTS};
use crate::error::AppError;
use crate::metadata::Backend;
use crate::pagination::Paginator;
use crate::query::SortDirection;
use crate::record::ModelRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Which page to read and how to order it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    pub page: u64,
    pub page_size: u64,
    pub sort_field: Option<String>,
    pub sort_direction: SortDirection,
}

impl Default for QuerySpec {
    fn default() -> Self {
        QuerySpec {
            page: 1,
            page_size: DEFAULT_MAX_RESULTS,
            sort_field: None,
            sort_direction: SortDirection::Desc,
        }
    }
}

impl QuerySpec {
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = direction;
        self
    }

    pub(crate) fn paginate(&self, mut paginator: Paginator) -> Result<Paginator, AppError> {
        paginator.set_max_per_page(self.page_size)?.set_current_page(self.page)?;
        Ok(paginator)
    }
}

#[derive(Clone, Debug)]
pub(crate) enum PendingOp {
    Persist(ModelRecord),
    Remove(ModelRecord),
}

impl PendingOp {
    pub(crate) fn record(&self) -> &ModelRecord {
        match self {
            PendingOp::Persist(record) | PendingOp::Remove(record) => record,
        }
    }
}

/// Changes queued by one caller, applied by `flush`. Owned by the request that builds it,
/// so nothing queued here is visible to, or flushed by, anyone else.
///
/// A failed flush leaves the ops it did not apply queued: all of a backend's ops when the
/// relational transaction rolls back, the failed op and those after it on the document side.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pending: Vec<(Backend, PendingOp)>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Records queued for one backend, in order, with whether each is a removal.
    pub fn queued(&self, backend: Backend) -> Vec<(&ModelRecord, bool)> {
        self.pending
            .iter()
            .filter(|(b, _)| *b == backend)
            .map(|(_, op)| (op.record(), matches!(op, PendingOp::Remove(_))))
            .collect()
    }

    pub(crate) fn push(&mut self, backend: Backend, op: PendingOp) {
        self.pending.push((backend, op));
    }

    /// Drain one backend's ops, keeping their relative order.
    pub(crate) fn take(&mut self, backend: Backend) -> Vec<PendingOp> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(b, _)| *b == backend);
        self.pending = rest;
        taken.into_iter().map(|(_, op)| op).collect()
    }

    /// Put back ops that were taken but not applied, ahead of anything queued since.
    pub(crate) fn restore(&mut self, backend: Backend, ops: Vec<PendingOp>) {
        let mut pending: Vec<_> = ops.into_iter().map(|op| (backend, op)).collect();
        pending.append(&mut self.pending);
        self.pending = pending;
    }
}

#[async_trait]
pub trait DataService: Send + Sync {
    fn backend(&self) -> Backend;

    /// Primary-key lookup.
    async fn find_one(&self, class: &str, id: &Value) -> Result<Option<ModelRecord>, AppError>;

    async fn find_all(&self, class: &str, spec: &QuerySpec) -> Result<Paginator, AppError>;

    async fn find_by(
        &self,
        class: &str,
        search_query: &str,
        fields: &[SearchableField],
        spec: &QuerySpec,
    ) -> Result<Paginator, AppError>;

    /// Queue an insert or update in `uow` until it is flushed.
    fn persist(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError>;

    /// Queue a delete in `uow` until it is flushed.
    fn remove(&self, uow: &mut UnitOfWork, record: &ModelRecord) -> Result<(), AppError>;

    /// Apply this backend's ops queued in `uow`; returns the stored state of each persisted
    /// record, in order.
    async fn flush(&self, uow: &mut UnitOfWork) -> Result<Vec<ModelRecord>, AppError>;

    /// Store one record through a unit of work of its own.
    async fn persist_and_flush(&self, record: &ModelRecord) -> Result<ModelRecord, AppError> {
        let mut uow = UnitOfWork::new();
        self.persist(&mut uow, record)?;
        let mut stored = self.flush(&mut uow).await?;
        Ok(stored.pop().unwrap_or_else(|| record.clone()))
    }
}
