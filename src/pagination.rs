//! Lazy pagination over a backend query: a count plus one sliced fetch per page.

use crate::config::DEFAULT_MAX_RESULTS;
use crate::error::AppError;
use crate::record::ModelRecord;
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait PaginationAdapter: Send + Sync {
    async fn nb_results(&self) -> Result<u64, AppError>;

    async fn slice(&self, offset: u64, length: u64) -> Result<Vec<ModelRecord>, AppError>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u64,
    pub page_size: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// Last page number for a result count; an empty result still has one page.
pub fn last_page(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}

pub struct Paginator {
    adapter: Box<dyn PaginationAdapter>,
    max_per_page: u64,
    current_page: u64,
}

impl Paginator {
    pub fn new(adapter: impl PaginationAdapter + 'static) -> Self {
        Paginator {
            adapter: Box::new(adapter),
            max_per_page: DEFAULT_MAX_RESULTS,
            current_page: 1,
        }
    }

    pub fn set_max_per_page(&mut self, max_per_page: u64) -> Result<&mut Self, AppError> {
        if max_per_page == 0 {
            return Err(AppError::BadRequest("page size must be at least 1".into()));
        }
        self.max_per_page = max_per_page;
        Ok(self)
    }

    pub fn set_current_page(&mut self, page: u64) -> Result<&mut Self, AppError> {
        if page == 0 {
            return Err(AppError::BadRequest("page numbers start at 1".into()));
        }
        self.current_page = page;
        Ok(self)
    }

    pub fn max_per_page(&self) -> u64 {
        self.max_per_page
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub async fn nb_results(&self) -> Result<u64, AppError> {
        self.adapter.nb_results().await
    }

    /// Count, range-check the current page, then fetch its slice.
    pub async fn fetch(&self) -> Result<Page<ModelRecord>, AppError> {
        let total = self.adapter.nb_results().await?;
        let last = last_page(total, self.max_per_page);
        if self.current_page > last {
            return Err(AppError::PageOutOfRange {
                page: self.current_page,
                last_page: last,
            });
        }
        let offset = (self.current_page - 1) * self.max_per_page;
        let items = if total == 0 {
            Vec::new()
        } else {
            self.adapter.slice(offset, self.max_per_page).await?
        };
        Ok(Page {
            items,
            total_count: total,
            current_page: self.current_page,
            page_size: self.max_per_page,
            last_page: last,
        })
    }
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("max_per_page", &self.max_per_page)
            .field("current_page", &self.current_page)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Numbers(u64);

    #[async_trait]
    impl PaginationAdapter for Numbers {
        async fn nb_results(&self) -> Result<u64, AppError> {
            Ok(self.0)
        }

        async fn slice(&self, offset: u64, length: u64) -> Result<Vec<ModelRecord>, AppError> {
            Ok((offset..(offset + length).min(self.0))
                .map(|n| ModelRecord::new("N").with("n", n))
                .collect())
        }
    }

    #[test]
    fn last_page_rounds_up() {
        assert_eq!(last_page(0, 15), 1);
        assert_eq!(last_page(15, 15), 1);
        assert_eq!(last_page(16, 15), 2);
        assert_eq!(last_page(200, 15), 14);
    }

    #[tokio::test]
    async fn second_page_slices_from_offset() {
        let mut p = Paginator::new(Numbers(200));
        p.set_current_page(2).unwrap();
        let page = p.fetch().await.unwrap();
        assert_eq!(page.items.len(), 15);
        assert_eq!(page.items[0].get("n"), Some(&serde_json::json!(15)));
        assert_eq!(page.total_count, 200);
        assert_eq!(page.last_page, 14);
        assert!(page.has_previous() && page.has_next());
    }

    #[tokio::test]
    async fn final_partial_page_and_out_of_range() {
        let mut p = Paginator::new(Numbers(200));
        p.set_current_page(14).unwrap();
        assert_eq!(p.fetch().await.unwrap().items.len(), 5);
        p.set_current_page(15).unwrap();
        let err = p.fetch().await.unwrap_err();
        assert!(matches!(err, AppError::PageOutOfRange { page: 15, last_page: 14 }));
    }

    #[tokio::test]
    async fn empty_result_has_one_empty_page() {
        let page = Paginator::new(Numbers(0)).fetch().await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.last_page, 1);
        assert!(Paginator::new(Numbers(0)).set_max_per_page(0).is_err());
    }
}
