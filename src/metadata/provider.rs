//! Schema providers: the explicit registry of which backend knows which class.

use crate::metadata::{Backend, ClassMetadataWrapper};
use std::sync::Arc;

/// A persistence backend's schema registry. `metadata_for` returns `None` for classes the
/// backend does not manage; the facade probes providers in order on that answer.
pub trait SchemaProvider: Send + Sync {
    fn backend(&self) -> Backend;

    fn metadata_for(&self, class: &str) -> Option<Arc<dyn ClassMetadataWrapper>>;

    /// Fully qualified names of every managed class.
    fn classes(&self) -> Vec<String>;

    fn manages(&self, class: &str) -> bool {
        self.metadata_for(class).is_some()
    }
}
