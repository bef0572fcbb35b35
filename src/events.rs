//! Lifecycle events emitted by the facade and the data services.
//!
//! One listener may be attached at a time. Query-builder events hand the listener a mutable
//! query so it can add conditions before execution.

use crate::config::SearchableField;
use crate::query::{BuiltQuery, SortDirection};
use crate::record::ModelRecord;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdminEvent {
    PreList,
    PostList,
    PreSearch,
    PostSearch,
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
    PostListQueryBuilder,
    PostSearchQueryBuilder,
}

impl AdminEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AdminEvent::PreList => "backoffice.pre_list",
            AdminEvent::PostList => "backoffice.post_list",
            AdminEvent::PreSearch => "backoffice.pre_search",
            AdminEvent::PostSearch => "backoffice.post_search",
            AdminEvent::PrePersist => "backoffice.pre_persist",
            AdminEvent::PostPersist => "backoffice.post_persist",
            AdminEvent::PreUpdate => "backoffice.pre_update",
            AdminEvent::PostUpdate => "backoffice.post_update",
            AdminEvent::PreRemove => "backoffice.pre_remove",
            AdminEvent::PostRemove => "backoffice.post_remove",
            AdminEvent::PostListQueryBuilder => "backoffice.post_list_query_builder",
            AdminEvent::PostSearchQueryBuilder => "backoffice.post_search_query_builder",
        }
    }
}

impl fmt::Display for AdminEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub enum EventPayload<'a> {
    Class {
        class: &'a str,
    },
    Record {
        record: &'a ModelRecord,
    },
    PropertyUpdate {
        record: &'a ModelRecord,
        property: &'a str,
        new_value: &'a Value,
    },
    ListQuery {
        query: &'a mut BuiltQuery,
        sort_field: Option<&'a str>,
        sort_direction: SortDirection,
    },
    SearchQuery {
        query: &'a mut BuiltQuery,
        search_query: &'a str,
        searchable_fields: &'a [SearchableField],
        sort_field: Option<&'a str>,
        sort_direction: SortDirection,
    },
}

impl EventPayload<'_> {
    pub fn class(&self) -> &str {
        match self {
            EventPayload::Class { class } => *class,
            EventPayload::Record { record } | EventPayload::PropertyUpdate { record, .. } => record.class.as_str(),
            EventPayload::ListQuery { query, .. } | EventPayload::SearchQuery { query, .. } => query.class(),
        }
    }

    /// The query under construction, for the query-builder events.
    pub fn query_mut(&mut self) -> Option<&mut BuiltQuery> {
        match self {
            EventPayload::ListQuery { query, .. } | EventPayload::SearchQuery { query, .. } => Some(&mut **query),
            _ => None,
        }
    }
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: AdminEvent, payload: &mut EventPayload<'_>);
}

/// Shared slot for the listener; clones see the same listener.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listener: Arc<RwLock<Option<Arc<dyn EventListener>>>>,
}

impl EventDispatcher {
    pub fn set_listener(&self, listener: Arc<dyn EventListener>) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = Some(listener);
        }
    }

    pub fn clear_listener(&self) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = None;
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// No-op without a listener.
    pub fn dispatch(&self, event: AdminEvent, payload: &mut EventPayload<'_>) {
        let listener = match self.listener.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(listener) = listener {
            tracing::trace!(event = %event, class = %payload.class(), "dispatch");
            listener.on_event(event, payload);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl EventListener for Recorder {
        fn on_event(&self, event: AdminEvent, payload: &mut EventPayload<'_>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{} {}", event, payload.class()));
        }
    }

    #[test]
    fn dispatch_without_listener_is_noop() {
        let d = EventDispatcher::default();
        d.dispatch(AdminEvent::PreList, &mut EventPayload::Class { class: "A" });
        assert!(!d.has_listener());
    }

    #[test]
    fn clones_share_the_listener() {
        let d = EventDispatcher::default();
        let other = d.clone();
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        d.set_listener(rec.clone());
        other.dispatch(AdminEvent::PostPersist, &mut EventPayload::Class { class: "App\\Entity\\Tag" });
        assert_eq!(*rec.0.lock().unwrap(), vec!["backoffice.post_persist App\\Entity\\Tag"]);
        other.clear_listener();
        assert!(!d.has_listener());
    }
}
