//! Entity change notification.
//!
//! # Responsibility
//! - Define the listener capability notified after successful mutations.
//! - Hold registered listeners and fan out notifications.
//!
//! # Invariants
//! - Listeners only hear about mutations that reached the store.
//! - Delivery follows registration order.
//! - Registration during delivery affects the next notification only.

use crate::model::persistable::Persistable;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, PoisonError};

/// Snapshot of one persisted (or just removed) document.
#[derive(Debug, Clone, Copy)]
pub struct EntityChange<'a> {
    pub collection: &'static str,
    pub id: &'a str,
    pub document: &'a JsonValue,
}

impl EntityChange<'_> {
    /// Whether this change concerns entities of `T`.
    pub fn is<T: Persistable>(&self) -> bool {
        self.collection == T::COLLECTION
    }

    /// Decodes the document as `T` when the collection matches.
    pub fn decode<T: Persistable>(&self) -> Option<T> {
        if !self.is::<T>() {
            return None;
        }
        serde_json::from_value(self.document.clone()).ok()
    }
}

/// Receives save/delete notifications from a repository.
pub trait EntityChangeListener: Send + Sync {
    fn item_saved(&self, change: &EntityChange<'_>, is_new: bool);
    fn item_deleted(&self, change: &EntityChange<'_>);
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn EntityChangeListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EntityChangeListener>) {
        self.lock().push(listener);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn fire_item_saved(&self, change: &EntityChange<'_>, is_new: bool) {
        for listener in self.snapshot() {
            listener.item_saved(change, is_new);
        }
    }

    pub fn fire_item_deleted(&self, change: &EntityChange<'_>) {
        for listener in self.snapshot() {
            listener.item_deleted(change);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn EntityChangeListener>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn EntityChangeListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityChange, EntityChangeListener, ListenerRegistry};
    use crate::model::book::Book;
    use crate::model::user::User;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EntityChangeListener for Recorder {
        fn item_saved(&self, change: &EntityChange<'_>, is_new: bool) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:saved:{}:{}", self.tag, change.id, is_new));
        }

        fn item_deleted(&self, change: &EntityChange<'_>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:deleted:{}", self.tag, change.id));
        }
    }

    #[test]
    fn notifications_follow_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.add(Arc::new(Recorder {
            tag: "first",
            log: log.clone(),
        }));
        registry.add(Arc::new(Recorder {
            tag: "second",
            log: log.clone(),
        }));
        assert_eq!(registry.len(), 2);

        let document = json!({"_id": "b-1"});
        let change = EntityChange {
            collection: "books",
            id: "b-1",
            document: &document,
        };
        registry.fire_item_saved(&change, true);
        registry.fire_item_deleted(&change);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:saved:b-1:true",
                "second:saved:b-1:true",
                "first:deleted:b-1",
                "second:deleted:b-1",
            ]
        );
    }

    #[test]
    fn decode_checks_collection() {
        let document = json!({
            "_id": "b-1",
            "title": "Dune",
            "author": "Frank Herbert",
            "isbn": "9780441013593",
            "total_copies": 1,
            "available_copies": 1
        });
        let change = EntityChange {
            collection: "books",
            id: "b-1",
            document: &document,
        };
        let book = change.decode::<Book>().expect("book document should decode");
        assert_eq!(book.title, "Dune");
        assert!(change.decode::<User>().is_none());
    }
}
