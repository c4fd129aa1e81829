//! Synchronous pub/sub for store events

use imgpost_common::ImageData;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// An image was added to the store, by upload or by clone
#[derive(Debug, Clone)]
pub struct ImageAdded {
    pub image: ImageData,
}

/// An image entered [`imgpost_common::ImageStatus::Inserting`]
#[derive(Debug, Clone)]
pub struct InsertRequested {
    pub image: ImageData,
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A named stream of events of one type
///
/// Listeners run on the publishing thread in subscription order. A panic in
/// one listener is logged and does not keep the others from running.
pub struct Subject<E> {
    name: &'static str,
    listeners: RwLock<Vec<Listener<E>>>,
}

impl<E> Subject<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn publish(&self, event: &E) {
        // Snapshot so listeners may subscribe further listeners
        let listeners = self.listeners.read().clone();

        for (index, listener) in listeners.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    "Listener {} on {} panicked: {}",
                    index,
                    self.name,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// The store's two event streams
pub struct ListenerRegistry {
    pub image_added: Subject<ImageAdded>,
    pub insert_requested: Subject<InsertRequested>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            image_added: Subject::new("image added"),
            insert_requested: Subject::new("insert requested"),
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
