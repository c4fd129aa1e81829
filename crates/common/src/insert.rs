//! Contract of the external insert subsystem
//!
//! An [`InsertService`] takes an encoded image and publishes it to the network
//! asynchronously. Progress is reported through listeners, never through the
//! return value of [`InsertService::insert_image`]. Per image id the callbacks
//! arrive in the order `starting` → (`generating uri`)* → `finished` | `failed`,
//! and always after `insert_image` has returned.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;

/// Listener receiving an image id
pub type IdListener = Box<dyn Fn(&str) + Send + Sync>;

/// Listener receiving an image id and the generated address
pub type AddressListener = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Everything the insert subsystem needs to publish one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    /// ID of the image being inserted
    pub id: String,

    /// Encoded payload, already in `mime_type`'s format
    pub data: Bytes,

    /// MIME type announced to the network
    pub mime_type: String,

    /// Filename the payload is published under
    pub filename: String,
}

/// Service that inserts images into the network
pub trait InsertService: Send + Sync {
    /// Start inserting the given image; returns without waiting for the network
    fn insert_image(&self, request: InsertRequest);

    /// Notified when the insert of an image is started
    fn on_insert_starting(&self, listener: IdListener);

    /// Notified when the network generated the address of an image
    fn on_insert_generating_uri(&self, listener: AddressListener);

    /// Notified when the insert of an image finished successfully
    fn on_insert_finished(&self, listener: IdListener);

    /// Notified when the insert of an image failed
    fn on_insert_failed(&self, listener: IdListener);
}

type SharedIdListener = Arc<dyn Fn(&str) + Send + Sync>;
type SharedAddressListener = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Listener lists for the four insert callbacks
///
/// Meant to be embedded by [`InsertService`] implementations. Listeners are
/// invoked in registration order from a snapshot, so a listener may register
/// further listeners without deadlocking.
#[derive(Default)]
pub struct InsertListeners {
    starting: RwLock<Vec<SharedIdListener>>,
    generating_uri: RwLock<Vec<SharedAddressListener>>,
    finished: RwLock<Vec<SharedIdListener>>,
    failed: RwLock<Vec<SharedIdListener>>,
}

impl InsertListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_starting(&self, listener: IdListener) {
        self.starting.write().push(Arc::from(listener));
    }

    pub fn add_generating_uri(&self, listener: AddressListener) {
        self.generating_uri.write().push(Arc::from(listener));
    }

    pub fn add_finished(&self, listener: IdListener) {
        self.finished.write().push(Arc::from(listener));
    }

    pub fn add_failed(&self, listener: IdListener) {
        self.failed.write().push(Arc::from(listener));
    }

    pub fn notify_starting(&self, id: &str) {
        notify_all(&self.starting, id);
    }

    pub fn notify_generating_uri(&self, id: &str, address: &str) {
        let listeners = self.generating_uri.read().clone();
        for listener in listeners {
            listener(id, address);
        }
    }

    pub fn notify_finished(&self, id: &str) {
        notify_all(&self.finished, id);
    }

    pub fn notify_failed(&self, id: &str) {
        notify_all(&self.failed, id);
    }
}

fn notify_all(listeners: &RwLock<Vec<SharedIdListener>>, id: &str) {
    let listeners = listeners.read().clone();
    for listener in listeners {
        listener(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let listeners = InsertListeners::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let calls = Arc::clone(&calls);
            listeners.add_finished(Box::new(move |id: &str| calls.lock().push(format!("{}:{}", n, id))));
        }

        listeners.notify_finished("a");

        assert_eq!(*calls.lock(), vec!["0:a", "1:a", "2:a"]);
    }

    #[test]
    fn test_address_listener_receives_id_and_address() {
        let listeners = InsertListeners::new();
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        listeners.add_generating_uri(Box::new(move |id: &str, address: &str| {
            *sink.lock() = Some((id.to_string(), address.to_string()));
        }));

        listeners.notify_generating_uri("a", "CHK@xyz");

        assert_eq!(
            *seen.lock(),
            Some(("a".to_string(), "CHK@xyz".to_string()))
        );
    }

    #[test]
    fn test_callbacks_are_independent() {
        let listeners = InsertListeners::new();
        let failed = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&failed);
        listeners.add_failed(Box::new(move |_: &str| *counter.lock() += 1));

        listeners.notify_starting("a");
        listeners.notify_finished("a");
        assert_eq!(*failed.lock(), 0);

        listeners.notify_failed("a");
        assert_eq!(*failed.lock(), 1);
    }
}
