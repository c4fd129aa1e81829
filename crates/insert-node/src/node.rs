//! Simulated insert node for development and testing
//!
//! Behaves like a content-addressed network: payloads are published under
//! `CHK@<sha-256>/<filename>` after a configurable delay, and fail at a
//! configurable rate.

use imgpost_common::{AddressListener, IdListener, InsertListeners, InsertRequest, InsertService};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::Config;

/// Tunables of the simulated network
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    /// Delay before `starting` and again before the final callback
    pub latency: Duration,

    /// Probability in [0, 1] of reporting `failed`
    pub failure_rate: f64,

    /// Payloads above this size fail right after `starting`
    pub max_insert_bytes: usize,
}

impl From<&Config> for NodeSettings {
    fn from(config: &Config) -> Self {
        Self {
            latency: config.insert_latency(),
            failure_rate: config.failure_rate,
            max_insert_bytes: config.max_insert_bytes,
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings::from(&Config::default())
    }
}

/// Insert service backed by tasks on a tokio runtime
pub struct SimulatedNode {
    runtime: Handle,
    settings: NodeSettings,
    listeners: Arc<InsertListeners>,
}

impl SimulatedNode {
    pub fn new(runtime: Handle, settings: NodeSettings) -> Self {
        Self {
            runtime,
            settings,
            listeners: Arc::new(InsertListeners::new()),
        }
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }
}

/// Content address of a payload published under `filename`
pub fn content_address(data: &[u8], filename: &str) -> String {
    format!("CHK@{}/{}", hex::encode(Sha256::digest(data)), filename)
}

impl InsertService for SimulatedNode {
    fn insert_image(&self, request: InsertRequest) {
        let listeners = Arc::clone(&self.listeners);
        let settings = self.settings.clone();

        debug!(
            "Simulated node: queued {} ({} bytes)",
            request.id,
            request.data.len()
        );

        self.runtime.spawn(async move {
            let InsertRequest {
                id,
                data,
                mime_type,
                filename,
            } = request;

            sleep(settings.latency).await;
            listeners.notify_starting(&id);

            if data.len() > settings.max_insert_bytes {
                warn!(
                    "Simulated node: {} is {} bytes, limit is {}",
                    id,
                    data.len(),
                    settings.max_insert_bytes
                );
                listeners.notify_failed(&id);
                return;
            }

            let address = content_address(&data, &filename);
            debug!("Simulated node: {} ({}) -> {}", id, mime_type, address);
            listeners.notify_generating_uri(&id, &address);

            sleep(settings.latency).await;

            let failed = rand::thread_rng().gen_bool(settings.failure_rate.clamp(0.0, 1.0));
            if failed {
                info!("Simulated node: insert of {} failed", id);
                listeners.notify_failed(&id);
            } else {
                info!("Simulated node: inserted {} at {}", id, address);
                listeners.notify_finished(&id);
            }
        });
    }

    fn on_insert_starting(&self, listener: IdListener) {
        self.listeners.add_starting(listener);
    }

    fn on_insert_generating_uri(&self, listener: AddressListener) {
        self.listeners.add_generating_uri(listener);
    }

    fn on_insert_finished(&self, listener: IdListener) {
        self.listeners.add_finished(listener);
    }

    fn on_insert_failed(&self, listener: IdListener) {
        self.listeners.add_failed(listener);
    }
}
