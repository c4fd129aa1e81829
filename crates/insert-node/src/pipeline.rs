//! Batch runner: ingest files, derive copies, insert and wait

use anyhow::{Context, Result};
use image_store::{ImageStore, InsertCoordinator, UpdateOutcome};
use imgpost_common::{ImageJson, ImageStatus, ImageUpdate, InsertService};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::node::{NodeSettings, SimulatedNode};
use crate::Config;

/// What to do with every file of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Filename to set before inserting
    pub filename: Option<String>,

    /// Re-encode to this MIME type
    pub mime_type: Option<String>,

    /// Scale to this width
    pub width: Option<u32>,

    /// Scale to this height
    pub height: Option<u32>,

    /// Whether to insert at all
    pub insert: bool,
}

impl BatchOptions {
    fn update(&self) -> ImageUpdate {
        ImageUpdate {
            status: None,
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Outcome for one input file
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    /// Input path
    pub file: String,

    /// Final state of the image that was (or would have been) inserted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageJson>,

    /// Why the file was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    fn image(file: &Path, image: ImageJson) -> Self {
        Self {
            file: file.display().to_string(),
            image: Some(image),
            error: None,
        }
    }

    fn skipped(file: &Path, error: impl Into<String>) -> Self {
        Self {
            file: file.display().to_string(),
            image: None,
            error: Some(error.into()),
        }
    }
}

/// A store wired to a simulated insert node
pub struct Pipeline {
    store: Arc<ImageStore>,
    node: Arc<SimulatedNode>,
    _coordinator: Arc<InsertCoordinator>,
    timeout: Duration,
    poll_interval: Duration,
}

impl Pipeline {
    pub fn new(config: &Config, runtime: Handle) -> Self {
        let store = Arc::new(ImageStore::new());
        let node = Arc::new(SimulatedNode::new(runtime, NodeSettings::from(config)));
        let coordinator =
            InsertCoordinator::wire(&store, Arc::clone(&node) as Arc<dyn InsertService>);

        Self {
            store,
            node,
            _coordinator: coordinator,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    pub fn node(&self) -> &Arc<SimulatedNode> {
        &self.node
    }

    /// Run a batch over `files`, in order
    ///
    /// Files that are not images, or whose requested copy cannot be made, are
    /// reported as skipped. Unreadable files abort the batch.
    pub async fn run(&self, files: &[PathBuf], options: &BatchOptions) -> Result<Vec<BatchEntry>> {
        let update = options.update();
        let mut prepared = Vec::with_capacity(files.len());

        for file in files {
            let data = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let outcome = self.prepare(&data, &update);
            match &outcome {
                Ok(id) => {
                    if options.insert && !self.store.set_status(id, ImageStatus::Inserting) {
                        warn!("Could not start insert of {}", id);
                    }
                }
                Err(reason) => warn!("Skipping {}: {}", file.display(), reason),
            }
            prepared.push((file, outcome));
        }

        if options.insert {
            let ids: Vec<String> = prepared
                .iter()
                .filter_map(|(_, outcome)| outcome.as_ref().ok().cloned())
                .collect();
            self.wait_until_settled(&ids).await;
        }

        Ok(prepared
            .into_iter()
            .map(|(file, outcome)| match outcome {
                Ok(id) => match self.store.get_image(&id) {
                    Some(metadata) => BatchEntry::image(file, metadata.to_json()),
                    None => BatchEntry::skipped(file, "image was removed"),
                },
                Err(reason) => BatchEntry::skipped(file, reason),
            })
            .collect())
    }

    /// Store one payload and apply the batch update; returns the ID to insert
    fn prepare(&self, data: &[u8], update: &ImageUpdate) -> std::result::Result<String, String> {
        let metadata = self
            .store
            .add_image(data)
            .ok_or_else(|| "not a supported image".to_string())?;

        match self.store.apply_update(&metadata.id, update) {
            UpdateOutcome::Cloned(clone) => {
                debug!("Derived {} from {}", clone.id, metadata.id);
                Ok(clone.id)
            }
            UpdateOutcome::Updated(_) | UpdateOutcome::Unchanged => Ok(metadata.id),
            UpdateOutcome::Rejected => Err("requested conversion failed".to_string()),
            UpdateOutcome::NotFound => Err("image was removed".to_string()),
        }
    }

    /// Poll until every image has settled or the timeout passes
    pub async fn wait_until_settled(&self, ids: &[String]) -> bool {
        let deadline = Instant::now() + self.timeout;

        loop {
            let pending = ids
                .iter()
                .filter(|id| {
                    self.store
                        .get_image(id)
                        .is_some_and(|metadata| !metadata.status.is_settled())
                })
                .count();

            if pending == 0 {
                info!("All {} inserts settled", ids.len());
                return true;
            }

            if Instant::now() >= deadline {
                warn!(
                    "{} of {} inserts still pending after {:?}",
                    pending,
                    ids.len(),
                    self.timeout
                );
                return false;
            }

            debug!("Waiting for {} inserts", pending);
            sleep(self.poll_interval).await;
        }
    }
}
