//! Applying update requests to stored images

use imgpost_common::{ImageMetadata, ImageUpdate};
use tracing::debug;

use crate::ImageStore;

/// Result of [`ImageStore::apply_update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No image with the given ID
    NotFound,
    /// Nothing in the request could be applied
    Unchanged,
    /// The image itself was changed; carries its new metadata
    Updated(ImageMetadata),
    /// A new image was derived; carries the new image's metadata
    Cloned(ImageMetadata),
    /// The requested clone could not be created
    Rejected,
}

impl ImageStore {
    /// Apply an update request to one image.
    ///
    /// A new filename is applied first, so a clone requested in the same
    /// update inherits it. A request carrying a MIME type or dimensions derives
    /// a new image and ignores `status`; otherwise a recognized status token
    /// is applied as a transition.
    pub fn apply_update(&self, id: &str, update: &ImageUpdate) -> UpdateOutcome {
        if self.get_image(id).is_none() {
            return UpdateOutcome::NotFound;
        }

        if update.is_empty() {
            debug!("Empty update for {}", id);
            return UpdateOutcome::Unchanged;
        }

        let mut changed = false;

        if let Some(filename) = &update.filename {
            changed |= self.set_filename(id, filename);
        }

        if update.requests_clone() {
            return match self.clone_image(
                id,
                update.mime_type.as_deref(),
                update.width,
                update.height,
            ) {
                Some(metadata) => UpdateOutcome::Cloned(metadata),
                None => {
                    debug!("Update of {} requested a clone that failed", id);
                    UpdateOutcome::Rejected
                }
            };
        }

        if let Some(status) = update.status() {
            changed |= self.set_status(id, status);
        }

        match self.get_image(id) {
            Some(metadata) if changed => UpdateOutcome::Updated(metadata),
            Some(_) => UpdateOutcome::Unchanged,
            // Removed concurrently
            None => UpdateOutcome::NotFound,
        }
    }
}
