//! Glue between the store and the insert subsystem
//!
//! Images entering `Inserting` are handed to the [`InsertService`]; the
//! service's callbacks are turned back into store updates.

use imgpost_common::{ImageData, ImageStatus, InsertRequest, InsertService};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use crate::codec::Format;
use crate::listeners::InsertRequested;
use crate::ImageStore;

const FALLBACK_STEM: &str = "image";

/// Routes insert requests to an [`InsertService`] and its progress back into
/// an [`ImageStore`]
///
/// Holds the store weakly; once the store is dropped, dispatches and
/// callbacks are ignored.
pub struct InsertCoordinator {
    store: Weak<ImageStore>,
    insert_service: Arc<dyn InsertService>,
}

impl InsertCoordinator {
    /// Connect `store` and `insert_service` in both directions
    pub fn wire(store: &Arc<ImageStore>, insert_service: Arc<dyn InsertService>) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            store: Arc::downgrade(store),
            insert_service,
        });

        let dispatcher = Arc::clone(&coordinator);
        store.on_insert_requested(move |event: &InsertRequested| dispatcher.dispatch(&event.image));

        let service = &coordinator.insert_service;

        let weak = Arc::downgrade(store);
        service.on_insert_starting(Box::new(move |id: &str| {
            debug!("Insert of {} starting", id);
            with_store(&weak, |store| store.set_status(id, ImageStatus::Inserting));
        }));

        let weak = Arc::downgrade(store);
        service.on_insert_generating_uri(Box::new(move |id: &str, address: &str| {
            with_store(&weak, |store| store.set_address(id, address));
        }));

        let weak = Arc::downgrade(store);
        service.on_insert_finished(Box::new(move |id: &str| {
            info!("Insert of {} finished", id);
            with_store(&weak, |store| store.set_status(id, ImageStatus::Inserted));
        }));

        let weak = Arc::downgrade(store);
        service.on_insert_failed(Box::new(move |id: &str| {
            info!("Insert of {} failed", id);
            with_store(&weak, |store| store.set_status(id, ImageStatus::Failed));
        }));

        coordinator
    }

    fn dispatch(&self, image: &ImageData) {
        let Some(store) = self.store.upgrade() else {
            debug!("Store is gone, not inserting {}", image.metadata.id);
            return;
        };

        let id = image.metadata.id.as_str();
        let Some(format) = Format::from_mime_type(&image.metadata.mime_type) else {
            error!("Image {} has unsupported type {}", id, image.metadata.mime_type);
            store.set_status(id, ImageStatus::Failed);
            return;
        };

        let filename = insert_target(&image.metadata.filename, format);
        store.set_insert_filename(id, &filename);

        info!(
            "Inserting {} as {} ({}, {} bytes)",
            id,
            filename,
            format,
            image.data.len()
        );

        self.insert_service.insert_image(InsertRequest {
            id: id.to_string(),
            data: image.data.clone(),
            mime_type: format.mime_type().to_string(),
            filename,
        });
    }
}

fn with_store<F>(store: &Weak<ImageStore>, apply: F)
where
    F: FnOnce(&ImageStore) -> bool,
{
    match store.upgrade() {
        Some(store) => {
            apply(&store);
        }
        None => debug!("Store is gone, ignoring insert callback"),
    }
}

/// Filename an image of `format` is inserted under
///
/// A name whose suffix already matches `format` is kept. A suffix naming
/// another image format is replaced by the canonical extension; any other
/// name gets the extension appended.
pub fn insert_target(filename: &str, format: Format) -> String {
    let filename = filename.trim();
    let stem = match Format::from_filename(filename) {
        Some(named) if named == format => return filename.to_string(),
        Some(_) => filename.rsplit_once('.').map_or(filename, |(stem, _)| stem),
        None if filename.is_empty() => FALLBACK_STEM,
        None => filename,
    };
    format!("{}.{}", stem, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_suffix_is_kept() {
        assert_eq!(insert_target("photo.jpeg", Format::Jpeg), "photo.jpeg");
        assert_eq!(insert_target("photo.JPG", Format::Jpeg), "photo.JPG");
        assert_eq!(insert_target(" scan.png ", Format::Png), "scan.png");
    }

    #[test]
    fn test_other_image_suffix_is_replaced() {
        assert_eq!(insert_target("holiday.jpeg", Format::Png), "holiday.png");
        assert_eq!(insert_target("scan.png", Format::Bmp), "scan.bmp");
        assert_eq!(insert_target("a.b.gif", Format::Jpeg), "a.b.jpg");
    }

    #[test]
    fn test_missing_suffix_is_appended() {
        assert_eq!(insert_target("image", Format::Png), "image.png");
        assert_eq!(insert_target("holiday.2024", Format::Gif), "holiday.2024.gif");
        assert_eq!(insert_target("  ", Format::Jpeg), "image.jpg");
    }
}
