//! In-memory image store

use bytes::Bytes;
use imgpost_common::{ImageData, ImageMetadata, ImageStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{self, Format};
use crate::listeners::{ImageAdded, InsertRequested, ListenerRegistry};
use crate::record::{lifecycle, ImageRecord};

#[derive(Default)]
struct Inner {
    records: HashMap<String, ImageRecord>,
    /// insertion sequence -> id
    order: BTreeMap<u64, String>,
    next_sequence: u64,
}

impl Inner {
    fn insert(
        &mut self,
        format: Format,
        width: u32,
        height: u32,
        filename: String,
        data: Bytes,
    ) -> &ImageRecord {
        let mut id = Uuid::new_v4().to_string();
        while self.records.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let record = ImageRecord::new(id.clone(), format, width, height, filename, sequence, data);
        self.order.insert(sequence, id.clone());
        self.records.entry(id).or_insert(record)
    }
}

/// Source of a clone, taken under the lock
struct CloneSource {
    format: Format,
    width: u32,
    height: u32,
    filename: String,
    data: Bytes,
}

/// Concurrency-safe keyed collection of image records
///
/// Every operation is atomic with respect to the others. Listeners are invoked
/// after the store lock has been released, so they may call back into the
/// store.
pub struct ImageStore {
    inner: Mutex<Inner>,
    listeners: ListenerRegistry,
}

impl ImageStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Subscribe to images being added, by upload or by clone
    pub fn on_image_added<F>(&self, listener: F)
    where
        F: Fn(&ImageAdded) + Send + Sync + 'static,
    {
        self.listeners.image_added.subscribe(listener);
    }

    /// Subscribe to images entering [`ImageStatus::Inserting`]
    pub fn on_insert_requested<F>(&self, listener: F)
    where
        F: Fn(&InsertRequested) + Send + Sync + 'static,
    {
        self.listeners.insert_requested.subscribe(listener);
    }

    /// Store an uploaded image
    ///
    /// Returns `None` and leaves the store unchanged if the payload is not a
    /// decodable PNG, JPEG, GIF or BMP image.
    pub fn add_image(&self, data: &[u8]) -> Option<ImageMetadata> {
        let Some(format) = codec::detect_format(data) else {
            debug!("Rejecting upload of {} bytes: unknown format", data.len());
            return None;
        };

        let raster = match codec::decode(data) {
            Ok(raster) => raster,
            Err(e) => {
                warn!("Rejecting upload of {} bytes: {}", data.len(), e);
                return None;
            }
        };

        let image = self
            .inner
            .lock()
            .insert(
                format,
                raster.width(),
                raster.height(),
                ImageRecord::default_filename(format),
                Bytes::copy_from_slice(data),
            )
            .image_data();

        info!(
            "Added image {} ({}, {}x{}, {} bytes)",
            image.metadata.id,
            image.metadata.mime_type,
            image.metadata.width,
            image.metadata.height,
            image.metadata.size
        );

        Some(self.publish_added(image))
    }

    pub fn get_image(&self, id: &str) -> Option<ImageMetadata> {
        self.inner.lock().records.get(id).map(ImageRecord::metadata)
    }

    pub fn get_image_data(&self, id: &str) -> Option<ImageData> {
        self.inner.lock().records.get(id).map(ImageRecord::image_data)
    }

    /// IDs of all images, oldest first
    pub fn list_image_ids(&self) -> Vec<String> {
        self.inner.lock().order.values().cloned().collect()
    }

    /// Metadata of all images, oldest first
    pub fn list_images(&self) -> Vec<ImageMetadata> {
        let inner = self.inner.lock();
        inner
            .order
            .values()
            .filter_map(|id| inner.records.get(id))
            .map(ImageRecord::metadata)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an image. Unknown IDs are ignored.
    pub fn remove_image(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.records.remove(id);
            if let Some(record) = &removed {
                inner.order.remove(&record.sequence());
            }
            removed
        };

        match removed {
            Some(_) => {
                info!("Removed image {}", id);
                true
            }
            None => {
                debug!("Image not found for removal: {}", id);
                false
            }
        }
    }

    /// Rename an image that is still waiting
    pub fn set_filename(&self, id: &str, filename: &str) -> bool {
        self.update_record(id, |record| record.set_filename(filename))
    }

    /// Move an image to another status
    ///
    /// Returns `false` for unknown IDs and transitions the lifecycle does not
    /// allow. Entering [`ImageStatus::Inserting`] notifies the insert listeners.
    pub fn set_status(&self, id: &str, status: ImageStatus) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.records.get_mut(id) else {
            debug!("Image not found for status {}: {}", status, id);
            return false;
        };

        if let Err(rejected) = lifecycle::transition(record, status) {
            debug!("Image {}: {}", id, rejected);
            return false;
        }

        let requested = (status == ImageStatus::Inserting).then(|| record.image_data());
        drop(inner);

        info!("Image {} is now {}", id, status);

        if let Some(image) = requested {
            self.listeners
                .insert_requested
                .publish(&InsertRequested { image });
        }
        true
    }

    pub fn set_address(&self, id: &str, address: &str) -> bool {
        let applied = self.update_record(id, |record| record.set_address(address));
        if applied {
            info!("Image {} has address {}", id, address);
        }
        applied
    }

    pub fn set_insert_filename(&self, id: &str, insert_filename: &str) -> bool {
        self.update_record(id, |record| record.set_insert_filename(insert_filename))
    }

    /// Derive a new image from an existing one
    ///
    /// The copy is re-encoded to `mime_type` (default: the source type) and
    /// scaled per [`codec::target_dimensions`]. It starts over at
    /// [`ImageStatus::Waiting`] with the source's filename. Returns `None` if
    /// the source is missing, the MIME type is not supported, the target
    /// exceeds [`codec::MAX_PIXELS`] or transcoding fails.
    pub fn clone_image(
        &self,
        id: &str,
        mime_type: Option<&str>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<ImageMetadata> {
        let source = self.clone_source(id)?;

        let format = match mime_type {
            Some(mime_type) => match Format::from_mime_type(mime_type) {
                Some(format) => format,
                None => {
                    debug!("Cannot clone {} to unsupported type {:?}", id, mime_type);
                    return None;
                }
            },
            None => source.format,
        };

        let resize = codec::target_dimensions(source.width, source.height, width, height)
            .filter(|&dimensions| dimensions != (source.width, source.height));

        let (data, width, height) = if format == source.format && resize.is_none() {
            (
                Bytes::copy_from_slice(&source.data),
                source.width,
                source.height,
            )
        } else {
            let raster = match codec::decode(&source.data) {
                Ok(raster) => raster,
                Err(e) => {
                    warn!("Cannot clone {}: {}", id, e);
                    return None;
                }
            };
            let raster = match codec::scale(&raster, width, height) {
                Ok(raster) => raster,
                Err(e) => {
                    warn!("Cannot clone {}: {}", id, e);
                    return None;
                }
            };
            let encoded = match codec::encode(&raster, format) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!("Cannot clone {}: {}", id, e);
                    return None;
                }
            };
            (Bytes::from(encoded), raster.width(), raster.height())
        };

        let image = self
            .inner
            .lock()
            .insert(format, width, height, source.filename, data)
            .image_data();

        info!(
            "Cloned image {} into {} ({}, {}x{})",
            id, image.metadata.id, image.metadata.mime_type, width, height
        );

        Some(self.publish_added(image))
    }

    fn clone_source(&self, id: &str) -> Option<CloneSource> {
        let inner = self.inner.lock();
        let Some(record) = inner.records.get(id) else {
            debug!("Image not found for clone: {}", id);
            return None;
        };

        Some(CloneSource {
            format: record.format(),
            width: record.width(),
            height: record.height(),
            filename: record.filename().to_string(),
            data: record.data().clone(),
        })
    }

    fn update_record<F>(&self, id: &str, update: F) -> bool
    where
        F: FnOnce(&mut ImageRecord) -> bool,
    {
        match self.inner.lock().records.get_mut(id) {
            Some(record) => update(record),
            None => {
                debug!("Image not found: {}", id);
                false
            }
        }
    }

    fn publish_added(&self, image: ImageData) -> ImageMetadata {
        let metadata = image.metadata.clone();
        self.listeners.image_added.publish(&ImageAdded { image });
        metadata
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Arc;

    fn encoded(width: u32, height: u32, format: Format) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, 90, 255])
        });
        codec::encode(&DynamicImage::ImageRgba8(image).into(), format).unwrap()
    }

    #[test]
    fn test_add_image_reads_dimensions_and_type() {
        let store = ImageStore::new();
        let metadata = store.add_image(&encoded(12, 23, Format::Png)).unwrap();

        assert_eq!((metadata.width, metadata.height), (12, 23));
        assert_eq!(metadata.mime_type, "image/png");
        assert_eq!(metadata.filename, "image.png");
        assert_eq!(metadata.status, ImageStatus::Waiting);
        assert_eq!(store.get_image(&metadata.id), Some(metadata));
    }

    #[test]
    fn test_add_image_rejects_garbage() {
        let store = ImageStore::new();
        assert!(store.add_image(b"definitely not an image").is_none());
        assert!(store.add_image(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).is_none());
        assert!(store.is_empty());
        assert!(store.list_image_ids().is_empty());
    }

    #[test]
    fn test_image_data_is_the_uploaded_payload() {
        let store = ImageStore::new();
        let payload = encoded(2, 2, Format::Bmp);
        let id = store.add_image(&payload).unwrap().id;

        let image = store.get_image_data(&id).unwrap();
        assert_eq!(image.data.as_ref(), payload.as_slice());
        assert_eq!(image.metadata.size, payload.len());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(1, 1, Format::Gif)).unwrap().id;

        assert!(store.remove_image(&id));
        assert!(!store.remove_image(&id));
        assert!(!store.remove_image("unknown"));
        assert!(store.get_image(&id).is_none());
        assert!(store.list_image_ids().is_empty());
    }

    #[test]
    fn test_listing_keeps_insertion_order_across_removals() {
        let store = ImageStore::new();
        let ids: Vec<String> = (1..=4)
            .map(|n| store.add_image(&encoded(n, n, Format::Png)).unwrap().id)
            .collect();

        store.remove_image(&ids[1]);
        store.set_filename(&ids[3], "renamed.png");

        assert_eq!(store.list_image_ids(), vec![ids[0].clone(), ids[2].clone(), ids[3].clone()]);
        let widths: Vec<u32> = store.list_images().iter().map(|m| m.width).collect();
        assert_eq!(widths, vec![1, 3, 4]);
    }

    #[test]
    fn test_filename_only_changes_while_waiting() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(1, 1, Format::Png)).unwrap().id;

        assert!(store.set_filename(&id, "first.png"));
        assert!(store.set_status(&id, ImageStatus::Inserting));
        assert!(store.set_status(&id, ImageStatus::Inserted));
        assert!(!store.set_filename(&id, "second.png"));

        assert_eq!(store.get_image(&id).unwrap().filename, "first.png");
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let store = ImageStore::new();
        assert!(!store.set_filename("nope", "a.png"));
        assert!(!store.set_status("nope", ImageStatus::Inserting));
        assert!(!store.set_address("nope", "CHK@x"));
        assert!(!store.set_insert_filename("nope", "a.png"));
        assert!(store.clone_image("nope", None, Some(1), None).is_none());
        assert!(store.get_image_data("nope").is_none());
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(1, 1, Format::Png)).unwrap().id;

        assert!(!store.set_status(&id, ImageStatus::Inserted));
        assert!(!store.set_status(&id, ImageStatus::Waiting));
        assert!(store.set_status(&id, ImageStatus::Inserting));
        assert!(!store.set_status(&id, ImageStatus::Inserting));
        assert!(store.set_status(&id, ImageStatus::Failed));
        assert!(!store.set_status(&id, ImageStatus::Inserting));

        assert_eq!(store.get_image(&id).unwrap().status, ImageStatus::Failed);
    }

    #[test]
    fn test_generated_fields_are_first_write_wins() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(1, 1, Format::Png)).unwrap().id;

        assert!(store.set_address(&id, "addr-1"));
        assert!(!store.set_address(&id, "addr-2"));
        assert!(store.set_insert_filename(&id, "image.png"));

        let metadata = store.get_image(&id).unwrap();
        assert_eq!(metadata.address.as_deref(), Some("addr-1"));
        assert_eq!(metadata.insert_filename.as_deref(), Some("image.png"));
    }

    #[test]
    fn test_clone_with_both_dimensions_ignores_aspect_ratio() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(30, 10, Format::Png)).unwrap().id;

        let clone = store.clone_image(&id, None, Some(8), Some(16)).unwrap();

        assert_ne!(clone.id, id);
        assert_eq!((clone.width, clone.height), (8, 16));
        let raster = codec::decode(&store.get_image_data(&clone.id).unwrap().data).unwrap();
        assert_eq!((raster.width(), raster.height()), (8, 16));
    }

    #[test]
    fn test_clone_with_one_dimension_keeps_aspect_ratio() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(1, 1, Format::Png)).unwrap().id;

        let clone = store.clone_image(&id, None, Some(9), None).unwrap();
        assert_eq!((clone.width, clone.height), (9, 9));
    }

    #[test]
    fn test_clone_starts_over_and_keeps_filename() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(4, 4, Format::Png)).unwrap().id;
        store.set_filename(&id, "cat.png");
        store.set_status(&id, ImageStatus::Inserting);
        store.set_address(&id, "CHK@abc");
        store.set_insert_filename(&id, "cat.png");
        store.set_status(&id, ImageStatus::Failed);

        let clone = store.clone_image(&id, Some("image/jpeg"), None, None).unwrap();

        assert_eq!(clone.status, ImageStatus::Waiting);
        assert_eq!(clone.mime_type, "image/jpeg");
        assert_eq!(clone.filename, "cat.png");
        assert_eq!(clone.address, None);
        assert_eq!(clone.insert_filename, None);
        assert_eq!(store.get_image(&id).unwrap().status, ImageStatus::Failed);

        let data = store.get_image_data(&clone.id).unwrap().data;
        assert_eq!(codec::detect_format(&data), Some(Format::Jpeg));
    }

    #[test]
    fn test_unchanged_clone_copies_payload() {
        let store = ImageStore::new();
        let payload = encoded(5, 3, Format::Gif);
        let id = store.add_image(&payload).unwrap().id;

        let clone = store.clone_image(&id, Some("image/gif"), Some(5), None).unwrap();

        assert_eq!(clone.mime_type, "image/gif");
        assert_eq!(store.get_image_data(&clone.id).unwrap().data.as_ref(), payload.as_slice());
    }

    #[test]
    fn test_clone_to_unsupported_type_is_rejected() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(2, 2, Format::Png)).unwrap().id;

        assert!(store.clone_image(&id, Some("image/webp"), None, None).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clone_beyond_pixel_limit_is_rejected() {
        let store = ImageStore::new();
        let id = store.add_image(&encoded(2, 2, Format::Png)).unwrap().id;

        assert!(store
            .clone_image(&id, None, Some(u32::MAX), Some(u32::MAX))
            .is_none());
        assert!(store.clone_image(&id, None, None, Some(u32::MAX)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_listeners_see_adds_and_insert_requests() {
        let store = ImageStore::new();
        let added = Arc::new(Mutex::new(Vec::new()));
        let requested = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&added);
        store.on_image_added(move |event| sink.lock().push(event.image.metadata.id.clone()));
        let sink = Arc::clone(&requested);
        store.on_insert_requested(move |event| {
            sink.lock().push((event.image.metadata.id.clone(), event.image.metadata.status))
        });

        let id = store.add_image(&encoded(2, 2, Format::Png)).unwrap().id;
        let clone = store.clone_image(&id, None, Some(4), None).unwrap().id;
        store.set_status(&id, ImageStatus::Inserting);
        store.set_status(&id, ImageStatus::Inserting);

        assert_eq!(*added.lock(), vec![id.clone(), clone]);
        assert_eq!(*requested.lock(), vec![(id, ImageStatus::Inserting)]);
    }

    #[test]
    fn test_listener_may_reenter_the_store() {
        let store = Arc::new(ImageStore::new());

        let weak = Arc::downgrade(&store);
        store.on_image_added(move |event| {
            if let Some(store) = weak.upgrade() {
                store.set_filename(&event.image.metadata.id, "from-listener.png");
            }
        });

        let id = store.add_image(&encoded(1, 1, Format::Png)).unwrap().id;
        assert_eq!(store.get_image(&id).unwrap().filename, "from-listener.png");
    }
}
