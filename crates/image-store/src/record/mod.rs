//! A stored image

pub mod lifecycle;

use bytes::Bytes;
use imgpost_common::{ImageData, ImageMetadata, ImageStatus};
use tracing::debug;

use crate::codec::Format;

/// One stored image: metadata plus its encoded payload
///
/// Only the store hands these out, and only as snapshots. `status` is written
/// exclusively by [`lifecycle::transition`].
#[derive(Debug, Clone)]
pub struct ImageRecord {
    id: String,
    format: Format,
    width: u32,
    height: u32,
    filename: String,
    status: ImageStatus,
    address: Option<String>,
    insert_filename: Option<String>,
    sequence: u64,
    data: Bytes,
}

impl ImageRecord {
    /// Create a new record in [`ImageStatus::Waiting`]
    pub fn new(
        id: String,
        format: Format,
        width: u32,
        height: u32,
        filename: String,
        sequence: u64,
        data: Bytes,
    ) -> Self {
        Self {
            id,
            format,
            width,
            height,
            filename,
            status: ImageStatus::Waiting,
            address: None,
            insert_filename: None,
            sequence,
            data,
        }
    }

    /// `image.<ext>` for the given format
    pub fn default_filename(format: Format) -> String {
        format!("image.{}", format.extension())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> ImageStatus {
        self.status
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn insert_filename(&self) -> Option<&str> {
        self.insert_filename.as_deref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Immutable view of the payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            id: self.id.clone(),
            width: self.width,
            height: self.height,
            size: self.size(),
            mime_type: self.format.mime_type().to_string(),
            filename: self.filename.clone(),
            status: self.status,
            address: self.address.clone(),
            insert_filename: self.insert_filename.clone(),
        }
    }

    pub fn image_data(&self) -> ImageData {
        ImageData {
            metadata: self.metadata(),
            data: self.data.clone(),
        }
    }

    /// Rename the image; only allowed while it is still waiting
    pub fn set_filename(&mut self, filename: &str) -> bool {
        if self.status != ImageStatus::Waiting {
            debug!(
                "Ignoring filename change of {} while {}",
                self.id, self.status
            );
            return false;
        }

        self.filename = filename.to_string();
        true
    }

    /// Record the generated address; the first one wins
    pub fn set_address(&mut self, address: &str) -> bool {
        set_once(&mut self.address, address, "address", &self.id)
    }

    /// Record the filename used for the insert; the first one wins
    pub fn set_insert_filename(&mut self, insert_filename: &str) -> bool {
        set_once(&mut self.insert_filename, insert_filename, "insert filename", &self.id)
    }
}

fn set_once(slot: &mut Option<String>, value: &str, field: &str, id: &str) -> bool {
    match slot {
        Some(existing) => {
            debug!(
                "Ignoring {} {:?} for {}, already set to {:?}",
                field, value, id, existing
            );
            false
        }
        None => {
            *slot = Some(value.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord::new(
            "id-1".to_string(),
            Format::Png,
            3,
            2,
            ImageRecord::default_filename(Format::Png),
            0,
            Bytes::from_static(b"payload"),
        )
    }

    #[test]
    fn test_new_record_is_waiting_without_generated_fields() {
        let record = record();
        let metadata = record.metadata();

        assert_eq!(metadata.status, ImageStatus::Waiting);
        assert_eq!(metadata.filename, "image.png");
        assert_eq!(metadata.mime_type, "image/png");
        assert_eq!(metadata.size, 7);
        assert_eq!(metadata.address, None);
        assert_eq!(metadata.insert_filename, None);
    }

    #[test]
    fn test_filename_is_frozen_once_not_waiting() {
        let mut record = record();
        assert!(record.set_filename("cat.png"));

        lifecycle::transition(&mut record, ImageStatus::Inserting).unwrap();

        assert!(!record.set_filename("dog.png"));
        assert_eq!(record.filename(), "cat.png");
    }

    #[test]
    fn test_generated_fields_are_set_once() {
        let mut record = record();

        assert!(record.set_address("CHK@first"));
        assert!(!record.set_address("CHK@second"));
        assert_eq!(record.address(), Some("CHK@first"));

        assert!(record.set_insert_filename("image.png"));
        assert!(!record.set_insert_filename("other.png"));
        assert_eq!(record.insert_filename(), Some("image.png"));
    }

    #[test]
    fn test_image_data_shares_payload() {
        let record = record();
        let image = record.image_data();
        assert_eq!(image.data, *record.data());
        assert_eq!(image.metadata, record.metadata());
    }
}
