//! Image metadata and the JSON shape exposed to the web layer

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ImageStatus;

/// Snapshot of one stored image's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Unique image identifier
    pub id: String,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Size of the encoded payload in bytes
    pub size: usize,

    /// MIME type detected from the payload
    pub mime_type: String,

    /// Name of the file to insert
    pub filename: String,

    /// Current lifecycle status
    pub status: ImageStatus,

    /// Address generated by the network
    pub address: Option<String>,

    /// Filename actually used for the insert
    pub insert_filename: Option<String>,
}

impl ImageMetadata {
    /// Render this metadata in the exposed JSON shape
    pub fn to_json(&self) -> ImageJson {
        ImageJson::from(self)
    }
}

/// Metadata of an image together with its encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub metadata: ImageMetadata,
    pub data: Bytes,
}

/// `{ "id": ..., "metadata": { ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageJson {
    pub id: String,
    pub metadata: MetadataJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataJson {
    pub width: u32,
    pub height: u32,
    pub size: usize,
    pub mime_type: String,
    pub filename: String,
    pub status: ImageStatus,
    pub key: Option<String>,
    pub insert_filename: Option<String>,
}

impl From<&ImageMetadata> for ImageJson {
    fn from(metadata: &ImageMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            metadata: MetadataJson {
                width: metadata.width,
                height: metadata.height,
                size: metadata.size,
                mime_type: metadata.mime_type.clone(),
                filename: metadata.filename.clone(),
                status: metadata.status,
                key: metadata.address.clone(),
                insert_filename: metadata.insert_filename.clone(),
            },
        }
    }
}
