pub mod error;
pub mod insert;
pub mod models;
pub mod status;
pub mod update;

pub use error::{Error, Result};
pub use insert::{AddressListener, IdListener, InsertListeners, InsertRequest, InsertService};
pub use models::{ImageData, ImageJson, ImageMetadata, MetadataJson};
pub use status::ImageStatus;
pub use update::ImageUpdate;
