//! Image Store
//!
//! Holds uploaded images in memory, tracks their insert lifecycle and derives
//! resized or re-encoded copies. Inserting itself is delegated to an
//! [`imgpost_common::InsertService`], connected through [`InsertCoordinator`].

pub mod codec;
pub mod coordinator;
pub mod listeners;
pub mod record;
pub mod store;
pub mod update;

pub use codec::{DecodeError, EncodeError, Format, Raster, ScaleError, MAX_PIXELS};
pub use coordinator::{insert_target, InsertCoordinator};
pub use listeners::{ImageAdded, InsertRequested, ListenerRegistry, Subject};
pub use record::lifecycle::TransitionRejected;
pub use record::ImageRecord;
pub use store::ImageStore;
pub use update::UpdateOutcome;
