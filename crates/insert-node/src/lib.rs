//! Insert Node
//!
//! Hosts an image store next to a simulated insert network and drives
//! batches of local files through it.

pub mod config;
pub mod node;
pub mod pipeline;

pub use config::Config;
pub use node::{content_address, NodeSettings, SimulatedNode};
pub use pipeline::{BatchEntry, BatchOptions, Pipeline};
