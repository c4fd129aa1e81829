use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Lifecycle status of a stored image.
///
/// Some states are mutually exclusive within the life of a single image,
/// e.g. there is no way from [`ImageStatus::Failed`] to [`ImageStatus::Inserted`].
/// A clone always starts over at [`ImageStatus::Waiting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageStatus {
    /// Stored locally, metadata can still be edited
    Waiting,
    /// Handed to the insert subsystem
    Inserting,
    /// The network reported a successful insert
    Inserted,
    /// The network reported a failed insert
    Failed,
}

impl ImageStatus {
    pub const ALL: [ImageStatus; 4] = [
        ImageStatus::Waiting,
        ImageStatus::Inserting,
        ImageStatus::Inserted,
        ImageStatus::Failed,
    ];

    /// The exact token used in JSON and update requests
    pub const fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Waiting => "Waiting",
            ImageStatus::Inserting => "Inserting",
            ImageStatus::Inserted => "Inserted",
            ImageStatus::Failed => "Failed",
        }
    }

    /// Whether the insert of this image has come to an end
    pub const fn is_settled(self) -> bool {
        matches!(self, ImageStatus::Inserted | ImageStatus::Failed)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}
