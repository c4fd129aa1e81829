//! Update requests for a stored image

use serde::{de, Deserialize, Deserializer};
use tracing::debug;

use crate::{ImageStatus, Result};

/// Requested changes to one image, as sent by the web layer
///
/// `width` and `height` are accepted as JSON numbers or as numeric strings.
/// `status` is kept as the raw token; see [`ImageUpdate::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdate {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_dimension")]
    pub width: Option<u32>,

    #[serde(default, deserialize_with = "lenient_dimension")]
    pub height: Option<u32>,
}

impl ImageUpdate {
    /// Parse an update request body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The requested status, if the token names one of the four states.
    /// Unknown tokens are ignored.
    pub fn status(&self) -> Option<ImageStatus> {
        let token = self.status.as_deref()?;
        match token.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                debug!("Ignoring unknown status token: {:?}", token);
                None
            }
        }
    }

    /// Whether applying this update derives a new image
    pub fn requests_clone(&self) -> bool {
        self.mime_type.is_some() || self.width.is_some() || self.height.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn lenient_dimension<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Dimension {
        Number(u32),
        Text(String),
    }

    match Option::<Dimension>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Dimension::Number(value)) => Ok(Some(value)),
        Some(Dimension::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid dimension: {:?}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_empty_update() {
        let update = ImageUpdate::from_json(b"{}").unwrap();
        assert!(update.is_empty());
        assert!(!update.requests_clone());
        assert_eq!(update.status(), None);
    }

    #[test]
    fn test_dimensions_accept_numbers_and_strings() {
        let update = ImageUpdate::from_json(br#"{"width":"500","height":600}"#).unwrap();
        assert_eq!(update.width, Some(500));
        assert_eq!(update.height, Some(600));
        assert!(update.requests_clone());
    }

    #[test]
    fn test_non_numeric_dimension_is_an_error() {
        assert!(ImageUpdate::from_json(br#"{"width":"wide"}"#).is_err());
    }

    #[test]
    fn test_status_token_is_parsed() {
        let update = ImageUpdate::from_json(br#"{"status":"Inserting"}"#).unwrap();
        assert_eq!(update.status(), Some(ImageStatus::Inserting));
        assert!(!update.requests_clone());
    }

    #[test]
    fn test_unknown_status_token_is_ignored() {
        let update = ImageUpdate::from_json(br#"{"status":"Published"}"#).unwrap();
        assert_eq!(update.status.as_deref(), Some("Published"));
        assert_eq!(update.status(), None);
    }

    #[test]
    fn test_mime_type_uses_camel_case() {
        let update = ImageUpdate::from_json(br#"{"mimeType":"image/jpeg","filename":"a.jpg"}"#)
            .unwrap();
        assert_eq!(update.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(update.filename.as_deref(), Some("a.jpg"));
        assert!(update.requests_clone());
    }
}
