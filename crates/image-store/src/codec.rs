//! Image codec: format sniffing, decoding, encoding and scaling
//!
//! Stateless. Format detection only looks at the leading magic bytes so it
//! can be used as a cheap pre-check before a full decode.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF87_SIGNATURE: &[u8] = b"GIF87a";
const GIF89_SIGNATURE: &[u8] = b"GIF89a";
const BMP_SIGNATURE: &[u8] = b"BM";
const BMP_FILE_HEADER_LEN: usize = 14;

/// Largest raster a resize may produce
pub const MAX_PIXELS: u64 = 1 << 26;

/// Encodings the store accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Png, Format::Jpeg, Format::Gif, Format::Bmp];

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// Canonical filename extension, without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    const fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Png => &["png"],
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Gif => &["gif"],
            Self::Bmp => &["bmp"],
        }
    }

    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let mime_type = mime_type.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.mime_type().eq_ignore_ascii_case(mime_type))
    }

    /// Format named by a filename's suffix (`.png`, `.jpg`, `.jpeg`, `.gif`, `.bmp`)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (stem, suffix) = filename.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|format| {
            format
                .suffixes()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(suffix))
        })
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("invalid {format} payload: {reason}")]
    Invalid { format: Format, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to encode {format}: {reason}")]
pub struct EncodeError {
    pub format: Format,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    #[error("{width}x{height} exceeds the limit of {} pixels", MAX_PIXELS)]
    TooLarge { width: u32, height: u32 },
}

impl From<DecodeError> for imgpost_common::Error {
    fn from(err: DecodeError) -> Self {
        imgpost_common::Error::Decode(err.to_string())
    }
}

impl From<EncodeError> for imgpost_common::Error {
    fn from(err: EncodeError) -> Self {
        imgpost_common::Error::Encode(err.to_string())
    }
}

/// Decoded pixel data
#[derive(Debug, Clone)]
pub struct Raster {
    image: DynamicImage,
}

impl Raster {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl From<DynamicImage> for Raster {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// Identify the encoding from the leading bytes. Never decodes.
pub fn detect_format(data: &[u8]) -> Option<Format> {
    if data.starts_with(PNG_SIGNATURE) {
        Some(Format::Png)
    } else if data.starts_with(JPEG_SIGNATURE) {
        Some(Format::Jpeg)
    } else if data.starts_with(GIF87_SIGNATURE) || data.starts_with(GIF89_SIGNATURE) {
        Some(Format::Gif)
    } else if data.len() >= BMP_FILE_HEADER_LEN && data.starts_with(BMP_SIGNATURE) {
        Some(Format::Bmp)
    } else {
        None
    }
}

pub fn decode(data: &[u8]) -> Result<Raster, DecodeError> {
    let format = detect_format(data).ok_or(DecodeError::UnknownFormat)?;
    decode_as(data, format)
}

fn decode_as(data: &[u8], format: Format) -> Result<Raster, DecodeError> {
    let image = image::load_from_memory_with_format(data, format.image_format()).map_err(
        |e| DecodeError::Invalid {
            format,
            reason: e.to_string(),
        },
    )?;

    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Invalid {
            format,
            reason: "image has no pixels".to_string(),
        });
    }

    Ok(Raster { image })
}

pub fn encode(raster: &Raster, format: Format) -> Result<Vec<u8>, EncodeError> {
    // JPEG has no alpha channel
    let image = match format {
        Format::Jpeg => DynamicImage::ImageRgb8(raster.image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(raster.image.to_rgba8()),
    };

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format.image_format())
        .map_err(|e| EncodeError {
            format,
            reason: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}

/// Resize a raster.
///
/// See [`target_dimensions`] for how missing dimensions are filled in.
/// Targets above [`MAX_PIXELS`] are refused before any pixel buffer is
/// allocated.
pub fn scale(
    raster: &Raster,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<Raster, ScaleError> {
    match target_dimensions(raster.width(), raster.height(), width, height) {
        Some((width, height)) if !within_pixel_limit(width, height) => {
            Err(ScaleError::TooLarge { width, height })
        }
        Some((width, height)) if (width, height) != (raster.width(), raster.height()) => Ok(Raster {
            image: raster.image.resize_exact(width, height, FilterType::Lanczos3),
        }),
        _ => Ok(raster.clone()),
    }
}

/// Whether a `width` x `height` raster stays within [`MAX_PIXELS`]
pub fn within_pixel_limit(width: u32, height: u32) -> bool {
    u64::from(width)
        .checked_mul(u64::from(height))
        .is_some_and(|pixels| pixels <= MAX_PIXELS)
}

/// Resulting dimensions for a resize request, or `None` for no resize.
///
/// - both given: used as is, aspect ratio ignored
/// - one given: the other follows the original aspect ratio, rounded
/// - neither given: no resize
///
/// Every dimension is at least 1.
pub fn target_dimensions(
    original_width: u32,
    original_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (width, height) = match (width.map(at_least_one), height.map(at_least_one)) {
        (None, None) => return None,
        (Some(width), Some(height)) => (width, height),
        (Some(width), None) => (width, proportional(original_height, width, original_width)),
        (None, Some(height)) => (proportional(original_width, height, original_height), height),
    };

    Some((at_least_one(width), at_least_one(height)))
}

fn at_least_one(value: u32) -> u32 {
    value.max(1)
}

/// `round(other * given / original_given)` without floating point
fn proportional(other: u32, given: u32, original_given: u32) -> u32 {
    let numerator = 2 * u64::from(other) * u64::from(given) + u64::from(original_given);
    let denominator = 2 * u64::from(at_least_one(original_given));
    u32::try_from(numerator / denominator).unwrap_or(u32::MAX)
}
