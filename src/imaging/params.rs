//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides sizes, formats and fallbacks) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping codecs (e.g. for testing with a mock) without
//! changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`ImageKind`]: Container format tag, sniffed from magic bytes.
//! - [`ThumbnailRequest`]: What the decoder should produce: max dimension, orientation, eagerness.
//! - [`EncodeOptions`]: Target format, quality, thumbnail embedding, GPS stripping, size cap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Build from a `0.0..=1.0` compression factor. Out-of-range and NaN
    /// factors are clamped.
    pub fn from_factor(factor: f64) -> Self {
        let factor = if factor.is_nan() { 0.0 } else { factor };
        Self::new((factor.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Container format of a compressed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
    #[serde(alias = "heif")]
    Heic,
    Avif,
    WebP,
    #[serde(alias = "tif")]
    Tiff,
    Bmp,
    Unknown,
}

/// ISO-BMFF `ftyp` brands that identify a HEIF/HEIC still image.
const HEIC_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1"];
const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];

impl ImageKind {
    /// Format used when the preferred encoder is unavailable.
    pub const UNIVERSAL_FALLBACK: ImageKind = ImageKind::Jpeg;

    /// Sniff the container format from the first bytes of a buffer.
    pub fn detect(data: &[u8]) -> Self {
        if let Some(kind) = detect_isobmff(data) {
            return kind;
        }
        match image::guess_format(data) {
            Ok(image::ImageFormat::Jpeg) => Self::Jpeg,
            Ok(image::ImageFormat::Png) => Self::Png,
            Ok(image::ImageFormat::Gif) => Self::Gif,
            Ok(image::ImageFormat::WebP) => Self::WebP,
            Ok(image::ImageFormat::Tiff) => Self::Tiff,
            Ok(image::ImageFormat::Bmp) => Self::Bmp,
            Ok(image::ImageFormat::Avif) => Self::Avif,
            _ => Self::Unknown,
        }
    }

    /// The `image` crate format for this kind, if it has one.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Avif => Some(image::ImageFormat::Avif),
            Self::WebP => Some(image::ImageFormat::WebP),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Heic | Self::Unknown => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Heic => "heic",
            Self::Avif => "avif",
            Self::WebP => "webp",
            Self::Tiff => "tif",
            Self::Bmp => "bmp",
            Self::Unknown => "bin",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Heic => "image/heic",
            Self::Avif => "image/avif",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Containers that may hold an animation; re-encoded in their own format
    /// without a quality setting.
    pub fn is_multi_frame_container(self) -> bool {
        matches!(self, Self::Gif)
    }

    /// HEIF-family formats with better compression than JPEG at equal quality.
    pub fn is_high_efficiency(self) -> bool {
        matches!(self, Self::Heic | Self::Avif)
    }

    /// Whether the encoder honors a quality factor.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::Heic | Self::Avif)
    }
}

fn detect_isobmff(data: &[u8]) -> Option<ImageKind> {
    // [size:4]["ftyp"][major brand:4][minor version:4][compatible brands...]
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return None;
    }
    let box_len = (u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize)
        .clamp(12, data.len());
    let major = &data[8..12];
    let compatible = data[12.min(box_len)..box_len].chunks_exact(4).skip(1);
    let brands: Vec<&[u8]> = std::iter::once(major).chain(compatible).collect();

    if brands.iter().any(|b| AVIF_BRANDS.iter().any(|a| a.as_slice() == *b)) {
        Some(ImageKind::Avif)
    } else if brands.iter().any(|b| HEIC_BRANDS.iter().any(|h| h.as_slice() == *b)) {
        Some(ImageKind::Heic)
    } else {
        None
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Heic => "heic",
            Self::Avif => "avif",
            Self::WebP => "webp",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "heic" | "heif" => Ok(Self::Heic),
            "avif" => Ok(Self::Avif),
            "webp" => Ok(Self::WebP),
            "tiff" | "tif" => Ok(Self::Tiff),
            "bmp" => Ok(Self::Bmp),
            other => Err(format!("unknown image format: {other}")),
        }
    }
}

/// What the decoder should produce from compressed source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailRequest {
    /// Longest edge of the returned frame. Never upscales.
    pub max_pixel_size: u32,
    /// Apply the stored EXIF orientation to the pixels.
    pub apply_orientation: bool,
    /// Convert the frame to a display-ready 8-bit buffer immediately instead
    /// of keeping the decoder's native pixel layout until encode time.
    pub force_decode: bool,
}

/// Options for a single encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    pub target: ImageKind,
    /// Ignored by lossless containers.
    pub quality: Option<Quality>,
    pub embed_thumbnail: bool,
    /// Remove GPS fields; orientation and color profile are always kept.
    pub strip_gps: bool,
    pub max_pixel_dimension: Option<u32>,
}

impl EncodeOptions {
    pub fn new(target: ImageKind) -> Self {
        Self {
            target,
            quality: None,
            embed_thumbnail: false,
            strip_gps: false,
            max_pixel_dimension: None,
        }
    }

    /// Same options aimed at a different container.
    pub fn with_target(self, target: ImageKind) -> Self {
        Self { target, ..self }
    }
}
