//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the capabilities the pipeline needs from
//! a codec: header-only identify, metadata extraction, thumbnail decoding at
//! a maximum dimension, frame encoding into a named container, and a check
//! telling whether a container can be encoded at all on this runtime.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec): pure Rust, built on the
//! `image` crate. Everything is statically linked into the binary.

use super::params::{EncodeOptions, ImageKind, ThumbnailRequest};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("No {0} encoder available")]
    Unsupported(ImageKind),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Metadata carried from a source image into its re-encoded output.
///
/// - `exif`: raw TIFF-structured EXIF block (no `Exif\0\0` prefix)
/// - `icc_profile`: embedded color profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub exif: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.icc_profile.is_none()
    }

    /// EXIF orientation (1–8), if the EXIF block carries one.
    pub fn orientation(&self) -> Option<u16> {
        self.exif.as_deref().and_then(super::exif::read_orientation)
    }

    pub fn has_gps(&self) -> bool {
        self.exif.as_deref().is_some_and(super::exif::has_gps)
    }
}

/// A compressed image buffer with its container tag and extracted metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub kind: ImageKind,
    pub metadata: Option<Metadata>,
}

impl CompressedImage {
    /// Wrap raw bytes, sniffing the container from its magic bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let kind = ImageKind::detect(&data);
        Self {
            data,
            kind,
            metadata: None,
        }
    }
}

/// Decoded pixels, independent of any container format.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    image: DynamicImage,
}

impl RasterFrame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Trait for image codecs.
///
/// Every codec must implement all operations so the pipeline stays
/// codec-agnostic. Implementations must not keep per-call state: the same
/// codec is shared by concurrent pipeline calls.
pub trait ImageCodec: Sync {
    /// Read pixel dimensions from the container header without decoding pixels.
    fn identify(&self, source: &CompressedImage) -> Result<Dimensions, CodecError>;

    /// Extract embedded EXIF / ICC metadata.
    fn read_metadata(&self, source: &CompressedImage) -> Result<Metadata, CodecError>;

    /// Decode a frame whose longest edge is at most `request.max_pixel_size`.
    ///
    /// Always generated from the primary image data, never from an embedded
    /// preview.
    fn thumbnail(
        &self,
        source: &CompressedImage,
        request: &ThumbnailRequest,
    ) -> Result<RasterFrame, CodecError>;

    /// Whether an encoder for `kind` can be created on this runtime.
    fn can_encode(&self, kind: ImageKind) -> bool;

    /// Encode one frame plus optional metadata into `options.target`.
    ///
    /// Returns [`CodecError::Unsupported`] when no encoder exists for the
    /// target; any other error means the encoder existed but failed.
    fn encode(
        &self,
        frame: &RasterFrame,
        options: &EncodeOptions,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<u8>, CodecError>;
}
