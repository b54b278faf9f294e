//! Image processing in pure Rust, with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Metadata** | `img_parts` segments + custom EXIF editor (TIFF IFD) |
//! | **Thumbnail** | `image` decode with `Limits` + Lanczos3 |
//! | **Encode** | `image` JPEG / PNG / GIF / WebP encoders, rav1e for AVIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **EXIF**: Orientation, GPS stripping, embedded previews
//! - **Operations**: High-level functions combining calculations + codec

pub mod backend;
mod calculations;
pub mod exif;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, CompressedImage, Dimensions, ImageCodec, Metadata, RasterFrame};
pub use calculations::{
    DEFAULT_PIXEL_BUDGET, EdgeConstraint, PixelSize, calculate_decode_size, calculate_target_size,
    clamp_to_pixel_budget, fit_within, max_pixel_dimension,
};
pub use operations::{
    EncodeAttempt, Thumbnail, ThumbnailConfig, encode_source, encode_thumbnail,
    encode_with_fallback, extract_thumbnail, select_output_kind,
};
pub use params::{EncodeOptions, ImageKind, Quality, ThumbnailRequest};
pub use rust_backend::{RustCodec, decodable_kinds};
