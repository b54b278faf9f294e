//! Pure Rust codec with no system dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode JPEG | `jpeg-decoder` with DCT scaling (1/8 to 1/1) near the target size |
//! | Decode (PNG, GIF, WebP, TIFF, BMP) | `image` crate, bounded by `image::Limits` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG / PNG / GIF / WebP | `image::codecs::*` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | EXIF / ICC segments | `img_parts` (JPEG APP1/APP2, PNG eXIf/iCCP, WebP chunks) |
//! | EXIF edits | [`exif`](super::exif) |
//!
//! HEIC is recognized but can be neither decoded nor encoded here: identify
//! fails for HEIC sources, and HEIC targets report
//! [`CodecError::Unsupported`] so the pipeline falls back to JPEG.

use super::backend::{CodecError, CompressedImage, Dimensions, ImageCodec, Metadata, RasterFrame};
use super::calculations::fit_within;
use super::exif;
use super::params::{EncodeOptions, ImageKind, Quality, ThumbnailRequest};
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageReader, Limits, RgbImage};
use img_parts::{Bytes, DynImage, ImageEXIF, ImageICC};
use jpeg_decoder::PixelFormat;
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;

/// Kinds whose decoders are compiled in and known to work.
///
/// AVIF is deliberately excluded: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e), yet `ImageFormat::reading_enabled()`
/// returns `true` for it.
const DECODE_CANDIDATES: &[ImageKind] = &[
    ImageKind::Jpeg,
    ImageKind::Png,
    ImageKind::Gif,
    ImageKind::WebP,
    ImageKind::Tiff,
    ImageKind::Bmp,
];

/// Kinds this codec can write.
const ENCODE_CANDIDATES: &[ImageKind] = &[
    ImageKind::Jpeg,
    ImageKind::Png,
    ImageKind::Gif,
    ImageKind::WebP,
    ImageKind::Avif,
];

/// Containers that get EXIF / ICC written back.
const METADATA_CONTAINERS: &[ImageKind] = &[ImageKind::Jpeg, ImageKind::Png];

/// Longest edge of the preview stored in EXIF IFD1 (the EXIF standard's 160×120).
const PREVIEW_MAX_DIMENSION: u32 = 160;
const PREVIEW_QUALITY: u8 = 60;

/// AVIF encoder speed: 1 (slowest, best) to 10 (fastest).
const AVIF_SPEED: u8 = 6;

static DECODABLE_KINDS: LazyLock<Vec<ImageKind>> = LazyLock::new(|| {
    DECODE_CANDIDATES
        .iter()
        .copied()
        .filter(|kind| kind.image_format().is_some_and(|f| f.reading_enabled()))
        .collect()
});

/// Returns the kinds that have working decoders compiled in.
pub fn decodable_kinds() -> &'static [ImageKind] {
    &DECODABLE_KINDS
}

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustCodec {
    disabled: Vec<ImageKind>,
    limits: Limits,
}

impl RustCodec {
    pub fn new() -> Self {
        Self {
            disabled: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// A codec that pretends the given encoders are missing, the way an
    /// older runtime without HEIF/AVIF support behaves.
    pub fn without_encoders(kinds: &[ImageKind]) -> Self {
        Self {
            disabled: kinds.to_vec(),
            ..Self::new()
        }
    }

    /// Replace the decoder allocation limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decoder_format(kind: ImageKind) -> Result<image::ImageFormat, CodecError> {
    if !DECODABLE_KINDS.contains(&kind) {
        return Err(CodecError::Decode(format!("no {kind} decoder available")));
    }
    kind.image_format()
        .ok_or_else(|| CodecError::Decode(format!("no {kind} decoder available")))
}

/// Rotate/flip pixels according to an EXIF orientation value.
fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Convert to 8 bits per channel, keeping alpha only when present.
fn to_8bit(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

/// Downscale so the longest edge is at most `max_dimension`.
fn shrink_to(image: &DynamicImage, max_dimension: u32) -> Cow<'_, DynamicImage> {
    let current = (image.width(), image.height());
    let (w, h) = fit_within(current, max_dimension);
    if (w, h) == current {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image.resize_exact(w, h, FilterType::Lanczos3))
    }
}

/// Decode a JPEG at the smallest DCT scale (1/8 up to 1/1) whose result
/// still covers `max_pixel_size`.
///
/// Returns `Ok(None)` for pixel formats left to the `image` decoder (CMYK,
/// 16-bit lossless).
fn decode_jpeg_scaled(
    data: &[u8],
    max_pixel_size: u32,
    limits: &Limits,
) -> Result<Option<DynamicImage>, CodecError> {
    let decode_failed =
        |e: jpeg_decoder::Error| CodecError::Decode(format!("Failed to decode jpeg: {e}"));

    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(data));
    decoder.read_info().map_err(decode_failed)?;
    let Some(info) = decoder.info() else {
        return Ok(None);
    };
    if !matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) {
        return Ok(None);
    }
    let original = (u32::from(info.width), u32::from(info.height));
    limits
        .check_dimensions(original.0, original.1)
        .map_err(|e| CodecError::Decode(format!("Failed to decode jpeg: {e}")))?;

    // Fits within the original, so both edges are still u16
    let (width, height) = fit_within(original, max_pixel_size);
    let (width, height) = decoder
        .scale(width as u16, height as u16)
        .map_err(decode_failed)?;
    if let Some(max_alloc) = limits.max_alloc {
        decoder.set_max_decoding_buffer_size(usize::try_from(max_alloc).unwrap_or(usize::MAX));
    }
    let pixels = decoder.decode().map_err(decode_failed)?;

    let (width, height) = (u32::from(width), u32::from(height));
    let image = match info.pixel_format {
        PixelFormat::L8 => {
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        _ => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
    };
    image
        .map(Some)
        .ok_or_else(|| CodecError::Decode("jpeg decoder returned a short buffer".to_string()))
}

fn encode_failed(kind: ImageKind) -> impl Fn(image::ImageError) -> CodecError {
    move |e| CodecError::Encode(format!("{kind} encode failed: {e}"))
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(encode_failed(ImageKind::Jpeg))?;
    Ok(buf)
}

/// Write pixels only; metadata is attached afterwards.
fn encode_pixels(image: &DynamicImage, kind: ImageKind, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    match kind {
        ImageKind::Jpeg => return encode_jpeg(image, quality.value() as u8),
        ImageKind::Png => image
            .write_with_encoder(PngEncoder::new(&mut buf))
            .map_err(encode_failed(kind))?,
        ImageKind::WebP => to_8bit(image)
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
            .map_err(encode_failed(kind))?,
        ImageKind::Avif => to_8bit(image)
            .write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut buf,
                AVIF_SPEED,
                quality.value() as u8,
            ))
            .map_err(encode_failed(kind))?,
        ImageKind::Gif => {
            // The encoder writes the trailer when dropped
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode_frame(image::Frame::new(image.to_rgba8()))
                .map_err(encode_failed(kind))?;
        }
        other => return Err(CodecError::Unsupported(other)),
    }
    Ok(buf)
}

/// Build the EXIF block for the output: GPS stripped and preview embedded as
/// requested.
fn output_exif(
    image: &DynamicImage,
    options: &EncodeOptions,
    metadata: Option<&Metadata>,
) -> Result<Option<Vec<u8>>, CodecError> {
    let mut exif_block = metadata.and_then(|m| m.exif.clone());

    if options.strip_gps {
        exif_block = exif_block.map(|block| exif::strip_gps(&block));
    }

    if options.embed_thumbnail && options.target == ImageKind::Jpeg {
        let preview = image.thumbnail(PREVIEW_MAX_DIMENSION, PREVIEW_MAX_DIMENSION);
        let preview = encode_jpeg(&preview, PREVIEW_QUALITY)?;
        match exif::embed_thumbnail(exif_block.as_deref(), &preview) {
            Some(block) => exif_block = Some(block),
            None => tracing::debug!(
                preview_bytes = preview.len(),
                "EXIF preview does not fit in APP1, skipping"
            ),
        }
    }

    // PNG eXIf and WebP EXIF chunks have no APP1 size limit
    if options.target == ImageKind::Jpeg {
        exif_block = exif_block.and_then(|block| {
            // A stale source preview is the first thing to go
            let block = if block.len() > exif::MAX_EXIF_LEN {
                exif::remove_thumbnail(&block)
            } else {
                block
            };
            if block.len() > exif::MAX_EXIF_LEN {
                tracing::debug!(exif_bytes = block.len(), "EXIF does not fit in APP1, dropping it");
                return None;
            }
            Some(block)
        });
    }

    Ok(exif_block)
}

/// Write EXIF / ICC segments into an encoded JPEG or PNG.
fn attach_metadata(
    data: Vec<u8>,
    kind: ImageKind,
    exif_block: Option<Vec<u8>>,
    icc_profile: Option<Vec<u8>>,
) -> Result<Vec<u8>, CodecError> {
    if (exif_block.is_none() && icc_profile.is_none()) || !METADATA_CONTAINERS.contains(&kind) {
        return Ok(data);
    }

    let mut container = DynImage::from_bytes(Bytes::from(data))
        .map_err(|e| CodecError::Encode(format!("cannot reopen {kind} output: {e}")))?
        .ok_or_else(|| CodecError::Encode(format!("cannot reopen {kind} output")))?;
    if let Some(block) = exif_block {
        container.set_exif(Some(Bytes::from(block)));
    }
    if let Some(profile) = icc_profile {
        container.set_icc_profile(Some(Bytes::from(profile)));
    }

    let mut out = Vec::new();
    container.encoder().write_to(&mut out)?;
    Ok(out)
}

impl ImageCodec for RustCodec {
    fn identify(&self, source: &CompressedImage) -> Result<Dimensions, CodecError> {
        let format = decoder_format(source.kind)?;
        let (width, height) = ImageReader::with_format(Cursor::new(&source.data[..]), format)
            .into_dimensions()
            .map_err(|e| CodecError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn read_metadata(&self, source: &CompressedImage) -> Result<Metadata, CodecError> {
        if !matches!(source.kind, ImageKind::Jpeg | ImageKind::Png | ImageKind::WebP) {
            return Ok(Metadata::default());
        }
        let Some(container) = DynImage::from_bytes(Bytes::copy_from_slice(&source.data))
            .map_err(|e| CodecError::Decode(format!("Failed to read metadata: {e}")))?
        else {
            return Ok(Metadata::default());
        };

        let exif_block = container.exif().map(|block| {
            block
                .strip_prefix(b"Exif\0\0".as_slice())
                .unwrap_or(&block)
                .to_vec()
        });
        Ok(Metadata {
            exif: exif_block,
            icc_profile: container.icc_profile().map(|p| p.to_vec()),
        })
    }

    fn thumbnail(
        &self,
        source: &CompressedImage,
        request: &ThumbnailRequest,
    ) -> Result<RasterFrame, CodecError> {
        let format = decoder_format(source.kind)?;
        let scaled = match source.kind {
            ImageKind::Jpeg => {
                decode_jpeg_scaled(&source.data, request.max_pixel_size, &self.limits)?
            }
            _ => None,
        };
        let decoded = match scaled {
            Some(image) => image,
            None => {
                let mut reader = ImageReader::with_format(Cursor::new(&source.data[..]), format);
                reader.limits(self.limits.clone());
                reader.decode().map_err(|e| {
                    CodecError::Decode(format!("Failed to decode {}: {e}", source.kind))
                })?
            }
        };

        let mut image = shrink_to(&decoded, request.max_pixel_size).into_owned();
        drop(decoded);

        if request.apply_orientation {
            let orientation = self
                .read_metadata(source)
                .ok()
                .and_then(|m| m.orientation())
                .unwrap_or(1);
            image = apply_orientation(image, orientation);
        }

        if request.force_decode {
            image = to_8bit(&image);
        }

        Ok(RasterFrame::new(image))
    }

    fn can_encode(&self, kind: ImageKind) -> bool {
        ENCODE_CANDIDATES.contains(&kind) && !self.disabled.contains(&kind)
    }

    fn encode(
        &self,
        frame: &RasterFrame,
        options: &EncodeOptions,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<u8>, CodecError> {
        let kind = options.target;
        if !self.can_encode(kind) {
            return Err(CodecError::Unsupported(kind));
        }

        let image = match options.max_pixel_dimension {
            Some(max) => shrink_to(frame.image(), max),
            None => Cow::Borrowed(frame.image()),
        };
        let quality = options.quality.unwrap_or_default();

        let data = encode_pixels(&image, kind, quality)?;
        let exif_block = output_exif(&image, options, metadata)?;
        let icc_profile = metadata.and_then(|m| m.icc_profile.clone());
        attach_metadata(data, kind, exif_block, icc_profile)
    }
}
