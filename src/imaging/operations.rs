//! High-level image operations.
//!
//! These functions combine calculations with codec execution. They take
//! configuration, compute parameters, and call the codec:
//!
//! - [`extract_thumbnail`]: header → edge clamp → budget clamp → decode
//! - [`select_output_kind`]: which container a decoded frame is re-encoded into
//! - [`encode_with_fallback`]: preferred format, then [`ImageKind::UNIVERSAL_FALLBACK`]

use super::backend::{CodecError, CompressedImage, Dimensions, ImageCodec, Metadata, RasterFrame};
use super::calculations::{EdgeConstraint, PixelSize, calculate_decode_size, max_pixel_dimension};
use super::exif;
use super::params::{EncodeOptions, ImageKind, Quality, ThumbnailRequest};
use crate::process::ProcessError;
use tracing::{debug, info};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Configuration for thumbnail extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailConfig {
    pub pixel_budget: f64,
    pub preserve_orientation: bool,
    pub force_decode: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            pixel_budget: super::calculations::DEFAULT_PIXEL_BUDGET,
            preserve_orientation: false,
            force_decode: false,
        }
    }
}

/// A decoded, size-bounded frame plus what the encoder needs to know about
/// where it came from.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub frame: RasterFrame,
    pub source_kind: ImageKind,
    /// Source EXIF / ICC, `None` when the source carried neither.
    pub metadata: Option<Metadata>,
    /// Size the frame was requested at, before integer rounding.
    pub planned: PixelSize,
}

/// Read the declared pixel size without decoding.
pub fn identify(codec: &impl ImageCodec, source: &CompressedImage) -> Result<Dimensions> {
    codec
        .identify(source)
        .map_err(|e| ProcessError::UnreadableHeader(e.to_string()))
}

/// Compute the decode size for a source without touching the codec.
pub fn plan_thumbnail(
    original: Dimensions,
    constraint: &EdgeConstraint,
    pixel_budget: f64,
) -> PixelSize {
    calculate_decode_size(
        PixelSize::from((original.width, original.height)),
        *constraint,
        pixel_budget,
    )
}

/// Source metadata as it should be written to the output.
///
/// Unreadable metadata is dropped rather than failing the pipeline. When the
/// pixels were rotated upright, the stored orientation is reset to 1.
fn carried_metadata(
    codec: &impl ImageCodec,
    source: &CompressedImage,
    orientation_applied: bool,
) -> Option<Metadata> {
    let mut metadata = match &source.metadata {
        Some(metadata) => metadata.clone(),
        None => match codec.read_metadata(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(error = %e, "source metadata unreadable, dropping it");
                return None;
            }
        },
    };
    if orientation_applied {
        metadata.exif = metadata.exif.map(|block| exif::reset_orientation(&block));
    }
    (!metadata.is_empty()).then_some(metadata)
}

/// Produce a reduced-resolution frame from compressed bytes.
///
/// The requested size is the edge-constrained size, further clamped to
/// `config.pixel_budget` pixels. The frame is always decoded from the
/// primary image, never from an embedded preview.
pub fn extract_thumbnail(
    codec: &impl ImageCodec,
    source: &CompressedImage,
    constraint: &EdgeConstraint,
    config: &ThumbnailConfig,
) -> Result<Thumbnail> {
    let original = identify(codec, source)?;
    let planned = plan_thumbnail(original, constraint, config.pixel_budget);
    let max_pixel_size = max_pixel_dimension(planned);
    debug!(
        kind = %source.kind,
        width = original.width,
        height = original.height,
        target_width = planned.width,
        target_height = planned.height,
        max_pixel_size,
        "planned thumbnail"
    );

    let frame = codec.thumbnail(
        source,
        &ThumbnailRequest {
            max_pixel_size,
            apply_orientation: config.preserve_orientation,
            force_decode: config.force_decode,
        },
    )?;

    Ok(Thumbnail {
        frame,
        source_kind: source.kind,
        metadata: carried_metadata(codec, source, config.preserve_orientation),
        planned,
    })
}

/// Container a decoded frame from `source` is re-encoded into.
///
/// | Source | Output |
/// |---|---|
/// | GIF | GIF, quality ignored |
/// | PNG, JPEG | same as input |
/// | HEIC, AVIF | same as input, quality applies |
/// | anything else | [`ImageKind::UNIVERSAL_FALLBACK`] |
pub fn select_output_kind(source: ImageKind) -> ImageKind {
    match source {
        kind if kind.is_multi_frame_container() => kind,
        ImageKind::Png | ImageKind::Jpeg => source,
        kind if kind.is_high_efficiency() => kind,
        _ => ImageKind::UNIVERSAL_FALLBACK,
    }
}

/// Quality to request for `kind`; only lossy formats take one.
pub fn output_quality(kind: ImageKind, quality: Quality) -> Option<Quality> {
    kind.is_lossy().then_some(quality)
}

/// Outcome of one encode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeAttempt {
    Encoded(Vec<u8>),
    /// No encoder for the target exists on this runtime.
    Unsupported,
    /// The encoder existed but could not produce output.
    Failed(String),
}

/// Encode once, probing for the encoder first.
pub fn attempt_encode(
    codec: &impl ImageCodec,
    frame: &RasterFrame,
    options: &EncodeOptions,
    metadata: Option<&Metadata>,
) -> EncodeAttempt {
    if !codec.can_encode(options.target) {
        return EncodeAttempt::Unsupported;
    }
    match codec.encode(frame, options, metadata) {
        Ok(data) => EncodeAttempt::Encoded(data),
        Err(CodecError::Unsupported(_)) => EncodeAttempt::Unsupported,
        Err(e) => EncodeAttempt::Failed(e.to_string()),
    }
}

/// Formats to try, in order, for a preferred target.
pub fn encode_candidates(preferred: ImageKind) -> Vec<ImageKind> {
    if preferred == ImageKind::UNIVERSAL_FALLBACK {
        vec![preferred]
    } else {
        vec![preferred, ImageKind::UNIVERSAL_FALLBACK]
    }
}

/// Encode a frame, substituting the universal fallback format when the
/// preferred encoder is unavailable or fails.
///
/// Every candidate gets the same options and metadata; only the target
/// changes. Exhausting the candidates is the single terminal encode error.
pub fn encode_with_fallback(
    codec: &impl ImageCodec,
    frame: &RasterFrame,
    options: &EncodeOptions,
    metadata: Option<&Metadata>,
) -> Result<CompressedImage> {
    let mut reason = String::new();

    for target in encode_candidates(options.target) {
        let attempt_options = options.with_target(target);
        debug!(
            target = %target,
            width = frame.width(),
            height = frame.height(),
            "encoding"
        );
        match attempt_encode(codec, frame, &attempt_options, metadata) {
            EncodeAttempt::Encoded(data) => {
                if target != options.target {
                    info!(
                        preferred = %options.target,
                        fallback = %target,
                        "preferred encoder unavailable, used fallback"
                    );
                }
                return Ok(CompressedImage {
                    data,
                    kind: target,
                    metadata: None,
                });
            }
            EncodeAttempt::Unsupported => {
                debug!(target = %target, "no encoder available");
                reason = CodecError::Unsupported(target).to_string();
            }
            EncodeAttempt::Failed(message) => {
                debug!(target = %target, error = %message, "encode failed");
                reason = message;
            }
        }
    }

    Err(ProcessError::EncodingUnavailable {
        preferred: options.target,
        reason,
    })
}

/// Re-encode a decoded thumbnail in the container chosen by
/// [`select_output_kind`], carrying the source metadata.
///
/// GPS stripping is only requested when there is metadata to strip.
pub fn encode_thumbnail(
    codec: &impl ImageCodec,
    thumbnail: &Thumbnail,
    quality: Quality,
    embed_thumbnail: bool,
    strip_gps: bool,
) -> Result<CompressedImage> {
    let target = select_output_kind(thumbnail.source_kind);
    let options = EncodeOptions {
        quality: output_quality(target, quality),
        embed_thumbnail,
        strip_gps: strip_gps && thumbnail.metadata.is_some(),
        ..EncodeOptions::new(target)
    };
    encode_with_fallback(codec, &thumbnail.frame, &options, thumbnail.metadata.as_ref())
}

/// Re-encode a source image directly into `options.target`, capped at
/// `options.max_pixel_dimension`.
///
/// The source is decoded at the cap, with orientation left to the metadata.
pub fn encode_source(
    codec: &impl ImageCodec,
    source: &CompressedImage,
    options: &EncodeOptions,
) -> Result<CompressedImage> {
    let frame = codec.thumbnail(
        source,
        &ThumbnailRequest {
            max_pixel_size: options.max_pixel_dimension.unwrap_or(u32::MAX),
            apply_orientation: false,
            force_decode: false,
        },
    )?;
    let metadata = carried_metadata(codec, source, false);
    encode_with_fallback(codec, &frame, options, metadata.as_ref())
}
