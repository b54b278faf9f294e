//! The downsize pipeline.
//!
//! Takes compressed image bytes and produces a smaller re-encoded buffer:
//!
//! ```text
//! bytes → identify (header only) → edge clamp → pixel budget clamp
//!       → thumbnail decode → format policy → encode (with JPEG fallback)
//! ```
//!
//! ## Entry Points
//!
//! - [`Downsizer::downsize`]: decode a bounded thumbnail, re-encode it in a
//!   container chosen from the source format (see
//!   [`select_output_kind`](crate::imaging::select_output_kind)).
//! - [`Downsizer::reencode`]: re-encode the source directly into the
//!   configured preferred format, capped at the computed size.
//!
//! Both are infallible: any failure returns the original bytes wrapped in
//! [`Processed::Original`]. The `try_*` variants expose the
//! [`ProcessError`] taxonomy instead.
//!
//! ## Batch Processing
//!
//! [`process_files`] runs the pipeline over many files in parallel using
//! [rayon](https://docs.rs/rayon), streaming a [`ProcessEvent`] per file to an
//! optional channel. Each file is an independent pipeline call.
//!
//! Outputs mirror the input tree under the output directory. Output paths are
//! planned before the parallel run (see [`plan_output_stems`]) so no two
//! inputs ever write the same file.

use crate::config::DownsizeConfig;
use crate::scan::InputFile;
use crate::imaging::{
    CodecError, CompressedImage, Dimensions, EdgeConstraint, EncodeOptions, ImageCodec, ImageKind,
    RustCodec, encode_source, encode_thumbnail, exif, extract_thumbnail, max_pixel_dimension,
    operations,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unreadable image header: {0}")]
    UnreadableHeader(String),
    #[error("Thumbnail generation failed: {0}")]
    ThumbnailGenerationFailed(#[from] CodecError),
    #[error("No usable encoder for {preferred}: {reason}")]
    EncodingUnavailable { preferred: ImageKind, reason: String },
}

/// Outcome of an infallible pipeline call.
#[derive(Debug)]
pub enum Processed {
    /// The image was re-encoded.
    Reencoded(CompressedImage),
    /// The pipeline failed; `data` is the untouched input.
    Original { data: Vec<u8>, reason: ProcessError },
}

impl Processed {
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Reencoded(image) => &image.data,
            Self::Original { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        match self {
            Self::Reencoded(image) => image.data,
            Self::Original { data, .. } => data,
        }
    }

    /// Container of the returned bytes.
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Reencoded(image) => image.kind,
            Self::Original { data, .. } => ImageKind::detect(data),
        }
    }

    pub fn is_reencoded(&self) -> bool {
        matches!(self, Self::Reencoded(_))
    }
}

/// Wrap a pipeline result, degrading to the original bytes on error.
fn or_original(data: Vec<u8>, result: Result<CompressedImage, ProcessError>) -> Processed {
    match result {
        Ok(image) => Processed::Reencoded(image),
        Err(reason) => {
            warn!(error = %reason, bytes = data.len(), "returning original image unchanged");
            Processed::Original { data, reason }
        }
    }
}

/// Runs the pipeline with one codec and one configuration.
///
/// Holds no per-call state, so a single `Downsizer` can serve concurrent
/// calls from many threads.
#[derive(Debug, Clone)]
pub struct Downsizer<C: ImageCodec = RustCodec> {
    codec: C,
    config: DownsizeConfig,
}

impl Downsizer<RustCodec> {
    pub fn new(config: DownsizeConfig) -> Self {
        Self::with_codec(RustCodec::new(), config)
    }
}

impl Default for Downsizer<RustCodec> {
    fn default() -> Self {
        Self::new(DownsizeConfig::default())
    }
}

impl<C: ImageCodec> Downsizer<C> {
    /// Use a specific codec (allows testing with mock).
    pub fn with_codec(codec: C, config: DownsizeConfig) -> Self {
        Self { codec, config }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &DownsizeConfig {
        &self.config
    }

    /// Thumbnail path: bounded decode, then re-encode in the policy-chosen
    /// container with the source metadata.
    pub fn try_downsize(
        &self,
        source: &CompressedImage,
        constraint: &EdgeConstraint,
    ) -> Result<CompressedImage, ProcessError> {
        let thumbnail = extract_thumbnail(
            &self.codec,
            source,
            constraint,
            &self.config.thumbnail_config(),
        )?;
        encode_thumbnail(
            &self.codec,
            &thumbnail,
            self.config.quality(),
            self.config.metadata.embed_thumbnail,
            self.config.metadata.strip_gps,
        )
    }

    /// [`try_downsize`](Self::try_downsize), returning the input unchanged
    /// on any failure.
    pub fn downsize(&self, data: Vec<u8>, constraint: &EdgeConstraint) -> Processed {
        let source = CompressedImage::from_bytes(data);
        let result = self.try_downsize(&source, constraint);
        or_original(source.data, result)
    }

    /// Source path: encode straight into the preferred format, capped at the
    /// longest edge of the computed size.
    pub fn try_reencode(
        &self,
        source: &CompressedImage,
        constraint: &EdgeConstraint,
    ) -> Result<CompressedImage, ProcessError> {
        let original = operations::identify(&self.codec, source)?;
        let planned = operations::plan_thumbnail(
            original,
            constraint,
            self.config.pixel_budget as f64,
        );
        let target = self.config.preferred_format;
        let options = EncodeOptions {
            quality: operations::output_quality(target, self.config.quality()),
            embed_thumbnail: self.config.metadata.embed_thumbnail,
            strip_gps: self.config.metadata.strip_gps,
            max_pixel_dimension: Some(max_pixel_dimension(planned)),
            ..EncodeOptions::new(target)
        };
        debug!(
            preferred = %target,
            max_pixel_dimension = ?options.max_pixel_dimension,
            "re-encoding source"
        );
        encode_source(&self.codec, source, &options)
    }

    /// [`try_reencode`](Self::try_reencode), returning the input unchanged
    /// on any failure.
    pub fn reencode(&self, data: Vec<u8>, constraint: &EdgeConstraint) -> Processed {
        let source = CompressedImage::from_bytes(data);
        let result = self.try_reencode(&source, constraint);
        or_original(source.data, result)
    }

    /// Header properties of any buffer; see [`inspect`].
    pub fn inspect(&self, data: &[u8]) -> ImageProperties {
        inspect_with(&self.codec, data)
    }
}

/// Downsize with the pure-Rust codec and stock configuration.
///
/// Never fails: returns the input unchanged when it cannot be processed.
pub fn downsize(data: Vec<u8>, constraint: &EdgeConstraint) -> Vec<u8> {
    Downsizer::default().downsize(data, constraint).into_data()
}

/// Re-encode into HEIC (JPEG where unavailable) with stock configuration.
///
/// Never fails: returns the input unchanged when it cannot be processed.
pub fn reencode(data: Vec<u8>, constraint: &EdgeConstraint) -> Vec<u8> {
    Downsizer::default().reencode(data, constraint).into_data()
}

// ============================================================================
// Inspection
// ============================================================================

/// Header-level properties of a compressed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageProperties {
    pub kind: ImageKind,
    pub byte_len: usize,
    /// `(width, height)`, `None` when the header is unreadable.
    pub dimensions: Option<(u32, u32)>,
    pub orientation: Option<u16>,
    pub has_exif: bool,
    pub has_icc_profile: bool,
    pub has_gps: bool,
    pub has_embedded_thumbnail: bool,
}

/// Read header properties and metadata presence without decoding pixels.
pub fn inspect(data: &[u8]) -> ImageProperties {
    inspect_with(&RustCodec::new(), data)
}

/// [`inspect`] with a specific codec.
pub fn inspect_with(codec: &impl ImageCodec, data: &[u8]) -> ImageProperties {
    let source = CompressedImage::from_bytes(data.to_vec());
    let dimensions = codec
        .identify(&source)
        .ok()
        .map(|Dimensions { width, height }| (width, height));
    let metadata = codec.read_metadata(&source).unwrap_or_default();
    let exif_block = metadata.exif.as_deref();

    ImageProperties {
        kind: source.kind,
        byte_len: data.len(),
        dimensions,
        orientation: metadata.orientation(),
        has_exif: exif_block.is_some(),
        has_icc_profile: metadata.icc_profile.is_some(),
        has_gps: metadata.has_gps(),
        has_embedded_thumbnail: exif_block.and_then(exif::read_thumbnail).is_some(),
    }
}

// ============================================================================
// Batch processing
// ============================================================================

/// Which entry point a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// [`Downsizer::downsize`]
    Shrink,
    /// [`Downsizer::reencode`]
    Reencode,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Reencoded,
    /// The pipeline failed and the original bytes were written.
    PassedThrough { reason: String },
    /// The file could not be read or written.
    Failed { error: String },
}

/// Per-file result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub input_kind: ImageKind,
    pub output_kind: ImageKind,
    pub input_bytes: usize,
    pub output_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Progress events streamed while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted { file_count: usize, mode: Mode },
    FileProcessed(FileReport),
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub reencoded: usize,
    pub passed_through: usize,
    pub failed: usize,
    pub input_bytes: usize,
    pub output_bytes: usize,
}

impl BatchSummary {
    fn from_reports(reports: &[FileReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            match report.status {
                FileStatus::Reencoded => summary.reencoded += 1,
                FileStatus::PassedThrough { .. } => summary.passed_through += 1,
                FileStatus::Failed { .. } => summary.failed += 1,
            }
            summary.input_bytes += report.input_bytes;
            summary.output_bytes += report.output_bytes;
            summary
        })
    }
}

/// Reports in input order, plus totals.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub files: Vec<FileReport>,
    pub summary: BatchSummary,
}

/// Output paths relative to the output directory, without extension, one per
/// input.
///
/// Inputs keep their directory below the scan root. Inputs whose stems clash
/// in one directory (`photo.jpg`, `photo.png`) all get their source extension
/// appended (`photo-jpg`, `photo-png`), whatever format they end up in. Any
/// clash left after that gets a numeric suffix in input order. Stems compare
/// case-insensitively.
pub fn plan_output_stems(inputs: &[InputFile]) -> Vec<PathBuf> {
    let key = |stem: &Path| stem.to_string_lossy().to_lowercase();
    let natural: Vec<PathBuf> = inputs
        .iter()
        .map(|input| input.relative.with_extension(""))
        .collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for stem in &natural {
        *counts.entry(key(stem)).or_default() += 1;
    }

    let mut taken = HashSet::new();
    inputs
        .iter()
        .zip(natural)
        .map(|(input, stem)| {
            let shared = counts.get(&key(&stem)).is_some_and(|&n| n > 1);
            let base = match input.relative.extension() {
                Some(ext) if shared => append(&stem, "-", ext),
                _ => stem,
            };
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(key(&candidate)) {
                candidate = append(&base, "-", OsStr::new(&n.to_string()));
                n += 1;
            }
            candidate
        })
        .collect()
}

fn append(path: &Path, separator: &str, suffix: &OsStr) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(separator);
    name.push(suffix);
    PathBuf::from(name)
}

/// Output path for a planned stem: `<stem>.<extension of kind>`.
///
/// Pass-through results keep the input's own extension.
pub fn output_file_name(stem: &Path, source: &Path, kind: Option<ImageKind>) -> PathBuf {
    let extension = match kind {
        Some(kind) => Some(OsStr::new(kind.extension())),
        None => source.extension(),
    };
    match extension {
        Some(ext) => append(stem, ".", ext),
        None => stem.to_path_buf(),
    }
}

fn process_file<C: ImageCodec>(
    downsizer: &Downsizer<C>,
    input: &InputFile,
    output_dir: &Path,
    output_stem: &Path,
    mode: Mode,
    constraint: &EdgeConstraint,
) -> FileReport {
    let source = input.path.as_path();
    let failed = |input_kind, input_bytes, error: std::io::Error| FileReport {
        source: source.to_path_buf(),
        output: None,
        input_kind,
        output_kind: input_kind,
        input_bytes,
        output_bytes: 0,
        dimensions: None,
        status: FileStatus::Failed {
            error: error.to_string(),
        },
    };

    let data = match std::fs::read(source) {
        Ok(data) => data,
        Err(e) => return failed(ImageKind::Unknown, 0, e),
    };
    let input_kind = ImageKind::detect(&data);
    let input_bytes = data.len();

    let processed = match mode {
        Mode::Shrink => downsizer.downsize(data, constraint),
        Mode::Reencode => downsizer.reencode(data, constraint),
    };

    let (output_image, file_name, status) = match processed {
        Processed::Reencoded(image) => {
            let file_name = output_file_name(output_stem, source, Some(image.kind));
            (image, file_name, FileStatus::Reencoded)
        }
        Processed::Original { data, reason } => (
            CompressedImage::from_bytes(data),
            output_file_name(output_stem, source, None),
            FileStatus::PassedThrough {
                reason: reason.to_string(),
            },
        ),
    };
    let output = output_dir.join(file_name);
    let dimensions = downsizer
        .codec()
        .identify(&output_image)
        .ok()
        .map(|d| (d.width, d.height));

    let written = match output.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
    .and_then(|()| std::fs::write(&output, &output_image.data));
    if let Err(e) = written {
        return failed(input_kind, input_bytes, e);
    }

    FileReport {
        source: source.to_path_buf(),
        output: Some(output),
        input_kind,
        output_kind: output_image.kind,
        input_bytes,
        output_bytes: output_image.data.len(),
        dimensions,
        status,
    }
}

/// Run the pipeline over `inputs` in parallel, writing results to `output_dir`.
///
/// Per-file failures are reported, never propagated; only creating the
/// output directory can fail the batch.
pub fn process_files<C: ImageCodec>(
    downsizer: &Downsizer<C>,
    inputs: &[InputFile],
    output_dir: &Path,
    mode: Mode,
    constraint: &EdgeConstraint,
    progress: Option<Sender<ProcessEvent>>,
) -> std::io::Result<BatchResult> {
    std::fs::create_dir_all(output_dir)?;

    if let Some(tx) = &progress {
        tx.send(ProcessEvent::BatchStarted {
            file_count: inputs.len(),
            mode,
        })
        .ok();
    }

    let stems = plan_output_stems(inputs);
    let files: Vec<FileReport> = inputs
        .par_iter()
        .zip(stems.par_iter())
        .map(|(input, stem)| {
            let report = process_file(downsizer, input, output_dir, stem, mode, constraint);
            if let Some(tx) = &progress {
                tx.send(ProcessEvent::FileProcessed(report.clone())).ok();
            }
            report
        })
        .collect();

    let summary = BatchSummary::from_reports(&files);
    Ok(BatchResult { files, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConstraintConfig, MetadataConfig};
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::imaging::{Metadata, Quality};
    use std::fs;
    use tempfile::TempDir;

    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
    const GIF_MAGIC: &[u8] = b"GIF89a\0\0\0\0";

    fn mock_downsizer(codec: MockCodec) -> Downsizer<MockCodec> {
        Downsizer::with_codec(codec, DownsizeConfig::default())
    }

    fn sample_metadata() -> Metadata {
        Metadata {
            exif: Some(exif::empty_exif()),
            icc_profile: None,
        }
    }

    // =========================================================================
    // Processed wrapper
    // =========================================================================

    #[test]
    fn processed_original_exposes_input() {
        let processed = Processed::Original {
            data: GIF_MAGIC.to_vec(),
            reason: ProcessError::UnreadableHeader("bad".into()),
        };
        assert!(!processed.is_reencoded());
        assert_eq!(processed.kind(), ImageKind::Gif);
        assert_eq!(processed.data(), GIF_MAGIC);
        assert_eq!(processed.into_data(), GIF_MAGIC);
    }

    #[test]
    fn error_messages() {
        let err = ProcessError::EncodingUnavailable {
            preferred: ImageKind::Heic,
            reason: "No jpeg encoder available".into(),
        };
        assert_eq!(
            err.to_string(),
            "No usable encoder for heic: No jpeg encoder available"
        );
        let err: ProcessError = CodecError::Decode("truncated".into()).into();
        assert!(matches!(err, ProcessError::ThumbnailGenerationFailed(_)));
    }

    // =========================================================================
    // downsize (thumbnail path)
    // =========================================================================

    #[test]
    fn downsize_jpeg_keeps_format() {
        let downsizer = mock_downsizer(MockCodec::with_dimensions(4000, 3000));
        let processed = downsizer.downsize(JPEG_MAGIC.to_vec(), &EdgeConstraint::short_edge(1500.0));

        assert!(processed.is_reencoded());
        assert_eq!(processed.kind(), ImageKind::Jpeg);
        assert_eq!(processed.data(), b"jpeg 2000x1500 q75");
    }

    #[test]
    fn downsize_gif_ignores_quality() {
        let downsizer = mock_downsizer(MockCodec::with_dimensions(100, 80));
        let processed = downsizer.downsize(GIF_MAGIC.to_vec(), &EdgeConstraint::unconstrained());
        assert_eq!(processed.data(), b"gif 100x80");
    }

    #[test]
    fn downsize_heic_falls_back_to_jpeg() {
        let mut heic = 24u32.to_be_bytes().to_vec();
        heic.extend_from_slice(b"ftypheic\0\0\0\0mif1heic");
        let codec = MockCodec::with_dimensions(300, 200).without_encoders(&[ImageKind::Heic]);
        let downsizer = mock_downsizer(codec);

        let processed = downsizer.downsize(heic, &EdgeConstraint::unconstrained());
        assert_eq!(processed.kind(), ImageKind::Jpeg);
        assert_eq!(processed.data(), b"jpeg 300x200 q75");
    }

    #[test]
    fn downsize_uses_config() {
        let config = DownsizeConfig {
            pixel_budget: 10_000,
            quality: 0.5,
            preserve_orientation: true,
            force_decode: true,
            metadata: MetadataConfig {
                embed_thumbnail: false,
                strip_gps: true,
            },
            ..DownsizeConfig::default()
        };
        let codec = MockCodec::with_dimensions(400, 100).with_metadata(sample_metadata());
        let downsizer = Downsizer::with_codec(codec, config);

        let processed = downsizer.downsize(JPEG_MAGIC.to_vec(), &EdgeConstraint::unconstrained());
        // sqrt(40_000 / 10_000) = 2 → 200x50
        assert_eq!(processed.data(), b"jpeg 200x50 q50 exif");

        let ops = downsizer.codec().get_operations();
        assert!(ops.contains(&RecordedOp::Thumbnail {
            max_pixel_size: 200,
            apply_orientation: true,
            force_decode: true,
        }));
        assert!(ops.contains(&RecordedOp::Encode {
            target: ImageKind::Jpeg,
            width: 200,
            height: 50,
            quality: Some(50),
            embed_thumbnail: false,
            strip_gps: true,
            with_metadata: true,
        }));
    }

    #[test]
    fn downsize_unreadable_header_returns_original() {
        let downsizer = mock_downsizer(MockCodec::new());
        let input = b"corrupt".to_vec();
        let processed = downsizer.downsize(input.clone(), &EdgeConstraint::short_edge(100.0));

        assert!(matches!(
            processed,
            Processed::Original {
                reason: ProcessError::UnreadableHeader(_),
                ..
            }
        ));
        assert_eq!(processed.into_data(), input);
    }

    #[test]
    fn downsize_encoding_unavailable_returns_original() {
        let codec = MockCodec::with_dimensions(10, 10).without_encoders(&[ImageKind::Jpeg]);
        let downsizer = mock_downsizer(codec);
        let processed = downsizer.downsize(JPEG_MAGIC.to_vec(), &EdgeConstraint::unconstrained());
        assert!(matches!(
            processed,
            Processed::Original {
                reason: ProcessError::EncodingUnavailable { .. },
                ..
            }
        ));
        assert_eq!(processed.data(), JPEG_MAGIC);
    }

    #[test]
    fn try_downsize_surfaces_thumbnail_failure() {
        let codec = MockCodec {
            fail_thumbnail: true,
            ..MockCodec::with_dimensions(10, 10)
        };
        let downsizer = mock_downsizer(codec);
        let source = CompressedImage::from_bytes(JPEG_MAGIC.to_vec());
        let result = downsizer.try_downsize(&source, &EdgeConstraint::unconstrained());
        assert!(matches!(result, Err(ProcessError::ThumbnailGenerationFailed(_))));
    }

    // =========================================================================
    // reencode (source path)
    // =========================================================================

    #[test]
    fn reencode_targets_preferred_format() {
        let config = DownsizeConfig {
            preferred_format: ImageKind::Avif,
            ..DownsizeConfig::default()
        };
        let downsizer = Downsizer::with_codec(MockCodec::with_dimensions(4000, 3000), config);
        let processed = downsizer.reencode(JPEG_MAGIC.to_vec(), &EdgeConstraint::short_edge(1500.0));

        assert_eq!(processed.kind(), ImageKind::Avif);
        assert_eq!(processed.data(), b"avif 2000x1500 q75");
        assert!(downsizer.codec().get_operations().contains(&RecordedOp::Thumbnail {
            max_pixel_size: 2000,
            apply_orientation: false,
            force_decode: false,
        }));
    }

    #[test]
    fn reencode_default_heic_falls_back_on_old_runtime() {
        let codec = MockCodec::with_dimensions(4000, 3000)
            .with_metadata(sample_metadata())
            .without_encoders(&[ImageKind::Heic]);
        let downsizer = mock_downsizer(codec);
        let processed = downsizer.reencode(JPEG_MAGIC.to_vec(), &EdgeConstraint::short_edge(1500.0));

        assert_eq!(processed.data(), b"jpeg 2000x1500 q75 exif");
        assert!(downsizer.codec().get_operations().contains(&RecordedOp::Encode {
            target: ImageKind::Jpeg,
            width: 2000,
            height: 1500,
            quality: Some(75),
            embed_thumbnail: true,
            strip_gps: true,
            with_metadata: true,
        }));
    }

    #[test]
    fn reencode_unreadable_header_returns_original() {
        let downsizer = mock_downsizer(MockCodec::new());
        let processed = downsizer.reencode(b"??".to_vec(), &EdgeConstraint::unconstrained());
        assert!(!processed.is_reencoded());
        assert_eq!(processed.data(), b"??");
    }

    // =========================================================================
    // inspect
    // =========================================================================

    #[test]
    fn inspect_reports_metadata_presence() {
        let codec = MockCodec::with_dimensions(64, 48).with_metadata(sample_metadata());
        let properties = inspect_with(&codec, JPEG_MAGIC);
        assert_eq!(
            properties,
            ImageProperties {
                kind: ImageKind::Jpeg,
                byte_len: JPEG_MAGIC.len(),
                dimensions: Some((64, 48)),
                orientation: None,
                has_exif: true,
                has_icc_profile: false,
                has_gps: false,
                has_embedded_thumbnail: false,
            }
        );
    }

    #[test]
    fn inspect_unreadable_has_no_dimensions() {
        let properties = inspect_with(&MockCodec::new(), b"nope");
        assert_eq!(properties.kind, ImageKind::Unknown);
        assert_eq!(properties.dimensions, None);
    }

    // =========================================================================
    // Batch processing
    // =========================================================================

    fn scanned(relative: &str) -> InputFile {
        InputFile {
            path: Path::new("/in").join(relative),
            relative: PathBuf::from(relative),
        }
    }

    #[test]
    fn output_file_names() {
        assert_eq!(
            output_file_name(
                Path::new("IMG_001"),
                Path::new("/in/IMG_001.HEIC"),
                Some(ImageKind::Jpeg)
            ),
            PathBuf::from("IMG_001.jpg")
        );
        assert_eq!(
            output_file_name(
                Path::new("sub/photo"),
                Path::new("/in/sub/photo.png"),
                Some(ImageKind::Png)
            ),
            PathBuf::from("sub/photo.png")
        );
        assert_eq!(
            output_file_name(Path::new("broken"), Path::new("/in/broken.jpeg"), None),
            PathBuf::from("broken.jpeg")
        );
        // Dots in a planned stem are not mistaken for an extension
        assert_eq!(
            output_file_name(
                Path::new("v1.2-png"),
                Path::new("/in/v1.2.png"),
                Some(ImageKind::Jpeg)
            ),
            PathBuf::from("v1.2-png.jpg")
        );
    }

    #[test]
    fn output_stems_mirror_input_tree() {
        let stems = plan_output_stems(&[
            scanned("a.jpg"),
            scanned("sub/a.jpg"),
            scanned("sub/deeper/b.heic"),
        ]);
        assert_eq!(
            stems,
            vec![
                PathBuf::from("a"),
                PathBuf::from("sub/a"),
                PathBuf::from("sub/deeper/b"),
            ]
        );
    }

    #[test]
    fn output_stems_disambiguate_same_stem_inputs() {
        let stems = plan_output_stems(&[
            scanned("Photo.PNG"),
            scanned("photo.jpg"),
            scanned("photo-jpg.gif"),
            scanned("solo.png"),
        ]);
        assert_eq!(
            stems,
            vec![
                PathBuf::from("Photo-PNG"),
                PathBuf::from("photo-jpg"),
                PathBuf::from("photo-jpg-2"),
                PathBuf::from("solo"),
            ]
        );
    }

    #[test]
    fn same_stem_inputs_write_distinct_outputs() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("in");
        let output_dir = tmp.path().join("out");
        fs::create_dir_all(input_dir.join("sub")).unwrap();
        fs::write(input_dir.join("photo.jpg"), JPEG_MAGIC).unwrap();
        fs::write(input_dir.join("photo.png"), b"\x89PNG\r\n\x1a\n").unwrap();
        fs::write(input_dir.join("sub/photo.jpg"), JPEG_MAGIC).unwrap();

        let config = DownsizeConfig {
            preferred_format: ImageKind::Jpeg,
            ..DownsizeConfig::default()
        };
        let downsizer = Downsizer::with_codec(MockCodec::with_dimensions(40, 30), config);
        let inputs = crate::scan::collect_inputs(&[input_dir]).unwrap();
        let result = process_files(
            &downsizer,
            &inputs,
            &output_dir,
            Mode::Reencode,
            &EdgeConstraint::unconstrained(),
            None,
        )
        .unwrap();

        let outputs: Vec<PathBuf> = result
            .files
            .iter()
            .map(|report| report.output.clone().unwrap())
            .collect();
        assert_eq!(
            outputs,
            vec![
                output_dir.join("photo-jpg.jpg"),
                output_dir.join("photo-png.jpg"),
                output_dir.join("sub/photo.jpg"),
            ]
        );
        for output in &outputs {
            assert!(output.is_file(), "{} missing", output.display());
        }
        assert_eq!(result.summary.reencoded, 3);
    }

    #[test]
    fn batch_summary_counts() {
        let report = |status, bytes| FileReport {
            source: PathBuf::from("a"),
            output: None,
            input_kind: ImageKind::Jpeg,
            output_kind: ImageKind::Jpeg,
            input_bytes: bytes,
            output_bytes: bytes / 2,
            dimensions: None,
            status,
        };
        let summary = BatchSummary::from_reports(&[
            report(FileStatus::Reencoded, 100),
            report(FileStatus::Reencoded, 50),
            report(
                FileStatus::PassedThrough {
                    reason: "x".into(),
                },
                10,
            ),
            report(FileStatus::Failed { error: "y".into() }, 0),
        ]);
        assert_eq!(
            summary,
            BatchSummary {
                reencoded: 2,
                passed_through: 1,
                failed: 1,
                input_bytes: 160,
                output_bytes: 80,
            }
        );
    }

    #[test]
    fn process_files_writes_outputs_and_events() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("in");
        let output_dir = tmp.path().join("out");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(input_dir.join("a.jpg"), JPEG_MAGIC).unwrap();
        fs::write(input_dir.join("b.jpg"), b"corrupt").unwrap();

        let config = DownsizeConfig {
            constraint: ConstraintConfig {
                short_edge: Some(1500.0),
                long_edge: None,
            },
            ..DownsizeConfig::default()
        };
        let downsizer = Downsizer::with_codec(MockCodec::with_dimensions(4000, 3000), config);
        let inputs = vec![
            InputFile::standalone(input_dir.join("a.jpg")),
            InputFile::standalone(input_dir.join("b.jpg")),
        ];
        let constraint = downsizer.config().edge_constraint();

        let (tx, rx) = std::sync::mpsc::channel();
        let result = process_files(&downsizer, &inputs, &output_dir, Mode::Shrink, &constraint, Some(tx))
            .unwrap();
        let events: Vec<ProcessEvent> = rx.iter().collect();

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            ProcessEvent::BatchStarted {
                file_count: 2,
                mode: Mode::Shrink
            }
        ));

        assert_eq!(result.files[0].status, FileStatus::Reencoded);
        assert_eq!(result.files[0].output, Some(output_dir.join("a.jpg")));
        assert_eq!(fs::read(output_dir.join("a.jpg")).unwrap(), b"jpeg 2000x1500 q75");

        // Unknown containers are re-encoded as JPEG
        assert_eq!(result.files[1].input_kind, ImageKind::Unknown);
        assert_eq!(result.files[1].output_kind, ImageKind::Jpeg);
        assert_eq!(result.summary.reencoded, 2);
    }

    #[test]
    fn process_files_reports_missing_input() {
        let tmp = TempDir::new().unwrap();
        let downsizer = mock_downsizer(MockCodec::with_dimensions(10, 10));
        let result = process_files(
            &downsizer,
            &[InputFile::standalone(tmp.path().join("missing.jpg"))],
            &tmp.path().join("out"),
            Mode::Reencode,
            &EdgeConstraint::unconstrained(),
            None,
        )
        .unwrap();
        assert!(matches!(result.files[0].status, FileStatus::Failed { .. }));
        assert_eq!(result.summary.failed, 1);
    }

    #[test]
    fn quality_from_config_factor() {
        let config = DownsizeConfig {
            quality: 0.42,
            ..DownsizeConfig::default()
        };
        assert_eq!(config.quality(), Quality::new(42));
    }
}
