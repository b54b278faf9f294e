//! CLI output formatting.
//!
//! Every command's human-readable output is produced by a pure `format_*`
//! function returning display lines, so formatting is unit-testable without
//! capturing stdout. The `print_*` wrappers just write those lines.
//!
//! # Output Format
//!
//! ## shrink / reencode
//!
//! ```text
//! Shrinking 3 files
//! IMG_0001.heic → IMG_0001.jpg
//!     heic 4.1 MB → jpeg 612.0 KB (2000x1500)
//! broken.jpg → broken.jpg
//!     passed through: Unreadable image header: ...
//!
//! 2 re-encoded, 1 passed through, 0 failed
//! 8.2 MB → 1.3 MB
//! ```
//!
//! ## size
//!
//! ```text
//! Original:     4000 x 3000 (12000000 px)
//! Constrained:  2000 x 1500
//! Decoded:      2000 x 1500 (3000000 px, budget 15000000)
//! Max edge:     2000
//! ```
//!
//! ## inspect
//!
//! ```text
//! photo.jpg
//!     Format: jpeg (image/jpeg), 1.2 MB
//!     Dimensions: 4032 x 3024
//!     Orientation: 6
//!     Metadata: EXIF, ICC, GPS, preview
//! ```

use crate::imaging::PixelSize;
use crate::process::{BatchSummary, FileReport, FileStatus, ImageProperties, Mode, ProcessEvent};
use std::path::Path;

/// Format a byte count with a binary unit, e.g. `612.0 KB`.
pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// shrink / reencode
// ============================================================================

/// Format one file's result as display lines.
pub fn format_file_report(report: &FileReport) -> Vec<String> {
    let target = report
        .output
        .as_deref()
        .map(file_name)
        .unwrap_or_else(|| "(not written)".to_string());
    let mut lines = vec![format!("{} \u{2192} {}", file_name(&report.source), target)];

    match &report.status {
        FileStatus::Reencoded => {
            let dims = report
                .dimensions
                .map(|(w, h)| format!(" ({w}x{h})"))
                .unwrap_or_default();
            lines.push(format!(
                "    {} {} \u{2192} {} {}{}",
                report.input_kind,
                human_bytes(report.input_bytes),
                report.output_kind,
                human_bytes(report.output_bytes),
                dims
            ));
        }
        FileStatus::PassedThrough { reason } => {
            lines.push(format!("    passed through: {reason}"));
        }
        FileStatus::Failed { error } => {
            lines.push(format!("    failed: {error}"));
        }
    }
    lines
}

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { file_count, mode } => {
            let verb = match mode {
                Mode::Shrink => "Shrinking",
                Mode::Reencode => "Re-encoding",
            };
            let noun = if *file_count == 1 { "file" } else { "files" };
            vec![format!("{verb} {file_count} {noun}")]
        }
        ProcessEvent::FileProcessed(report) => format_file_report(report),
    }
}

/// Format batch totals.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "{} re-encoded, {} passed through, {} failed",
            summary.reencoded, summary.passed_through, summary.failed
        ),
        format!(
            "{} \u{2192} {}",
            human_bytes(summary.input_bytes),
            human_bytes(summary.output_bytes)
        ),
    ]
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// size
// ============================================================================

/// Format the stages of a size calculation.
pub fn format_size_report(
    original: PixelSize,
    constrained: PixelSize,
    decoded: PixelSize,
    pixel_budget: f64,
    max_edge: u32,
) -> Vec<String> {
    vec![
        format!(
            "Original:     {} x {} ({} px)",
            original.width,
            original.height,
            original.area()
        ),
        format!("Constrained:  {} x {}", constrained.width, constrained.height),
        format!(
            "Decoded:      {} x {} ({} px, budget {})",
            decoded.width,
            decoded.height,
            decoded.area(),
            pixel_budget
        ),
        format!("Max edge:     {max_edge}"),
    ]
}

// ============================================================================
// inspect
// ============================================================================

/// Format the header properties of one file.
pub fn format_properties(path: &Path, properties: &ImageProperties) -> Vec<String> {
    let mut lines = vec![path.display().to_string()];
    lines.push(format!(
        "    Format: {} ({}), {}",
        properties.kind,
        properties.kind.mime_type(),
        human_bytes(properties.byte_len)
    ));
    lines.push(match properties.dimensions {
        Some((w, h)) => format!("    Dimensions: {w} x {h}"),
        None => "    Dimensions: unreadable".to_string(),
    });
    if let Some(orientation) = properties.orientation {
        lines.push(format!("    Orientation: {orientation}"));
    }

    let present: Vec<&str> = [
        (properties.has_exif, "EXIF"),
        (properties.has_icc_profile, "ICC"),
        (properties.has_gps, "GPS"),
        (properties.has_embedded_thumbnail, "preview"),
    ]
    .into_iter()
    .filter_map(|(has, label)| has.then_some(label))
    .collect();
    lines.push(if present.is_empty() {
        "    Metadata: none".to_string()
    } else {
        format!("    Metadata: {}", present.join(", "))
    });
    lines
}

pub fn print_properties(path: &Path, properties: &ImageProperties) {
    for line in format_properties(path, properties) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageKind;
    use std::path::PathBuf;

    fn report(status: FileStatus) -> FileReport {
        FileReport {
            source: PathBuf::from("/photos/IMG_0001.heic"),
            output: Some(PathBuf::from("/out/IMG_0001.jpg")),
            input_kind: ImageKind::Heic,
            output_kind: ImageKind::Jpeg,
            input_bytes: 4 * 1024 * 1024,
            output_bytes: 612 * 1024,
            dimensions: Some((2000, 1500)),
            status,
        }
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1024), "1.0 KB");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn format_reencoded_file() {
        let lines = format_file_report(&report(FileStatus::Reencoded));
        assert_eq!(lines[0], "IMG_0001.heic \u{2192} IMG_0001.jpg");
        assert_eq!(lines[1], "    heic 4.0 MB \u{2192} jpeg 612.0 KB (2000x1500)");
    }

    #[test]
    fn format_passed_through_file() {
        let lines = format_file_report(&report(FileStatus::PassedThrough {
            reason: "Unreadable image header: eof".into(),
        }));
        assert_eq!(lines[1], "    passed through: Unreadable image header: eof");
    }

    #[test]
    fn format_failed_file_without_output() {
        let mut failed = report(FileStatus::Failed {
            error: "permission denied".into(),
        });
        failed.output = None;
        let lines = format_file_report(&failed);
        assert_eq!(lines[0], "IMG_0001.heic \u{2192} (not written)");
        assert_eq!(lines[1], "    failed: permission denied");
    }

    #[test]
    fn format_batch_started() {
        let event = ProcessEvent::BatchStarted {
            file_count: 3,
            mode: Mode::Shrink,
        };
        assert_eq!(format_process_event(&event), vec!["Shrinking 3 files"]);

        let event = ProcessEvent::BatchStarted {
            file_count: 1,
            mode: Mode::Reencode,
        };
        assert_eq!(format_process_event(&event), vec!["Re-encoding 1 file"]);
    }

    #[test]
    fn format_summary() {
        let summary = BatchSummary {
            reencoded: 2,
            passed_through: 1,
            failed: 0,
            input_bytes: 2048,
            output_bytes: 1024,
        };
        let lines = format_batch_summary(&summary);
        assert_eq!(lines[1], "2 re-encoded, 1 passed through, 0 failed");
        assert_eq!(lines[2], "2.0 KB \u{2192} 1.0 KB");
    }

    #[test]
    fn format_size_stages() {
        let lines = format_size_report(
            PixelSize::new(4000.0, 3000.0),
            PixelSize::new(2000.0, 1500.0),
            PixelSize::new(2000.0, 1500.0),
            15_000_000.0,
            2000,
        );
        assert_eq!(lines[0], "Original:     4000 x 3000 (12000000 px)");
        assert_eq!(lines[1], "Constrained:  2000 x 1500");
        assert_eq!(lines[2], "Decoded:      2000 x 1500 (3000000 px, budget 15000000)");
        assert_eq!(lines[3], "Max edge:     2000");
    }

    #[test]
    fn format_inspected_file() {
        let properties = ImageProperties {
            kind: ImageKind::Jpeg,
            byte_len: 2048,
            dimensions: Some((4032, 3024)),
            orientation: Some(6),
            has_exif: true,
            has_icc_profile: false,
            has_gps: true,
            has_embedded_thumbnail: false,
        };
        let lines = format_properties(Path::new("photo.jpg"), &properties);
        assert_eq!(
            lines,
            vec![
                "photo.jpg",
                "    Format: jpeg (image/jpeg), 2.0 KB",
                "    Dimensions: 4032 x 3024",
                "    Orientation: 6",
                "    Metadata: EXIF, GPS",
            ]
        );
    }

    #[test]
    fn format_unreadable_file() {
        let properties = ImageProperties {
            kind: ImageKind::Unknown,
            byte_len: 3,
            dimensions: None,
            orientation: None,
            has_exif: false,
            has_icc_profile: false,
            has_gps: false,
            has_embedded_thumbnail: false,
        };
        let lines = format_properties(Path::new("x.bin"), &properties);
        assert_eq!(lines[2], "    Dimensions: unreadable");
        assert_eq!(lines[3], "    Metadata: none");
    }
}
