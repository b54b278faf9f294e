//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! The two clamps that decide how large a decoded thumbnail may get are kept
//! separate and composed in sequence by [`calculate_decode_size`]:
//!
//! ```text
//! original ──► calculate_target_size (edge constraint) ──► clamp_to_pixel_budget ──► decode size
//! ```

/// Default ceiling on decoded pixels: roughly a 5000×3000 image.
pub const DEFAULT_PIXEL_BUDGET: f64 = 15_000_000.0;

/// Image size in pixels. Fractional values are valid intermediate results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

impl PixelSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn short_edge(self) -> f64 {
        self.width.min(self.height)
    }

    pub fn long_edge(self) -> f64 {
        self.width.max(self.height)
    }

    pub fn area(self) -> f64 {
        self.width * self.height
    }

    fn scaled_by(self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

impl From<(u32, u32)> for PixelSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Maximum short-edge and/or long-edge length in pixels.
///
/// Both edges absent means "leave the size alone".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeConstraint {
    pub short_edge: Option<f64>,
    pub long_edge: Option<f64>,
}

impl EdgeConstraint {
    pub fn new(short_edge: Option<f64>, long_edge: Option<f64>) -> Self {
        Self {
            short_edge,
            long_edge,
        }
    }

    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn short_edge(pixels: f64) -> Self {
        Self::new(Some(pixels), None)
    }

    pub fn long_edge(pixels: f64) -> Self {
        Self::new(None, Some(pixels))
    }

    /// Build a pixel constraint from lengths in points on a display with the
    /// given pixel density (e.g. `3.0` on a @3x screen).
    ///
    /// ```
    /// # use downsize::imaging::EdgeConstraint;
    /// let c = EdgeConstraint::from_points(Some(100.0), None, 3.0);
    /// assert_eq!(c.short_edge, Some(300.0));
    /// assert_eq!(c.long_edge, None);
    /// ```
    pub fn from_points(short_edge: Option<f64>, long_edge: Option<f64>, device_scale: f64) -> Self {
        Self::new(
            short_edge.map(|pt| pt * device_scale),
            long_edge.map(|pt| pt * device_scale),
        )
    }

    /// True when at least one edge is set and every set edge is positive.
    pub fn is_active(&self) -> bool {
        let any = self.short_edge.is_some() || self.long_edge.is_some();
        let valid = [self.short_edge, self.long_edge]
            .into_iter()
            .flatten()
            .all(|edge| edge > 0.0);
        any && valid
    }
}

/// Calculate the target size for an edge constraint.
///
/// The short-edge constraint is applied first; the long-edge constraint is
/// then checked against the already-shrunk size. Constraints only ever shrink.
/// A missing or non-positive constraint returns `original` untouched. No
/// rounding happens here.
///
/// # Examples
/// ```
/// # use downsize::imaging::{EdgeConstraint, PixelSize, calculate_target_size};
/// // 4000x3000 with short edge 1500 → 2000x1500
/// let size = calculate_target_size(
///     PixelSize::new(4000.0, 3000.0),
///     EdgeConstraint::short_edge(1500.0),
/// );
/// assert_eq!(size, PixelSize::new(2000.0, 1500.0));
/// ```
pub fn calculate_target_size(original: PixelSize, constraint: EdgeConstraint) -> PixelSize {
    if !constraint.is_active() {
        return original;
    }

    let mut size = original;

    if let Some(short) = constraint.short_edge.filter(|&s| s < size.short_edge()) {
        size = size.scaled_by(short / size.short_edge());
    }

    if let Some(long) = constraint.long_edge.filter(|&l| l < size.long_edge()) {
        size = size.scaled_by(long / size.long_edge());
    }

    size
}

/// Shrink `size` so its area fits inside `budget` pixels.
///
/// Only fires when the area exceeds the budget. Both axes are divided by
/// `sqrt(area / budget)` and floored to whole pixels, so the result is never
/// larger than the budget. A non-positive budget disables the clamp.
pub fn clamp_to_pixel_budget(size: PixelSize, budget: f64) -> PixelSize {
    let area = size.area();
    if budget <= 0.0 || area <= budget {
        return size;
    }

    let scale = (area / budget).sqrt();
    PixelSize {
        width: (size.width / scale).floor(),
        height: (size.height / scale).floor(),
    }
}

/// Size the decoder should aim for: edge constraint first, pixel budget second.
pub fn calculate_decode_size(original: PixelSize, constraint: EdgeConstraint, budget: f64) -> PixelSize {
    clamp_to_pixel_budget(calculate_target_size(original, constraint), budget)
}

/// The max-dimension value handed to a thumbnail decoder for `size`.
///
/// Rounded to the nearest pixel and never below 1.
pub fn max_pixel_dimension(size: PixelSize) -> u32 {
    size.long_edge().round().max(1.0) as u32
}

/// Fit `(width, height)` inside a `max_dimension` square, preserving aspect.
///
/// Returns the input unchanged when it already fits, so callers never upscale.
pub fn fit_within(dimensions: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = dimensions;
    let longer = w.max(h);
    if max_dimension == 0 || longer <= max_dimension {
        return dimensions;
    }

    let ratio = max_dimension as f64 / longer as f64;
    if w >= h {
        (max_dimension, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), max_dimension)
    }
}
