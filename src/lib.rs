//! # Downsize
//!
//! Memory-bounded image downscaling and re-encoding. Give it compressed image
//! bytes (HEIC, JPEG, PNG, GIF, ...) and it returns a smaller re-encoded
//! buffer with the original metadata carried over, or the original bytes when
//! anything goes wrong.
//!
//! ```no_run
//! use downsize::imaging::EdgeConstraint;
//!
//! let photo = std::fs::read("IMG_0001.jpg").unwrap();
//! let smaller = downsize::downsize(photo, &EdgeConstraint::short_edge(1500.0));
//! std::fs::write("IMG_0001-small.jpg", smaller).unwrap();
//! ```
//!
//! # Architecture: Three Collaborating Components
//!
//! ```text
//! 1. Size       original + constraint  →  target size   (pure math)
//! 2. Thumbnail  bytes + target size    →  raster frame  (bounded decode)
//! 3. Encode     frame + metadata       →  bytes         (format fallback)
//! ```
//!
//! - **Dimension calculation** is a pair of pure functions: the edge clamp
//!   (short edge first, then long edge) and the pixel budget clamp. Neither
//!   ever enlarges.
//! - **Thumbnail extraction** reads only the header to learn the declared
//!   size, so the decode request is bounded before any pixels are touched.
//! - **Encoding** tries the preferred format and falls back to JPEG when that
//!   encoder is missing or fails.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | The pipeline: [`Downsizer`](process::Downsizer), pass-through wrapper, batch runner |
//! | [`imaging`] | Size math, codec trait, pure-Rust codec, EXIF editing, fallback loop |
//! | [`config`] | `downsize.toml` loading, layering, and validation |
//! | [`scan`] | Expands CLI paths into the list of image files |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Silent Degrade
//!
//! The convenience entry points never fail. Internally every step returns a
//! typed [`ProcessError`](process::ProcessError); the outer
//! [`Processed`](process::Processed) wrapper turns any error into
//! "return the input unchanged" and logs it at `warn`. Callers that need the
//! reason use the `try_*` methods.
//!
//! ## Codec Behind a Trait
//!
//! All pixel work goes through [`ImageCodec`](imaging::ImageCodec). The
//! production [`RustCodec`](imaging::RustCodec) is pure Rust (the `image`
//! crate, rav1e for AVIF, `img-parts` for metadata segments) with no system
//! libraries. Tests substitute a recording mock, which keeps the size and
//! fallback logic testable without encoding real images.
//!
//! ## HEIC
//!
//! HEIC input is recognized by its `ftyp` brand, but no pure-Rust HEVC codec
//! exists. HEIC sources pass through unchanged; HEIC targets report
//! "no encoder" and fall back to JPEG, exactly like a runtime without HEIF
//! support.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;

pub use process::{downsize, reencode};
