//! Pixel-level comparison of two rasterized documents.
//!
//! The [`compare`] entry point runs one of three [`DiffMode`]s over a pair of
//! [`Bitmap`]s and produces a [`DiffResult`] with a mismatch count, the size of
//! the compared population, and a colour-coded diff bitmap (see [`DiffKind`]).
//! [`resemblance`] is an independent brightness-only similarity score that is
//! reported next to the primary score, never folded into it.

#![forbid(unsafe_code)]

mod antialias;
pub mod bitmap;
pub mod compare;
pub mod error;
pub mod legend;
pub mod resemble;

pub use bitmap::{Bitmap, Rgba};
pub use compare::{DiffMode, DiffOptions, DiffResult, MismatchBreakdown, compare};
pub use error::DiffError;
pub use legend::{DiffKind, EXCLUDED_COLOR};
pub use resemble::{ResembleOptions, Resemblance, resemblance};
