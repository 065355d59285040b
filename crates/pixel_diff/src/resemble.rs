//! Perceptual resemblance: a brightness-based similarity that forgives hue
//! changes and anti-aliasing noise.

use crate::antialias::is_antialiased;
use crate::bitmap::{Bitmap, Rgba, over_white};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tolerances of the resemblance comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResembleOptions {
    /// Compare brightness only, ignoring hue.
    pub ignore_colors: bool,
    /// Treat mismatches on anti-aliased edges as matches.
    pub ignore_antialiasing: bool,
    /// Tolerated brightness difference, on the `0..=255` scale.
    pub brightness_tolerance: u8,
    /// Tolerated alpha difference, on the `0..=255` scale.
    pub alpha_tolerance: u8,
}

impl Default for ResembleOptions {
    fn default() -> Self {
        Self {
            ignore_colors: true,
            ignore_antialiasing: true,
            brightness_tolerance: 16,
            alpha_tolerance: 16,
        }
    }
}

/// Outcome of a resemblance comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resemblance {
    pub width: u32,
    pub height: u32,
    /// Share of mismatching pixels, in `0..=100`.
    pub mismatch_percentage: f64,
    /// `round(100 - mismatch_percentage)`.
    pub score: u8,
    pub diagnostic: Option<String>,
}

#[inline]
fn brightness(pixel: Rgba) -> f64 {
    let [red, green, blue] = over_white(pixel);
    0.3 * red + 0.59 * green + 0.11 * blue
}

fn pixels_resemble(left: Rgba, right: Rgba, options: &ResembleOptions) -> bool {
    let alpha_ok = left[3].abs_diff(right[3]) <= options.alpha_tolerance;
    let tolerance = f64::from(options.brightness_tolerance);
    if options.ignore_colors {
        return alpha_ok && (brightness(left) - brightness(right)).abs() <= tolerance;
    }
    let lhs = over_white(left);
    let rhs = over_white(right);
    alpha_ok
        && lhs
            .iter()
            .zip(rhs.iter())
            .all(|(one, two)| (one - two).abs() <= tolerance)
}

/// Scores how much `submission` resembles `reference`.
///
/// Mismatched sizes are clipped to the shared area; an empty shared area scores zero.
pub fn resemblance(submission: &Bitmap, reference: &Bitmap, options: &ResembleOptions) -> Resemblance {
    let width = submission.width().min(reference.width());
    let height = submission.height().min(reference.height());
    if width == 0 || height == 0 {
        return Resemblance {
            width,
            height,
            mismatch_percentage: 100.0,
            score: 0,
            diagnostic: Some("no shared area to compare".to_owned()),
        };
    }

    let diagnostic = (submission.width() != reference.width()
        || submission.height() != reference.height())
    .then(|| {
        format!(
            "dimension mismatch: submission {}x{}, reference {}x{}; compared shared {width}x{height}",
            submission.width(),
            submission.height(),
            reference.width(),
            reference.height()
        )
    });
    let submission = submission.clipped(width, height);
    let reference = reference.clipped(width, height);

    let mut mismatches: u64 = 0;
    for y in 0..height {
        for x in 0..width {
            let left = submission.pixel(x, y);
            let right = reference.pixel(x, y);
            if pixels_resemble(left, right, options) {
                continue;
            }
            if options.ignore_antialiasing
                && (is_antialiased(&submission, x, y, &reference)
                    || is_antialiased(&reference, x, y, &submission))
            {
                continue;
            }
            mismatches += 1;
        }
    }

    let total = u64::from(width) * u64::from(height);
    let mismatch_percentage = 100.0 * mismatches as f64 / total as f64;
    let score = (100.0 - mismatch_percentage).round().clamp(0.0, 100.0) as u8;
    debug!("resemblance {width}x{height}: {mismatch_percentage:.2}% mismatch, score {score}");

    Resemblance {
        width,
        height,
        mismatch_percentage,
        score,
        diagnostic,
    }
}
