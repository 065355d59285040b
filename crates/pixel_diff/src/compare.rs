//! The three comparison modes of the difference engine.
//!
//! Every mode walks the pixel pairs of the shared area of both bitmaps.
//! A pair is first tested for membership of the compared population:
//!
//! - [`DiffMode::Raw`]: every pair.
//! - [`DiffMode::ContentAware`]: every pair except those where both pixels are
//!   near-white background.
//! - [`DiffMode::Layout`]: only pairs where at least one pixel is near-black,
//!   the colour every structural element takes after layout normalization.
//!
//! Members are then compared channel by channel against the sensitivity
//! threshold. Excluded pairs are painted [`EXCLUDED_COLOR`] in the diff bitmap
//! and never touch the denominator.

use crate::antialias::is_antialiased;
use crate::bitmap::{Bitmap, Rgba, over_white};
use crate::legend::{DiffKind, EXCLUDED_COLOR};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Channel floor above which a composited pixel counts as background white.
const NEAR_WHITE_MIN: f64 = 250.0;
/// Channel ceiling below which a pixel counts as structural black.
const NEAR_BLACK_MAX: u8 = 50;
/// Alpha floor for a pixel to count as structural black.
const NEAR_BLACK_MIN_ALPHA: u8 = 128;

/// Which pixel pairs enter the compared population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    Raw,
    ContentAware,
    Layout,
}

impl DiffMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::ContentAware => "content",
            Self::Layout => "layout",
        }
    }

    /// Whether one pixel carries content under this mode's notion of background.
    #[inline]
    fn has_content(self, pixel: Rgba) -> bool {
        match self {
            Self::Raw | Self::ContentAware => !is_near_white(pixel),
            Self::Layout => is_near_black(pixel),
        }
    }

    #[inline]
    fn includes(self, submission: Rgba, reference: Rgba) -> bool {
        match self {
            Self::Raw => true,
            Self::ContentAware | Self::Layout => {
                self.has_content(submission) || self.has_content(reference)
            }
        }
    }
}

/// Sensitivity settings shared by all modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Largest tolerated per-channel difference as a fraction of the channel range.
    pub threshold: f64,
    /// Forgive mismatches that sit on an anti-aliased edge.
    pub ignore_antialiasing: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            ignore_antialiasing: true,
        }
    }
}

impl DiffOptions {
    #[inline]
    fn channel_tolerance(&self) -> f64 {
        self.threshold.clamp(0.0, 1.0) * 255.0
    }
}

/// Mismatch counts split by legend entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MismatchBreakdown {
    pub excess: u64,
    pub missing: u64,
    pub altered: u64,
}

impl MismatchBreakdown {
    fn record(&mut self, kind: DiffKind) {
        match kind {
            DiffKind::Excess => self.excess += 1,
            DiffKind::Missing => self.missing += 1,
            DiffKind::Altered => self.altered += 1,
            DiffKind::Match => {}
        }
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub mode: DiffMode,
    /// Width of the compared area after clipping.
    pub width: u32,
    /// Height of the compared area after clipping.
    pub height: u32,
    pub mismatch_count: u64,
    pub total_compared_pixels: u64,
    /// `100 * (1 - mismatch_count / total_compared_pixels)`; `100` for an empty population.
    pub match_percentage: f64,
    pub breakdown: MismatchBreakdown,
    /// Human-readable note when the inputs had to be clipped or could not be compared.
    pub diagnostic: Option<String>,
    #[serde(skip)]
    pub diff_bitmap: Bitmap,
}

impl DiffResult {
    /// Result for a comparison that could not run: zero match and a placeholder diff.
    pub fn sentinel(mode: DiffMode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            width: 0,
            height: 0,
            mismatch_count: 0,
            total_compared_pixels: 0,
            match_percentage: 0.0,
            breakdown: MismatchBreakdown::default(),
            diagnostic: Some(reason.into()),
            diff_bitmap: Bitmap::diagnostic_placeholder(),
        }
    }

    /// `true` when this is a [`DiffResult::sentinel`] rather than a measurement.
    pub fn is_sentinel(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Match percentage rounded for display, in `0..=100`.
    pub fn score(&self) -> u8 {
        self.match_percentage.round().clamp(0.0, 100.0) as u8
    }
}

/// `true` when every channel, composited over white, is at least 250.
#[inline]
pub fn is_near_white(pixel: Rgba) -> bool {
    over_white(pixel)
        .iter()
        .all(|channel| *channel >= NEAR_WHITE_MIN)
}

/// `true` when every colour channel is below 50 and the pixel is mostly opaque.
#[inline]
pub fn is_near_black(pixel: Rgba) -> bool {
    pixel[3] > NEAR_BLACK_MIN_ALPHA && pixel[..3].iter().all(|channel| *channel < NEAR_BLACK_MAX)
}

#[inline]
fn within_threshold(submission: Rgba, reference: Rgba, tolerance: f64) -> bool {
    let left = over_white(submission);
    let right = over_white(reference);
    let colour_ok = left
        .iter()
        .zip(right.iter())
        .all(|(lhs, rhs)| (lhs - rhs).abs() <= tolerance);
    let alpha_delta = f64::from(submission[3].abs_diff(reference[3]));
    colour_ok && alpha_delta <= tolerance
}

/// Compares `submission` against `reference`.
///
/// Bitmaps of different sizes are clipped to their shared top-left area. If that
/// area is empty a [`DiffResult::sentinel`] is returned; this function never fails.
pub fn compare(submission: &Bitmap, reference: &Bitmap, mode: DiffMode, options: &DiffOptions) -> DiffResult {
    let width = submission.width().min(reference.width());
    let height = submission.height().min(reference.height());
    if width == 0 || height == 0 {
        let reason = format!(
            "cannot compare {}x{} against {}x{}: no shared area",
            submission.width(),
            submission.height(),
            reference.width(),
            reference.height()
        );
        warn!("{} diff: {reason}", mode.name());
        return DiffResult::sentinel(mode, reason);
    }

    let mut diagnostic = None;
    let (left, right);
    let (submission, reference) = if submission.width() == reference.width()
        && submission.height() == reference.height()
    {
        (submission, reference)
    } else {
        let note = format!(
            "dimension mismatch: submission {}x{}, reference {}x{}; compared shared {width}x{height}",
            submission.width(),
            submission.height(),
            reference.width(),
            reference.height()
        );
        warn!("{} diff: {note}", mode.name());
        diagnostic = Some(note);
        left = submission.clipped(width, height);
        right = reference.clipped(width, height);
        (&left, &right)
    };

    let tolerance = options.channel_tolerance();
    let mut diff_bitmap = Bitmap::white(width, height);
    let mut breakdown = MismatchBreakdown::default();
    let mut total: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            let sub_px = submission.pixel(x, y);
            let ref_px = reference.pixel(x, y);
            if !mode.includes(sub_px, ref_px) {
                diff_bitmap.put_pixel(x, y, EXCLUDED_COLOR);
                continue;
            }
            total += 1;

            let matched = within_threshold(sub_px, ref_px, tolerance)
                || (options.ignore_antialiasing
                    && (is_antialiased(submission, x, y, reference)
                        || is_antialiased(reference, x, y, submission)));
            let kind = if matched {
                DiffKind::Match
            } else {
                DiffKind::for_mismatch(mode.has_content(sub_px), mode.has_content(ref_px))
            };
            breakdown.record(kind);
            diff_bitmap.put_pixel(x, y, kind.color());
        }
    }

    let mismatch_count = breakdown.excess + breakdown.missing + breakdown.altered;
    let match_percentage = if total == 0 {
        100.0
    } else {
        100.0 * (1.0 - mismatch_count as f64 / total as f64)
    };
    debug!(
        "{} diff {width}x{height}: {mismatch_count}/{total} mismatched ({match_percentage:.2}% match)",
        mode.name()
    );

    DiffResult {
        mode,
        width,
        height,
        mismatch_count,
        total_compared_pixels: total,
        match_percentage,
        breakdown,
        diagnostic,
        diff_bitmap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba = [0, 0, 0, 255];
    const RED: Rgba = [255, 0, 0, 255];

    fn strict() -> DiffOptions {
        DiffOptions {
            threshold: 0.15,
            ignore_antialiasing: false,
        }
    }

    #[test]
    fn near_white_composites_alpha() {
        assert!(is_near_white([255, 255, 255, 255]));
        assert!(is_near_white([250, 251, 252, 255]));
        assert!(is_near_white([0, 0, 0, 0]));
        assert!(!is_near_white([249, 255, 255, 255]));
    }

    #[test]
    fn near_black_requires_opacity() {
        assert!(is_near_black([49, 0, 10, 255]));
        assert!(!is_near_black([50, 0, 0, 255]));
        assert!(!is_near_black([0, 0, 0, 128]));
    }

    #[test]
    fn small_channel_drift_is_within_threshold() {
        assert!(within_threshold([100, 100, 100, 255], [130, 100, 100, 255], 38.25));
        assert!(!within_threshold([100, 100, 100, 255], [140, 100, 100, 255], 38.25));
    }

    #[test]
    fn content_mode_ignores_shared_background() {
        let mut submission = Bitmap::white(10, 10);
        let mut reference = Bitmap::white(10, 10);
        submission.fill_rect(0, 0, 2, 2, BLACK);
        reference.fill_rect(0, 0, 2, 1, BLACK);

        let raw = compare(&submission, &reference, DiffMode::Raw, &strict());
        let content = compare(&submission, &reference, DiffMode::ContentAware, &strict());

        assert_eq!(raw.total_compared_pixels, 100);
        assert_eq!(raw.mismatch_count, 2);
        assert_eq!(content.total_compared_pixels, 4);
        assert_eq!(content.mismatch_count, 2);
        assert_eq!(content.breakdown.excess, 2);
        assert!(content.match_percentage < raw.match_percentage);
    }

    #[test]
    fn diff_bitmap_uses_legend_colors() {
        let mut submission = Bitmap::white(4, 1);
        let mut reference = Bitmap::white(4, 1);
        submission.put_pixel(0, 0, BLACK);
        reference.put_pixel(1, 0, BLACK);
        submission.put_pixel(2, 0, BLACK);
        reference.put_pixel(2, 0, RED);

        let result = compare(&submission, &reference, DiffMode::ContentAware, &strict());

        assert_eq!(result.diff_bitmap.pixel(0, 0), DiffKind::Excess.color());
        assert_eq!(result.diff_bitmap.pixel(1, 0), DiffKind::Missing.color());
        assert_eq!(result.diff_bitmap.pixel(2, 0), DiffKind::Altered.color());
        assert_eq!(result.diff_bitmap.pixel(3, 0), EXCLUDED_COLOR);
    }

    #[test]
    fn mismatched_sizes_are_clipped_with_a_diagnostic() {
        let submission = Bitmap::white(10, 8);
        let reference = Bitmap::white(6, 12);
        let result = compare(&submission, &reference, DiffMode::Raw, &strict());
        assert_eq!((result.width, result.height), (6, 8));
        assert_eq!(result.total_compared_pixels, 48);
        assert!(result.diagnostic.is_some());
        assert_eq!(result.score(), 100);
    }

    #[test]
    fn zero_area_yields_sentinel() {
        let submission = Bitmap::white(0, 8);
        let reference = Bitmap::white(6, 12);
        let result = compare(&submission, &reference, DiffMode::Layout, &strict());
        assert!(result.is_sentinel());
        assert_eq!(result.score(), 0);
        assert_eq!(result.diff_bitmap, Bitmap::diagnostic_placeholder());
    }
}
