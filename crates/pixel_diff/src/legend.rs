//! Fixed colour legend of the diff bitmap.

use crate::bitmap::{Rgba, WHITE};
use serde::Serialize;

/// Colour of pixels that were excluded from the compared population.
pub const EXCLUDED_COLOR: Rgba = WHITE;

/// Classification of one compared pixel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Content in the submission where the reference shows background.
    Excess,
    /// Content in the reference where the submission shows background.
    Missing,
    /// Content on both sides, but different.
    Altered,
    /// Within threshold.
    Match,
}

impl DiffKind {
    /// Every entry, in legend order.
    pub const ALL: [Self; 4] = [Self::Excess, Self::Missing, Self::Altered, Self::Match];

    /// Colour painted into the diff bitmap.
    pub const fn color(self) -> Rgba {
        match self {
            Self::Excess => [231, 76, 60, 255],
            Self::Missing => [52, 152, 219, 255],
            Self::Altered => [243, 156, 18, 255],
            Self::Match => [235, 235, 235, 255],
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excess => "present only in submission",
            Self::Missing => "present only in reference",
            Self::Altered => "present in both but different",
            Self::Match => "matches",
        }
    }

    /// Picks the mismatch kind from which side carries content.
    pub(crate) const fn for_mismatch(submission_has_content: bool, reference_has_content: bool) -> Self {
        match (submission_has_content, reference_has_content) {
            (true, false) => Self::Excess,
            (false, true) => Self::Missing,
            _ => Self::Altered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legend_colors_are_distinct_from_each_other_and_from_excluded() {
        for (index, kind) in DiffKind::ALL.iter().enumerate() {
            assert_ne!(kind.color(), EXCLUDED_COLOR, "{}", kind.label());
            for other in &DiffKind::ALL[index + 1..] {
                assert_ne!(kind.color(), other.color());
            }
        }
    }

    #[test]
    fn mismatch_kind_follows_content_side() {
        assert_eq!(DiffKind::for_mismatch(true, false), DiffKind::Excess);
        assert_eq!(DiffKind::for_mismatch(false, true), DiffKind::Missing);
        assert_eq!(DiffKind::for_mismatch(true, true), DiffKind::Altered);
    }
}
