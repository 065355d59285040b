//! Combining partial scores into one grade.

use crate::band::ScoreBand;
use crate::error::GradeError;
use log::debug;
use serde::{Deserialize, Serialize};

/// Tolerance when checking that weights sum to one.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Weights of the four-metric policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourMetricWeights {
    pub functional: f64,
    pub pixel: f64,
    pub resemblance: f64,
    pub layout: f64,
}

impl Default for FourMetricWeights {
    fn default() -> Self {
        Self {
            functional: 0.4,
            pixel: 0.25,
            resemblance: 0.25,
            layout: 0.10,
        }
    }
}

/// Weights of the two-metric policy. The visual score is the mean of the
/// pixel and resemblance scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoMetricWeights {
    pub visual: f64,
    pub functional: f64,
}

impl Default for TwoMetricWeights {
    fn default() -> Self {
        Self {
            visual: 0.4,
            functional: 0.6,
        }
    }
}

/// How partial scores become a total. The caller picks one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AggregationPolicy {
    FourMetric(FourMetricWeights),
    TwoMetric(TwoMetricWeights),
}

impl AggregationPolicy {
    /// Functional 0.4, pixel 0.25, resemblance 0.25, layout 0.10.
    pub fn four_metric() -> Self {
        Self::FourMetric(FourMetricWeights::default())
    }

    /// Visual 0.4, functional 0.6.
    pub fn two_metric() -> Self {
        Self::TwoMetric(TwoMetricWeights::default())
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::FourMetric(_) => "four_metric",
            Self::TwoMetric(_) => "two_metric",
        }
    }

    /// Whether this policy consumes the layout score.
    pub fn uses_layout(&self) -> bool {
        matches!(self, Self::FourMetric(weights) if weights.layout > 0.0)
    }

    fn weights(&self) -> Vec<f64> {
        match *self {
            Self::FourMetric(weights) => vec![weights.functional, weights.pixel, weights.resemblance, weights.layout],
            Self::TwoMetric(weights) => vec![weights.visual, weights.functional],
        }
    }

    /// # Errors
    ///
    /// Returns [`GradeError::InvalidWeights`] unless every weight is finite
    /// and non-negative and they sum to 1.
    pub fn validate(&self) -> Result<(), GradeError> {
        let weights = self.weights();
        let sum: f64 = weights.iter().sum();
        let each_valid = weights.iter().all(|weight| weight.is_finite() && *weight >= 0.0);
        if !each_valid || (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(GradeError::InvalidWeights { sum });
        }
        Ok(())
    }

    /// Combines `scores`. The total is `None` if any score this policy
    /// weights above zero is missing.
    ///
    /// # Errors
    ///
    /// Returns [`GradeError::InvalidWeights`] for invalid weights.
    pub fn aggregate(&self, scores: &MetricScores) -> Result<FinalScore, GradeError> {
        self.validate()?;
        let total = match *self {
            Self::FourMetric(weights) => weighted_sum(&[
                (scores.functional, weights.functional),
                (scores.pixel, weights.pixel),
                (scores.resemblance, weights.resemblance),
                (scores.layout, weights.layout),
            ]),
            Self::TwoMetric(weights) => {
                weighted_sum(&[(scores.visual(), weights.visual), (scores.functional, weights.functional)])
            }
        };
        debug!("{} aggregation of {scores:?}: {total:?}", self.name());
        Ok(FinalScore {
            policy: self.name().to_owned(),
            functional: scores.functional,
            visual_pixel: scores.pixel,
            visual_resemblance: scores.resemblance,
            visual: scores.visual(),
            layout: scores.layout,
            total,
            band: total.map(ScoreBand::from_score),
        })
    }
}

/// `round(sum(score * weight))`, or `None` if a weighted score is missing.
fn weighted_sum(terms: &[(Option<u8>, f64)]) -> Option<u8> {
    let mut total = 0.0;
    for &(score, weight) in terms {
        if weight <= 0.0 {
            continue;
        }
        total += f64::from(score?) * weight;
    }
    Some(total.round().clamp(0.0, 100.0) as u8)
}

/// Partial scores entering aggregation; `None` means not measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricScores {
    pub functional: Option<u8>,
    pub pixel: Option<u8>,
    pub resemblance: Option<u8>,
    pub layout: Option<u8>,
}

impl MetricScores {
    /// `round((pixel + resemblance) / 2)`.
    pub fn visual(&self) -> Option<u8> {
        let (pixel, resemblance) = (self.pixel?, self.resemblance?);
        Some(((f64::from(pixel) + f64::from(resemblance)) / 2.0).round() as u8)
    }
}

/// The grade. Scores that could not be measured are `None`, never a
/// stand-in number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub policy: String,
    pub functional: Option<u8>,
    pub visual_pixel: Option<u8>,
    pub visual_resemblance: Option<u8>,
    /// Mean of the pixel and resemblance scores.
    pub visual: Option<u8>,
    pub layout: Option<u8>,
    pub total: Option<u8>,
    pub band: Option<ScoreBand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(functional: u8, pixel: u8, resemblance: u8, layout: u8) -> MetricScores {
        MetricScores {
            functional: Some(functional),
            pixel: Some(pixel),
            resemblance: Some(resemblance),
            layout: Some(layout),
        }
    }

    #[test]
    fn four_metric_total() -> Result<(), GradeError> {
        let score = AggregationPolicy::four_metric().aggregate(&measured(80, 70, 90, 60))?;
        assert_eq!(score.total, Some(78));
        assert_eq!(score.band, Some(ScoreBand::Warn));
        Ok(())
    }

    #[test]
    fn two_metric_total_averages_visual_scores() -> Result<(), GradeError> {
        let score = AggregationPolicy::two_metric().aggregate(&measured(90, 70, 81, 0))?;
        assert_eq!(score.visual, Some(76));
        assert_eq!(score.total, Some(84));
        Ok(())
    }

    #[test]
    fn missing_inputs_leave_the_total_unmeasured() -> Result<(), GradeError> {
        let scores = MetricScores {
            layout: None,
            ..measured(80, 70, 90, 0)
        };
        let four = AggregationPolicy::four_metric().aggregate(&scores)?;
        assert_eq!(four.total, None);
        assert_eq!(four.band, None);

        let two = AggregationPolicy::two_metric().aggregate(&scores)?;
        assert_eq!(two.total, Some(80));
        Ok(())
    }

    #[test]
    fn zero_weight_metrics_may_be_missing() -> Result<(), GradeError> {
        let policy = AggregationPolicy::FourMetric(FourMetricWeights {
            functional: 0.5,
            pixel: 0.25,
            resemblance: 0.25,
            layout: 0.0,
        });
        assert!(!policy.uses_layout());
        let scores = MetricScores {
            layout: None,
            ..measured(100, 60, 80, 0)
        };
        assert_eq!(policy.aggregate(&scores)?.total, Some(85));
        Ok(())
    }

    #[test]
    fn weights_must_sum_to_one() {
        let policy = AggregationPolicy::TwoMetric(TwoMetricWeights {
            visual: 0.5,
            functional: 0.6,
        });
        assert!(matches!(
            policy.aggregate(&MetricScores::default()),
            Err(GradeError::InvalidWeights { .. })
        ));

        let negative = AggregationPolicy::TwoMetric(TwoMetricWeights {
            visual: -0.5,
            functional: 1.5,
        });
        assert!(matches!(negative.validate(), Err(GradeError::InvalidWeights { .. })));
        assert!(AggregationPolicy::four_metric().validate().is_ok());
    }
}
