//! Grading of front-end submissions against a reference solution.
//!
//! A [`Grader`] runs a functional probe on the submission, compares
//! submission and reference renders at every configured viewport with a
//! [`ResponsiveComparator`], and folds the results into a [`FinalScore`]
//! under an explicit [`AggregationPolicy`].

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod band;
pub mod comparator;
pub mod config;
pub mod error;
pub mod pipeline;

pub use aggregate::{AggregationPolicy, FinalScore, FourMetricWeights, MetricScores, TwoMetricWeights};
pub use band::ScoreBand;
pub use comparator::{
    ComparatorSettings, ResponsiveComparator, ResponsiveReport, ResponsiveScores, ViewportOutcome, ViewportScore,
    layout_only,
};
pub use config::AssayConfig;
pub use error::GradeError;
pub use pipeline::{GradeReport, Grader, GradingRequest};
