use crate::pipeline::GradeReport;
use probe::ProbeError;
use sandbox::SandboxError;
use thiserror::Error;

/// Failures of a grading request as a whole.
///
/// Per-viewport and per-scenario failures are recorded in the report and do
/// not surface here.
#[derive(Debug, Error)]
pub enum GradeError {
    /// Every viewport errored, so there is no visual score to report. The
    /// report carries everything that was measured.
    #[error("no viewport produced a valid comparison")]
    NoValidComparisons { report: Box<GradeReport> },
    #[error("aggregation weights must be non-negative and sum to 1.0, got {sum}")]
    InvalidWeights { sum: f64 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}
