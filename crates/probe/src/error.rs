use thiserror::Error;

/// Problems with scenario scripts or custom test definitions.
///
/// Failures while running a probe are never errors; they become failing
/// step, scenario or test results.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("malformed probe script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no scenarios configured")]
    NoScenarios,
    #[error("scenario {scenario:?}, step {step}: {reason}")]
    InvalidStep {
        scenario: String,
        step: usize,
        reason: String,
    },
    #[error("custom test #{index}: {reason}")]
    InvalidCustomTest { index: usize, reason: String },
    #[error("no custom tests configured")]
    NoCustomTests,
}
