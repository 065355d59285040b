use core::time::Duration;
use pixel_diff::DiffError;
use thiserror::Error;

/// Failures while rendering, probing or capturing a sandboxed document.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to load document: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    #[error("capture failed: {0}")]
    Capture(String),
    /// A bounded wait elapsed; the sandbox may be stuck in submission code.
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },
    #[error("could not decode capture: {0}")]
    Decode(#[from] DiffError),
    #[error("viewport {name:?} must have a positive size, got {width}x{height}")]
    InvalidViewport { name: String, width: u32, height: u32 },
}
