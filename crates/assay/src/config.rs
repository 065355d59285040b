//! Settings for one grading run.
//!
//! Everything has a default; [`AssayConfig::from_env`] overrides the defaults
//! from `ASSAY_*` environment variables.

use crate::error::GradeError;
use core::time::Duration;
use pixel_diff::{DiffMode, DiffOptions};
use probe::{Isolation, ProbeSettings};
use sandbox::ViewportPreset;
use std::env;

#[derive(Clone, Debug)]
pub struct AssayConfig {
    /// Pause after every event-dispatching scenario step, in milliseconds.
    pub settle_ms: u64,
    /// Bound on any single probe operation, in milliseconds.
    pub step_timeout_ms: u64,
    /// Bound on rendering one document, in milliseconds.
    pub load_timeout_ms: u64,
    /// Bound on one capture, in milliseconds.
    pub capture_timeout_ms: u64,
    /// Per-channel sensitivity as a fraction of the channel range.
    pub threshold: f64,
    /// Mode of the primary visual comparison: raw or content-aware.
    pub pixel_mode: DiffMode,
    /// Whether to run the layout-normalized comparison.
    pub layout_enabled: bool,
    pub isolation: Isolation,
    /// Viewports compared, in display order.
    pub viewports: Vec<ViewportPreset>,
    /// Viewport the functional probe renders at.
    pub probe_viewport: ViewportPreset,
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AssayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            settle_ms: 300,
            step_timeout_ms: 5_000,
            load_timeout_ms: 10_000,
            capture_timeout_ms: 10_000,
            threshold: DiffOptions::default().threshold,
            pixel_mode: DiffMode::Raw,
            layout_enabled: true,
            isolation: Isolation::SharedDocument,
            viewports: ViewportPreset::reference_set(),
            probe_viewport: ViewportPreset::new("Desktop", 1280, 720),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `ASSAY_SETTLE_MS` (default 300)
    /// - `ASSAY_STEP_TIMEOUT_MS` (default 5000)
    /// - `ASSAY_LOAD_TIMEOUT_MS` (default 10000)
    /// - `ASSAY_CAPTURE_TIMEOUT_MS` (default 10000)
    /// - `ASSAY_THRESHOLD` (default 0.15)
    /// - `ASSAY_PIXEL_MODE`: `raw` or `content` (default `raw`)
    /// - `ASSAY_LAYOUT`: `0` disables the layout comparison
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::new();
        let millis = |name: &str, default: u64| {
            env::var(name)
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let threshold = env::var("ASSAY_THRESHOLD")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .unwrap_or(defaults.threshold);
        let pixel_mode = match env::var("ASSAY_PIXEL_MODE").ok().as_deref() {
            Some("content") => DiffMode::ContentAware,
            _ => DiffMode::Raw,
        };
        let layout_enabled = env::var("ASSAY_LAYOUT").ok().as_deref() != Some("0");
        Self {
            settle_ms: millis("ASSAY_SETTLE_MS", defaults.settle_ms),
            step_timeout_ms: millis("ASSAY_STEP_TIMEOUT_MS", defaults.step_timeout_ms).max(1),
            load_timeout_ms: millis("ASSAY_LOAD_TIMEOUT_MS", defaults.load_timeout_ms).max(1),
            capture_timeout_ms: millis("ASSAY_CAPTURE_TIMEOUT_MS", defaults.capture_timeout_ms).max(1),
            threshold,
            pixel_mode,
            layout_enabled,
            ..defaults
        }
    }

    /// # Errors
    ///
    /// Returns [`GradeError::InvalidConfig`] for an out-of-range threshold,
    /// a layout-mode primary comparison, or a missing or zero-sized viewport.
    pub fn validate(&self) -> Result<(), GradeError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(GradeError::InvalidConfig(format!(
                "threshold must be within 0..=1, got {}",
                self.threshold
            )));
        }
        if self.pixel_mode == DiffMode::Layout {
            return Err(GradeError::InvalidConfig(
                "layout mode only applies to normalized documents".to_owned(),
            ));
        }
        if self.viewports.is_empty() {
            return Err(GradeError::InvalidConfig("no viewports configured".to_owned()));
        }
        for viewport in self.viewports.iter().chain([&self.probe_viewport]) {
            viewport.validate()?;
        }
        Ok(())
    }

    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub const fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub const fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub const fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            threshold: self.threshold,
            ..DiffOptions::default()
        }
    }

    pub const fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            settle: self.settle(),
            step_timeout: self.step_timeout(),
            isolation: self.isolation,
        }
    }
}
