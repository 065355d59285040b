//! One grading run, end to end.
//!
//! A [`Grader`] holds everything a run needs and nothing survives it: every
//! call to [`Grader::grade`] renders fresh documents and builds a fresh
//! [`GradeReport`].

use crate::aggregate::{AggregationPolicy, FinalScore, MetricScores};
use crate::comparator::{ComparatorSettings, ResponsiveComparator, ResponsiveReport, ViewportOutcome};
use crate::config::AssayConfig;
use crate::error::GradeError;
use log::{info, warn};
use pixel_diff::{DiffError, ResembleOptions};
use probe::{FunctionalReport, FunctionalStrategy};
use sandbox::{Rasterizer, Sandbox, Submission, ViewportPreset};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// What to grade and how to weigh it.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub submission: Submission,
    pub reference: Submission,
    pub strategy: FunctionalStrategy,
    pub policy: AggregationPolicy,
}

/// Everything a run measured.
#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub score: FinalScore,
    pub functional: FunctionalReport,
    pub responsive: ResponsiveReport,
}

impl GradeReport {
    /// Writes one `<viewport>.<mode>.diff.png` per comparison into `dir`,
    /// creating it if needed. Unchanged files are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError`] if the directory or a PNG cannot be written.
    pub fn write_artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>, DiffError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for outcome in &self.responsive.viewports {
            let ViewportOutcome::Compared(score) = outcome else {
                continue;
            };
            let slug = ViewportPreset::new(score.viewport.as_str(), score.width, score.height).slug();
            for diff in [Some(&score.pixel), score.layout.as_ref()].into_iter().flatten() {
                let path = dir.join(format!("{slug}.{}.diff.png", diff.mode.name()));
                if diff.diff_bitmap.write_png(&path)? {
                    info!("wrote {}", path.display());
                }
                written.push(path);
            }
        }
        Ok(written)
    }
}

/// Context for grading: a sandbox, a rasterizer and the run settings.
pub struct Grader<'run, S, R> {
    sandbox: &'run S,
    rasterizer: &'run R,
    config: AssayConfig,
}

impl<'run, S, R> Grader<'run, S, R>
where
    S: Sandbox,
    R: Rasterizer<S::Handle>,
{
    pub const fn new(sandbox: &'run S, rasterizer: &'run R, config: AssayConfig) -> Self {
        Self {
            sandbox,
            rasterizer,
            config,
        }
    }

    pub const fn config(&self) -> &AssayConfig {
        &self.config
    }

    fn comparator_settings(&self, policy: &AggregationPolicy) -> ComparatorSettings {
        if policy.uses_layout() && !self.config.layout_enabled {
            warn!("layout comparison is disabled; the {} total will be unmeasured", policy.name());
        }
        ComparatorSettings {
            pixel_mode: self.config.pixel_mode,
            diff: self.config.diff_options(),
            resemble: ResembleOptions::default(),
            layout: self.config.layout_enabled,
            render_timeout: self.config.load_timeout(),
            capture_timeout: self.config.capture_timeout(),
        }
    }

    /// Runs the functional probe, the responsive comparison and aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`GradeError::InvalidConfig`], [`GradeError::InvalidWeights`]
    /// or [`GradeError::Probe`] before anything runs if the request is
    /// unusable, and [`GradeError::NoValidComparisons`], carrying the partial
    /// report, if every viewport errored.
    pub async fn grade(&self, request: &GradingRequest) -> Result<GradeReport, GradeError> {
        self.config.validate()?;
        request.policy.validate()?;
        request.strategy.validate()?;

        info!(
            "grading with the {} probe and {} aggregation",
            request.strategy.name(),
            request.policy.name()
        );
        let functional = request
            .strategy
            .run(
                self.sandbox,
                &request.submission,
                &self.config.probe_viewport,
                &self.config.probe_settings(),
            )
            .await;

        let comparator = ResponsiveComparator::new(self.sandbox, self.rasterizer, self.comparator_settings(&request.policy));
        let responsive = comparator
            .compare(&request.submission, &request.reference, &self.config.viewports)
            .await;

        let overall = responsive.overall;
        let scores = MetricScores {
            functional: functional.score,
            pixel: overall.map(|scores| scores.pixel),
            resemblance: overall.map(|scores| scores.resemblance),
            layout: overall.and_then(|scores| scores.layout),
        };
        let report = GradeReport {
            score: request.policy.aggregate(&scores)?,
            functional,
            responsive,
        };
        if overall.is_none() {
            return Err(GradeError::NoValidComparisons {
                report: Box::new(report),
            });
        }
        info!("total score: {:?}", report.score.total);
        Ok(report)
    }
}
