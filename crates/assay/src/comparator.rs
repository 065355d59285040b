//! Responsive comparison: the same submission and reference captured and
//! diffed at every viewport, each viewport scored independently.

use core::time::Duration;
use layout_normalizer::{normalize, normalize_html};
use log::{debug, info, warn};
use pixel_diff::{Bitmap, DiffMode, DiffOptions, DiffResult, ResembleOptions, Resemblance, compare, resemblance};
use sandbox::{Rasterizer, Sandbox, SandboxError, SandboxHandle, Submission, ViewportPreset};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

/// How each viewport is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparatorSettings {
    /// Raw or content-aware primary comparison.
    pub pixel_mode: DiffMode,
    pub diff: DiffOptions,
    pub resemble: ResembleOptions,
    /// Also compare layout-normalized renders.
    pub layout: bool,
    pub render_timeout: Duration,
    pub capture_timeout: Duration,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            pixel_mode: DiffMode::Raw,
            diff: DiffOptions::default(),
            resemble: ResembleOptions::default(),
            layout: true,
            render_timeout: Duration::from_secs(10),
            capture_timeout: Duration::from_secs(10),
        }
    }
}

/// Scores for one viewport that compared successfully.
#[derive(Debug, Clone, Serialize)]
pub struct ViewportScore {
    pub viewport: String,
    pub width: u32,
    pub height: u32,
    pub pixel_match_score: u8,
    pub resemble_score: u8,
    /// `round((pixel_match_score + resemble_score) / 2)`.
    pub combined_score: u8,
    /// Match score of the layout-normalized renders, if that pass ran and
    /// succeeded.
    pub layout_score: Option<u8>,
    pub pixel: DiffResult,
    pub resemblance: Resemblance,
    pub layout: Option<DiffResult>,
    /// Why the layout pass produced no score. The pixel and resemblance
    /// scores still stand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewportOutcome {
    Compared(ViewportScore),
    Errored { viewport: String, error: String },
}

impl ViewportOutcome {
    pub fn viewport(&self) -> &str {
        match self {
            Self::Compared(score) => &score.viewport,
            Self::Errored { viewport, .. } => viewport,
        }
    }

    pub const fn score(&self) -> Option<&ViewportScore> {
        match self {
            Self::Compared(score) => Some(score),
            Self::Errored { .. } => None,
        }
    }
}

/// Unweighted means over the viewports that compared successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveScores {
    pub pixel: u8,
    pub resemblance: u8,
    pub combined: u8,
    /// `None` when no viewport produced a layout score.
    pub layout: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsiveReport {
    /// One entry per requested viewport, in request order.
    pub viewports: Vec<ViewportOutcome>,
    pub valid_comparisons: usize,
    /// `None` when no viewport compared successfully.
    pub overall: Option<ResponsiveScores>,
}

impl ResponsiveReport {
    fn from_outcomes(viewports: Vec<ViewportOutcome>) -> Self {
        let scores: Vec<&ViewportScore> = viewports.iter().filter_map(ViewportOutcome::score).collect();
        let overall = (!scores.is_empty()).then(|| ResponsiveScores {
            pixel: mean(scores.iter().map(|score| score.pixel_match_score)).unwrap_or_default(),
            resemblance: mean(scores.iter().map(|score| score.resemble_score)).unwrap_or_default(),
            combined: mean(scores.iter().map(|score| score.combined_score)).unwrap_or_default(),
            layout: mean(scores.iter().filter_map(|score| score.layout_score)),
        });
        Self {
            valid_comparisons: scores.len(),
            overall,
            viewports,
        }
    }
}

/// Rounded arithmetic mean, `None` for no values.
fn mean(values: impl Iterator<Item = u8>) -> Option<u8> {
    let (sum, count) = values.fold((0_u32, 0_u32), |(sum, count), value| (sum + u32::from(value), count + 1));
    (count > 0).then(|| (f64::from(sum) / f64::from(count)).round() as u8)
}

/// Renders and captures submission and reference at each viewport.
pub struct ResponsiveComparator<'run, S, R> {
    sandbox: &'run S,
    rasterizer: &'run R,
    settings: ComparatorSettings,
}

impl<'run, S, R> ResponsiveComparator<'run, S, R>
where
    S: Sandbox,
    R: Rasterizer<S::Handle>,
{
    pub const fn new(sandbox: &'run S, rasterizer: &'run R, settings: ComparatorSettings) -> Self {
        Self {
            sandbox,
            rasterizer,
            settings,
        }
    }

    /// Compares every viewport in order. A viewport that fails to render,
    /// capture or diff is recorded as errored and the rest still run.
    pub async fn compare(&self, submission: &Submission, reference: &Submission, viewports: &[ViewportPreset]) -> ResponsiveReport {
        let mut outcomes = Vec::with_capacity(viewports.len());
        for viewport in viewports {
            let outcome = match self.compare_viewport(submission, reference, viewport).await {
                Ok(score) => {
                    info!(
                        "{}: pixel {} resemblance {} combined {}",
                        viewport.name, score.pixel_match_score, score.resemble_score, score.combined_score
                    );
                    ViewportOutcome::Compared(score)
                }
                Err(err) => {
                    warn!("{}: comparison errored: {err}", viewport.name);
                    ViewportOutcome::Errored {
                        viewport: viewport.name.clone(),
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        let report = ResponsiveReport::from_outcomes(outcomes);
        info!(
            "responsive comparison: {}/{} viewports valid",
            report.valid_comparisons,
            viewports.len()
        );
        report
    }

    async fn compare_viewport(
        &self,
        submission: &Submission,
        reference: &Submission,
        viewport: &ViewportPreset,
    ) -> Result<ViewportScore, SandboxError> {
        let actual = self.capture(submission, viewport).await?;
        let expected = self.capture(reference, viewport).await?;
        let pixel = measured(compare(&actual, &expected, self.settings.pixel_mode, &self.settings.diff))?;
        let resemble = resemblance(&actual, &expected, &self.settings.resemble);

        let (layout, layout_error) = if self.settings.layout {
            match self.compare_layout(submission, reference, viewport).await {
                Ok(result) => (Some(result), None),
                Err(err) => {
                    warn!("{}: layout pass failed, layout score unmeasured: {err}", viewport.name);
                    (None, Some(err.to_string()))
                }
            }
        } else {
            (None, None)
        };

        let pixel_match_score = pixel.score();
        let resemble_score = resemble.score;
        let combined_score = ((f64::from(pixel_match_score) + f64::from(resemble_score)) / 2.0).round() as u8;
        Ok(ViewportScore {
            viewport: viewport.name.clone(),
            width: viewport.width,
            height: viewport.height,
            pixel_match_score,
            resemble_score,
            combined_score,
            layout_score: layout.as_ref().map(DiffResult::score),
            pixel,
            resemblance: resemble,
            layout,
            layout_error,
        })
    }

    /// Captures the layout-normalized variants of both pages and diffs them.
    async fn compare_layout(
        &self,
        submission: &Submission,
        reference: &Submission,
        viewport: &ViewportPreset,
    ) -> Result<DiffResult, SandboxError> {
        let actual = self.capture(&layout_only(submission), viewport).await?;
        let expected = self.capture(&layout_only(reference), viewport).await?;
        measured(compare(&actual, &expected, DiffMode::Layout, &self.settings.diff))
    }

    /// Renders `submission` at `viewport`, captures it and releases the document.
    async fn capture(&self, submission: &Submission, viewport: &ViewportPreset) -> Result<Bitmap, SandboxError> {
        let render_limit = self.settings.render_timeout;
        let handle = timeout(render_limit, self.sandbox.render(submission, viewport))
            .await
            .map_err(|_elapsed| SandboxError::Timeout {
                stage: "render",
                after: render_limit,
            })??;
        if let Some(reason) = handle.degradation() {
            debug!("{}: capturing a degraded document: {reason}", viewport.name);
        }
        let capture_limit = self.settings.capture_timeout;
        let bitmap = match timeout(
            capture_limit,
            self.rasterizer.capture(&handle, viewport.width, viewport.height),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(SandboxError::Timeout {
                stage: "capture",
                after: capture_limit,
            }),
        };
        if let Err(err) = handle.close().await {
            debug!("{}: failed to release document: {err}", viewport.name);
        }
        bitmap
    }
}

/// Rejects a [`DiffResult::sentinel`], which carries no measurement.
fn measured(result: DiffResult) -> Result<DiffResult, SandboxError> {
    if result.is_sentinel() {
        return Err(SandboxError::Capture(
            result
                .diagnostic
                .unwrap_or_else(|| "captures could not be compared".to_owned()),
        ));
    }
    Ok(result)
}

/// The structure-only variant of `submission`: colours flattened to black on
/// white and images replaced by black blocks.
pub fn layout_only(submission: &Submission) -> Submission {
    Submission {
        html: normalize_html(&submission.html),
        css: normalize(&submission.css),
        js: submission.js.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::iter;

    #[test]
    fn mean_rounds_and_handles_empty() {
        assert_eq!(mean([80_u8, 85].into_iter()), Some(83));
        assert_eq!(mean([70_u8, 71, 71].into_iter()), Some(71));
        assert_eq!(mean(iter::empty()), None);
    }

    #[test]
    fn sentinel_diffs_are_not_measurements() {
        let sentinel = DiffResult::sentinel(DiffMode::Layout, "empty capture");
        assert!(matches!(measured(sentinel), Err(SandboxError::Capture(reason)) if reason == "empty capture"));

        let white = Bitmap::white(4, 4);
        let real = compare(&white, &white, DiffMode::Layout, &DiffOptions::default());
        assert!(measured(real).is_ok_and(|result| result.score() == 100));
    }

    #[test]
    fn layout_variant_flattens_colours() {
        let submission = Submission::new(
            "<p style=\"color: red\">hi</p><img src=\"cat.png\" width=\"40\" height=\"30\">",
            ".a { background-color: #ff0000; }",
            "init();",
        );
        let layout = layout_only(&submission);
        assert!(layout.css.contains("#ffffff"));
        assert!(!layout.html.contains("<img"));
        assert_eq!(layout.js, "init();");
    }
}
