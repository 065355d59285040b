//! Behavioural probe: runs scenario scripts against a live sandbox.

use crate::custom::CustomTestResult;
use crate::heuristic::CheckResult;
use crate::scenario::{Assertion, Scenario, Step};
use core::time::Duration;
use log::{debug, info, warn};
use sandbox::{Sandbox, SandboxError, SandboxHandle, Submission, ViewportPreset};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step's wire-format type.
    pub kind: String,
    pub passed: bool,
    pub details: String,
}

/// Outcome of one scenario: passed only if every step passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub steps: Vec<StepResult>,
    /// Set when the sandbox itself failed while running the scenario.
    pub error: Option<String>,
}

impl ScenarioResult {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_owned(),
            passed: false,
            steps: Vec::new(),
            error: Some(error),
        }
    }
}

/// Scores from any functional strategy, with whatever detail it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalReport {
    /// 0 to 100, or `None` when the sandbox failed and nothing was measured.
    pub score: Option<u8>,
    /// Why the score is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_tests: Vec<CustomTestResult>,
}

impl FunctionalReport {
    pub(crate) const fn with_score(score: u8) -> Self {
        Self {
            score: Some(score),
            error: None,
            scenarios: Vec::new(),
            checks: Vec::new(),
            custom_tests: Vec::new(),
        }
    }

    /// A report for a run the sandbox could not carry out.
    pub(crate) fn unmeasured(error: impl Into<String>) -> Self {
        Self {
            score: None,
            error: Some(error.into()),
            ..Self::with_score(0)
        }
    }

    /// Scores the fraction of passing scenarios. A render failure leaves the
    /// whole report unmeasured, since the failing scenarios never ran.
    pub(crate) fn from_scenarios(scenarios: Vec<ScenarioResult>, render_error: Option<String>) -> Self {
        let total = scenarios.len();
        let passed = scenarios.iter().filter(|scenario| scenario.passed).count();
        let summary = render_error.map_or_else(
            || Self::with_score(percentage(passed as f64, total as f64)),
            Self::unmeasured,
        );
        Self { scenarios, ..summary }
    }
}

/// `round(100 * part / whole)`, or 0 for an empty whole.
pub(crate) fn percentage(part: f64, whole: f64) -> u8 {
    if whole <= 0.0 {
        return 0;
    }
    (100.0 * part / whole).round().clamp(0.0, 100.0) as u8
}

/// Whether scenarios share one document or each get their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// All scenarios run in order against one document; mutations carry over.
    #[default]
    SharedDocument,
    /// Every scenario gets a freshly rendered document.
    FreshDocument,
}

/// Timing and isolation for the behavioural probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Pause after every event-dispatching step.
    pub settle: Duration,
    /// Upper bound on any single sandbox operation.
    pub step_timeout: Duration,
    pub isolation: Isolation,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            step_timeout: Duration::from_secs(5),
            isolation: Isolation::SharedDocument,
        }
    }
}

/// Runs every scenario in order and scores the fraction that passed.
///
/// Failures never escape: a render failure fails the scenarios that needed
/// that document and leaves the report's score unmeasured, and a failing
/// scenario never stops the ones after it.
pub async fn run_scenarios<S: Sandbox>(
    sandbox: &S,
    submission: &Submission,
    viewport: &ViewportPreset,
    scenarios: &[Scenario],
    settings: &ProbeSettings,
) -> FunctionalReport {
    let mut results = Vec::with_capacity(scenarios.len());
    let mut render_error = None;
    match settings.isolation {
        Isolation::SharedDocument => match sandbox.render(submission, viewport).await {
            Ok(handle) => {
                for scenario in scenarios {
                    results.push(run_scenario(&handle, scenario, settings).await);
                }
                close_quietly(&handle).await;
            }
            Err(err) => {
                warn!("functional probe could not render the submission: {err}");
                render_error = Some(err.to_string());
                results.extend(
                    scenarios
                        .iter()
                        .map(|scenario| ScenarioResult::failed(&scenario.name, err.to_string())),
                );
            }
        },
        Isolation::FreshDocument => {
            for scenario in scenarios {
                let result = match sandbox.render(submission, viewport).await {
                    Ok(handle) => {
                        let result = run_scenario(&handle, scenario, settings).await;
                        close_quietly(&handle).await;
                        result
                    }
                    Err(err) => {
                        warn!("scenario {:?} could not render the submission: {err}", scenario.name);
                        render_error = Some(err.to_string());
                        ScenarioResult::failed(&scenario.name, err.to_string())
                    }
                };
                results.push(result);
            }
        }
    }
    let report = FunctionalReport::from_scenarios(results, render_error);
    info!(
        "functional probe: {}/{} scenarios passed",
        report.scenarios.iter().filter(|scenario| scenario.passed).count(),
        report.scenarios.len()
    );
    report
}

/// Runs one scenario's steps in order against `handle`.
///
/// A missing element fails its step and ends the scenario. A failed assertion
/// fails the scenario but later steps still run. A sandbox error or timeout
/// ends the scenario and is recorded in [`ScenarioResult::error`].
///
/// Ending early means the scenario's remaining clicks and inputs are never
/// dispatched. Under [`Isolation::SharedDocument`] later scenarios therefore
/// see the document as it stood at the missing element, not as it would be
/// had every remaining step been attempted.
pub async fn run_scenario<H: SandboxHandle>(handle: &H, scenario: &Scenario, settings: &ProbeSettings) -> ScenarioResult {
    let mut result = ScenarioResult {
        name: scenario.name.clone(),
        passed: true,
        steps: Vec::with_capacity(scenario.steps.len()),
        error: None,
    };
    for step in &scenario.steps {
        let outcome = match timeout(settings.step_timeout, execute(handle, step)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(SandboxError::Timeout {
                stage: "scenario step",
                after: settings.step_timeout,
            }),
        };
        match outcome {
            Ok(Some(step_result)) => {
                debug!("{} / {}: {}", scenario.name, step.kind(), step_result.details);
                result.passed &= step_result.passed;
                let dispatched = step_result.passed && step.dispatches_events();
                result.steps.push(step_result);
                if dispatched {
                    sleep(settings.settle).await;
                }
            }
            Ok(None) => {
                warn!("{}: element not found: {}", scenario.name, step.selector());
                result.passed = false;
                result.steps.push(StepResult {
                    kind: step.kind().to_owned(),
                    passed: false,
                    details: format!("Element not found: {}", step.selector()),
                });
                break;
            }
            Err(err) => {
                warn!("{}: {} step failed: {err}", scenario.name, step.kind());
                result.passed = false;
                result.error = Some(err.to_string());
                break;
            }
        }
    }
    result
}

/// Runs one step. `None` means the step's target element does not exist.
async fn execute<H: SandboxHandle>(handle: &H, step: &Step) -> Result<Option<StepResult>, SandboxError> {
    let kind = step.kind().to_owned();
    let (passed, details) = match step {
        Step::Click { selector } => {
            if !handle.click(selector).await? {
                return Ok(None);
            }
            (true, format!("Clicked on {selector}"))
        }
        Step::Input { selector, value } => {
            if !handle.set_value(selector, value).await? {
                return Ok(None);
            }
            (true, format!("Set value of {selector} to \"{value}\""))
        }
        Step::Keypress { selector, key } => {
            if !handle.press_key(selector, key).await? {
                return Ok(None);
            }
            (true, format!("Pressed {key} on {selector}"))
        }
        Step::Check { selector, assertion } => match assertion {
            Assertion::ItemCount {
                item_selector,
                expected,
            } => {
                let Some(found) = handle.count_within(selector, item_selector).await? else {
                    return Ok(None);
                };
                (found == *expected, format!("Expected {expected} items, found {found}"))
            }
            Assertion::TextContains { expected } => {
                let Some(element) = handle.query(selector).await? else {
                    return Ok(None);
                };
                if element.text_content.contains(expected.as_str()) {
                    (true, format!("Found text: \"{expected}\""))
                } else {
                    (
                        false,
                        format!("Text \"{expected}\" not found in \"{}\"", element.text_content),
                    )
                }
            }
            Assertion::ValueEquals { expected } => {
                let Some(element) = handle.query(selector).await? else {
                    return Ok(None);
                };
                let found = element.value.unwrap_or_default();
                (
                    found == *expected,
                    format!("Expected value \"{expected}\", found \"{found}\""),
                )
            }
        },
    };
    Ok(Some(StepResult { kind, passed, details }))
}

pub(crate) async fn close_quietly<H: SandboxHandle>(handle: &H) {
    if let Err(err) = handle.close().await {
        debug!("failed to close probe document: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passed(name: &str) -> ScenarioResult {
        ScenarioResult {
            passed: true,
            error: None,
            ..ScenarioResult::failed(name, String::new())
        }
    }

    #[test]
    fn scenario_score_is_the_rounded_pass_fraction() {
        let report = FunctionalReport::from_scenarios(
            vec![passed("add"), passed("delete"), ScenarioResult::failed("edit", "boom".to_owned())],
            None,
        );
        assert_eq!(report.score, Some(67));
        assert_eq!(report.scenarios.len(), 3);
        assert_eq!(report.error, None);
    }

    #[test]
    fn render_failure_keeps_results_but_leaves_the_score_unmeasured() {
        let report = FunctionalReport::from_scenarios(
            vec![ScenarioResult::failed("add", "render failed".to_owned())],
            Some("render failed".to_owned()),
        );
        assert_eq!(report.score, None);
        assert_eq!(report.error.as_deref(), Some("render failed"));
        assert_eq!(report.scenarios.len(), 1);
    }
}
