//! Custom weighted tests.
//!
//! A test is the JavaScript source of a `(doc) => boolean` function. Tests
//! run in order against one rendered document, so a test may rely on the
//! mutations of the tests before it.

use crate::error::ProbeError;
use crate::runner::{FunctionalReport, ProbeSettings, close_quietly, percentage};
use log::{debug, info, warn};
use sandbox::{Sandbox, SandboxError, SandboxHandle, Submission, ViewportPreset};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTest {
    pub name: String,
    /// Source of a JavaScript function taking the document.
    pub test: String,
    /// Share of the score, relative to the other tests. Always > 0.
    pub weight: f64,
}

impl CustomTest {
    pub fn new(name: impl Into<String>, test: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            test: test.into(),
            weight,
        }
    }

    fn validate(&self, index: usize) -> Result<(), ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidCustomTest {
            index,
            reason: reason.to_owned(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must be a non-empty string"));
        }
        if self.test.trim().is_empty() {
            return Err(invalid("test must be the source of a function"));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(invalid("weight must be a number greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTestResult {
    pub name: String,
    pub passed: bool,
    pub weight: f64,
    /// Why the test could not produce a verdict, if it threw or timed out.
    pub error: Option<String>,
}

/// Parses and validates a JSON list of `{name, test, weight}` objects.
///
/// # Errors
///
/// Returns [`ProbeError::Json`] for malformed JSON,
/// [`ProbeError::NoCustomTests`] for an empty list and
/// [`ProbeError::InvalidCustomTest`] for an entry that fails validation.
pub fn parse_custom_tests(json: &str) -> Result<Vec<CustomTest>, ProbeError> {
    let tests: Vec<CustomTest> = serde_json::from_str(json)?;
    validate_custom_tests(&tests)?;
    Ok(tests)
}

/// # Errors
///
/// See [`parse_custom_tests`].
pub fn validate_custom_tests(tests: &[CustomTest]) -> Result<(), ProbeError> {
    if tests.is_empty() {
        return Err(ProbeError::NoCustomTests);
    }
    tests
        .iter()
        .enumerate()
        .try_for_each(|(index, test)| test.validate(index))
}

/// The todo-list exercise's tests.
pub fn default_todo_tests() -> Vec<CustomTest> {
    vec![
        CustomTest::new(
            "Todo list exists",
            "function (doc) { return doc.getElementById('todo-list') !== null; }",
            10.0,
        ),
        CustomTest::new(
            "Add button exists",
            "function (doc) { return doc.getElementById('add-button') !== null; }",
            10.0,
        ),
        CustomTest::new(
            "Can add a new item",
            "function (doc) {
  const input = doc.getElementById('todo-input');
  const button = doc.getElementById('add-button');
  const list = doc.getElementById('todo-list');
  if (!input || !button || !list) return false;
  const before = list.children.length;
  input.value = 'Test item';
  button.click();
  return list.children.length > before;
}",
            40.0,
        ),
        CustomTest::new(
            "Delete button works",
            "function (doc) {
  const list = doc.getElementById('todo-list');
  if (!list || list.children.length === 0) return false;
  const button = list.children[0].querySelector('button');
  if (!button) return false;
  const before = list.children.length;
  button.click();
  return list.children.length < before;
}",
            40.0,
        ),
    ]
}

/// Runs `tests` in order against `handle` and scores
/// `round(100 * passed weight / total weight)`.
///
/// Every test's weight counts towards the total, including tests that threw.
pub async fn evaluate_tests<H: SandboxHandle>(handle: &H, tests: &[CustomTest], settings: &ProbeSettings) -> FunctionalReport {
    let mut results = Vec::with_capacity(tests.len());
    for test in tests {
        let verdict = match timeout(settings.step_timeout, handle.evaluate_predicate(&test.test)).await {
            Ok(verdict) => verdict,
            Err(_elapsed) => Err(SandboxError::Timeout {
                stage: "custom test",
                after: settings.step_timeout,
            }),
        };
        let (passed, error) = match verdict {
            Ok(passed) => (passed, None),
            Err(err) => {
                warn!("custom test {:?} errored: {err}", test.name);
                (false, Some(err.to_string()))
            }
        };
        debug!("custom test {:?}: {passed}", test.name);
        results.push(CustomTestResult {
            name: test.name.clone(),
            passed,
            weight: test.weight,
            error,
        });
    }
    let total: f64 = results.iter().map(|result| result.weight).sum();
    let passed: f64 = results
        .iter()
        .filter(|result| result.passed)
        .map(|result| result.weight)
        .sum();
    let report = FunctionalReport {
        custom_tests: results,
        ..FunctionalReport::with_score(percentage(passed, total))
    };
    info!(
        "custom tests: {}/{} passed, score {:?}",
        report.custom_tests.iter().filter(|result| result.passed).count(),
        report.custom_tests.len(),
        report.score
    );
    report
}

/// Renders the submission once and runs [`evaluate_tests`] on it. If the
/// document cannot be rendered every test fails with the render error and the
/// score is left unmeasured.
pub async fn run_custom_tests<S: Sandbox>(
    sandbox: &S,
    submission: &Submission,
    viewport: &ViewportPreset,
    tests: &[CustomTest],
    settings: &ProbeSettings,
) -> FunctionalReport {
    match sandbox.render(submission, viewport).await {
        Ok(handle) => {
            let report = evaluate_tests(&handle, tests, settings).await;
            close_quietly(&handle).await;
            report
        }
        Err(err) => {
            warn!("custom tests could not render the submission: {err}");
            FunctionalReport {
                custom_tests: tests
                    .iter()
                    .map(|test| CustomTestResult {
                        name: test.name.clone(),
                        passed: false,
                        weight: test.weight,
                        error: Some(err.to_string()),
                    })
                    .collect(),
                ..FunctionalReport::unmeasured(err.to_string())
            }
        }
    }
}
