//! Functional probing of sandboxed submissions.
//!
//! Three interchangeable strategies produce a [`FunctionalReport`]:
//!
//! - scenario scripts that drive the document and assert on the result
//!   ([`run_scenarios`]),
//! - a heuristic inspection for evidence of wired-up interactions
//!   ([`run_heuristic`]),
//! - custom weighted JavaScript tests ([`run_custom_tests`]).
//!
//! [`FunctionalStrategy`] selects one of them by configuration.

#![forbid(unsafe_code)]

pub mod custom;
pub mod error;
pub mod heuristic;
pub mod runner;
pub mod scenario;

pub use custom::{CustomTest, CustomTestResult, default_todo_tests, parse_custom_tests, run_custom_tests};
pub use error::ProbeError;
pub use heuristic::{CheckKind, CheckResult, HeuristicCheck, HeuristicProfile, run_heuristic};
pub use runner::{FunctionalReport, Isolation, ProbeSettings, ScenarioResult, StepResult, run_scenario, run_scenarios};
pub use scenario::{Assertion, DEFAULT_ITEM_SELECTOR, Scenario, Step, parse_scenarios};

use sandbox::{Sandbox, Submission, ViewportPreset};

/// Which functional signal a grading run uses.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionalStrategy {
    Scenarios(Vec<Scenario>),
    Heuristic(HeuristicProfile),
    CustomTests(Vec<CustomTest>),
}

impl FunctionalStrategy {
    /// Checks the strategy has something to run.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::NoScenarios`] or a custom-test validation error.
    pub fn validate(&self) -> Result<(), ProbeError> {
        match self {
            Self::Scenarios(scenarios) if scenarios.is_empty() => Err(ProbeError::NoScenarios),
            Self::CustomTests(tests) => custom::validate_custom_tests(tests),
            Self::Scenarios(_) | Self::Heuristic(_) => Ok(()),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scenarios(_) => "scenarios",
            Self::Heuristic(_) => "heuristic",
            Self::CustomTests(_) => "custom_tests",
        }
    }

    /// Runs the strategy against a fresh render of `submission`.
    pub async fn run<S: Sandbox>(
        &self,
        sandbox: &S,
        submission: &Submission,
        viewport: &ViewportPreset,
        settings: &ProbeSettings,
    ) -> FunctionalReport {
        match self {
            Self::Scenarios(scenarios) => run_scenarios(sandbox, submission, viewport, scenarios, settings).await,
            Self::Heuristic(profile) => run_heuristic(sandbox, submission, viewport, profile).await,
            Self::CustomTests(tests) => run_custom_tests(sandbox, submission, viewport, tests, settings).await,
        }
    }
}
