//! Declarative scenario scripts.
//!
//! The wire format is a JSON list of
//! `{"name", "steps": [{"type", "selector", ...}]}` objects. A `check` step
//! carries exactly one of `expectItems`, `expectText` or `expectValue`;
//! `expectItems` may be narrowed with `itemSelector`.

use crate::error::ProbeError;
use serde::Deserialize;

/// Item selector used by `expectItems` when the step names none.
pub const DEFAULT_ITEM_SELECTOR: &str = ".item";

/// One behavioural test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Dispatches a click, then waits for the settle delay.
    Click { selector: String },
    /// Assigns a value and fires `input` and `change`, then waits.
    Input { selector: String, value: String },
    /// Fires `keydown`, `keypress` and `keyup`, then waits.
    Keypress { selector: String, key: String },
    /// Reads the document without mutating it.
    Check { selector: String, assertion: Assertion },
}

impl Step {
    pub fn click(selector: impl Into<String>) -> Self {
        Self::Click {
            selector: selector.into(),
        }
    }

    pub fn input(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Input {
            selector: selector.into(),
            value: value.into(),
        }
    }

    pub fn keypress(selector: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Keypress {
            selector: selector.into(),
            key: key.into(),
        }
    }

    pub fn check(selector: impl Into<String>, assertion: Assertion) -> Self {
        Self::Check {
            selector: selector.into(),
            assertion,
        }
    }

    /// The wire-format `type` of this step.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Input { .. } => "input",
            Self::Keypress { .. } => "keypress",
            Self::Check { .. } => "check",
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Click { selector }
            | Self::Input { selector, .. }
            | Self::Keypress { selector, .. }
            | Self::Check { selector, .. } => selector,
        }
    }

    /// Whether the step dispatches events and so is followed by a settle delay.
    pub const fn dispatches_events(&self) -> bool {
        !matches!(self, Self::Check { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Number of `item_selector` matches inside the target.
    ItemCount { item_selector: String, expected: usize },
    /// The target's text content contains `expected`.
    TextContains { expected: String },
    /// The target's current value is exactly `expected`.
    ValueEquals { expected: String },
}

impl Assertion {
    pub fn item_count(expected: usize) -> Self {
        Self::ItemCount {
            item_selector: DEFAULT_ITEM_SELECTOR.to_owned(),
            expected,
        }
    }

    pub fn items_matching(item_selector: impl Into<String>, expected: usize) -> Self {
        Self::ItemCount {
            item_selector: item_selector.into(),
            expected,
        }
    }

    pub fn text_contains(expected: impl Into<String>) -> Self {
        Self::TextContains {
            expected: expected.into(),
        }
    }

    pub fn value_equals(expected: impl Into<String>) -> Self {
        Self::ValueEquals {
            expected: expected.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawScenario {
    name: String,
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    #[serde(rename = "type")]
    kind: String,
    selector: String,
    expect_items: Option<usize>,
    expect_text: Option<String>,
    expect_value: Option<String>,
    item_selector: Option<String>,
    value: Option<String>,
    key: Option<String>,
}

impl RawStep {
    fn into_step(self) -> Result<Step, String> {
        let expectations = usize::from(self.expect_items.is_some())
            + usize::from(self.expect_text.is_some())
            + usize::from(self.expect_value.is_some());
        if self.kind != "check" && expectations > 0 {
            return Err(format!("a {} step cannot carry an expectation", self.kind));
        }
        match self.kind.as_str() {
            "click" => Ok(Step::click(self.selector)),
            "input" => {
                let value = self.value.ok_or("an input step needs a value")?;
                Ok(Step::input(self.selector, value))
            }
            "keypress" => {
                let key = self.key.ok_or("a keypress step needs a key")?;
                Ok(Step::keypress(self.selector, key))
            }
            "check" => {
                if expectations != 1 {
                    return Err(format!(
                        "a check step needs exactly one of expectItems, expectText or expectValue, found {expectations}"
                    ));
                }
                let assertion = match (self.expect_items, self.expect_text, self.expect_value) {
                    (Some(expected), _, _) => Assertion::ItemCount {
                        item_selector: self
                            .item_selector
                            .unwrap_or_else(|| DEFAULT_ITEM_SELECTOR.to_owned()),
                        expected,
                    },
                    (None, Some(expected), _) => Assertion::TextContains { expected },
                    (None, None, Some(expected)) => Assertion::ValueEquals { expected },
                    (None, None, None) => return Err("missing expectation".to_owned()),
                };
                Ok(Step::check(self.selector, assertion))
            }
            other => Err(format!("unknown step type {other:?}")),
        }
    }
}

/// Parses and validates a scenario script.
///
/// # Errors
///
/// Returns [`ProbeError::Json`] for malformed JSON, [`ProbeError::NoScenarios`]
/// for an empty list and [`ProbeError::InvalidStep`] for a step that does not
/// fit the format.
pub fn parse_scenarios(json: &str) -> Result<Vec<Scenario>, ProbeError> {
    let raw: Vec<RawScenario> = serde_json::from_str(json)?;
    if raw.is_empty() {
        return Err(ProbeError::NoScenarios);
    }
    raw.into_iter()
        .map(|scenario| {
            if scenario.steps.is_empty() {
                return Err(ProbeError::InvalidStep {
                    scenario: scenario.name,
                    step: 0,
                    reason: "scenario has no steps".to_owned(),
                });
            }
            let mut steps = Vec::with_capacity(scenario.steps.len());
            for (index, step) in scenario.steps.into_iter().enumerate() {
                let parsed = step.into_step().map_err(|reason| ProbeError::InvalidStep {
                    scenario: scenario.name.clone(),
                    step: index + 1,
                    reason,
                })?;
                steps.push(parsed);
            }
            Ok(Scenario::new(scenario.name, steps))
        })
        .collect()
}
