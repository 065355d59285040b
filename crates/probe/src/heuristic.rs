//! Heuristic functional signal.
//!
//! Instead of driving the submission, this strategy looks for evidence that
//! the expected interactions were wired up: handler attributes and
//! properties, and suggestive substrings in the submission's scripts. It is
//! approximate. A passing check means a suggestive pattern was found; a
//! failing check does not prove the behaviour is absent.

use crate::runner::{FunctionalReport, close_quietly};
use log::{debug, info, warn};
use sandbox::{ElementInfo, Sandbox, SandboxError, SandboxHandle, Submission, ViewportPreset};
use serde::{Deserialize, Serialize};

/// Declarative description of what to look for in one kind of exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicProfile {
    /// Selectors that must all match; if any is missing the score is 0.
    pub required: Vec<String>,
    /// Credit for having every required element.
    pub base_credit: u8,
    pub checks: Vec<HeuristicCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicCheck {
    pub name: String,
    pub credit: u8,
    pub kind: CheckKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// The element appears to handle at least one of `events`.
    EventBinding { selector: String, events: Vec<String> },
    /// Something appears to delete entries from `container`.
    DeleteLogic { container: String },
}

/// Outcome of one heuristic check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Credit awarded, 0 when the check failed.
    pub credit: u8,
}

impl HeuristicProfile {
    /// The todo-list exercise: an input, an add button and a list, each
    /// interaction worth a quarter of the score.
    pub fn todo_app() -> Self {
        Self {
            required: vec!["#todo-input".to_owned(), "#add-button".to_owned(), "#todo-list".to_owned()],
            base_credit: 25,
            checks: vec![
                HeuristicCheck {
                    name: "add button handles clicks".to_owned(),
                    credit: 25,
                    kind: CheckKind::EventBinding {
                        selector: "#add-button".to_owned(),
                        events: vec!["click".to_owned()],
                    },
                },
                HeuristicCheck {
                    name: "input handles keys".to_owned(),
                    credit: 25,
                    kind: CheckKind::EventBinding {
                        selector: "#todo-input".to_owned(),
                        events: vec!["keypress".to_owned(), "keydown".to_owned(), "keyup".to_owned()],
                    },
                },
                HeuristicCheck {
                    name: "items can be deleted".to_owned(),
                    credit: 25,
                    kind: CheckKind::DeleteLogic {
                        container: "#todo-list".to_owned(),
                    },
                },
            ],
        }
    }
}

/// Whether `scripts` suggest a handler for `event` on the element `id`.
fn script_binds(scripts: &[String], id: &str, event: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let patterns = [
        format!("addEventListener('{event}'"),
        format!("addEventListener(\"{event}\""),
        format!(".{event}"),
        format!("on{event}"),
    ];
    scripts
        .iter()
        .any(|script| script.contains(id) && patterns.iter().any(|pattern| script.contains(pattern.as_str())))
}

fn binds_any(element: &ElementInfo, events: &[String], scripts: &[String]) -> bool {
    events
        .iter()
        .any(|event| element.has_direct_handler(event) || script_binds(scripts, &element.id, event))
}

fn looks_like_delete_button(button: &ElementInfo) -> bool {
    let text = button.text_content.to_lowercase();
    text.contains("delete")
        || text.contains("remove")
        || button.class_name.to_lowercase().contains("delete")
        || button.id.to_lowercase().contains("delete")
}

fn script_removes(script: &str) -> bool {
    let removes = script.contains("remove(") || script.contains(".remove()");
    let detaches = script.contains("removeChild") || script.contains("removeElement");
    (removes || detaches) && (script.contains("click") || script.contains("delete"))
}

async fn evaluate_check<H: SandboxHandle>(
    handle: &H,
    kind: &CheckKind,
    scripts: &[String],
) -> Result<bool, SandboxError> {
    match kind {
        CheckKind::EventBinding { selector, events } => Ok(handle
            .query(selector)
            .await?
            .is_some_and(|element| binds_any(&element, events, scripts))),
        CheckKind::DeleteLogic { container } => {
            if handle.query(container).await?.is_none() {
                return Ok(false);
            }
            let buttons = handle.query_all(&format!("{container} button")).await?;
            Ok(buttons.iter().any(looks_like_delete_button)
                || scripts.iter().any(|script| script_removes(script)))
        }
    }
}

/// Scores `handle` against `profile`.
///
/// # Errors
///
/// Propagates sandbox failures; a missing element is not an error.
pub async fn inspect<H: SandboxHandle>(handle: &H, profile: &HeuristicProfile) -> Result<FunctionalReport, SandboxError> {
    for selector in &profile.required {
        if handle.query(selector).await?.is_none() {
            info!("heuristic probe: required element {selector} is missing");
            return Ok(FunctionalReport::with_score(0));
        }
    }

    let scripts = handle.script_sources().await?;
    let mut total = u32::from(profile.base_credit);
    let mut checks = Vec::with_capacity(profile.checks.len());
    for check in &profile.checks {
        let passed = evaluate_check(handle, &check.kind, &scripts).await?;
        debug!("heuristic check {:?}: {passed}", check.name);
        let credit = if passed { check.credit } else { 0 };
        total += u32::from(credit);
        checks.push(CheckResult {
            name: check.name.clone(),
            passed,
            credit,
        });
    }
    Ok(FunctionalReport {
        checks,
        ..FunctionalReport::with_score(total.min(100) as u8)
    })
}

/// Renders the submission once and runs [`inspect`] on it. A render or
/// inspection failure leaves the score unmeasured, with the error recorded.
pub async fn run_heuristic<S: Sandbox>(
    sandbox: &S,
    submission: &Submission,
    viewport: &ViewportPreset,
    profile: &HeuristicProfile,
) -> FunctionalReport {
    let report = match sandbox.render(submission, viewport).await {
        Ok(handle) => {
            let report = inspect(&handle, profile).await;
            close_quietly(&handle).await;
            report
        }
        Err(err) => Err(err),
    };
    report.unwrap_or_else(|err| {
        warn!("heuristic probe failed: {err}");
        FunctionalReport::unmeasured(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_binding_needs_the_element_id() {
        let scripts = vec!["document.getElementById('add-button').addEventListener('click', add);".to_owned()];
        assert!(script_binds(&scripts, "add-button", "click"));
        assert!(!script_binds(&scripts, "todo-input", "click"));
        assert!(!script_binds(&scripts, "", "click"));
        assert!(!script_binds(&scripts, "add-button", "keyup"));
    }

    #[test]
    fn property_style_bindings_count() {
        let scripts = vec!["const input = document.querySelector('#todo-input'); input.onkeydown = go;".to_owned()];
        assert!(script_binds(&scripts, "todo-input", "keydown"));
    }

    #[test]
    fn removal_needs_a_trigger_word() {
        assert!(script_removes("li.remove(); button.addEventListener('click', x)"));
        assert!(script_removes("list.removeChild(item); // delete"));
        assert!(!script_removes("list.removeChild(item);"));
        assert!(!script_removes("button.addEventListener('click', add)"));
    }

    #[test]
    fn delete_buttons_are_recognised_by_text_class_or_id() {
        let by_text = ElementInfo {
            tag: "button".to_owned(),
            text_content: "Remove".to_owned(),
            ..ElementInfo::default()
        };
        let by_class = ElementInfo {
            class_name: "btn delete-btn".to_owned(),
            ..ElementInfo::default()
        };
        let plain = ElementInfo {
            text_content: "Edit".to_owned(),
            ..ElementInfo::default()
        };
        assert!(looks_like_delete_button(&by_text));
        assert!(looks_like_delete_button(&by_class));
        assert!(!looks_like_delete_button(&plain));
    }

    #[test]
    fn todo_profile_awards_full_credit() {
        let profile = HeuristicProfile::todo_app();
        let credit = u32::from(profile.base_credit)
            + profile.checks.iter().map(|check| u32::from(check.credit)).sum::<u32>();
        assert_eq!(credit, 100);
    }
}
