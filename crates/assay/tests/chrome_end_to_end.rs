//! Full grading run against headless Chrome; skipped when no browser binary
//! can be found.

use anyhow::Result;
use assay::{AggregationPolicy, AssayConfig, Grader, GradingRequest};
use probe::{FunctionalStrategy, HeuristicProfile};
use sandbox::{ChromeConfig, ChromeRasterizer, ChromeSandbox, Submission, find_chrome_executable};

const TODO_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Todo</title></head>
<body>
  <input id="todo-input" type="text">
  <button id="add-button">Add</button>
  <ul id="todo-list"></ul>
</body></html>"#;

const TODO_CSS: &str = "body { margin: 0; font-family: sans-serif; } #add-button { background: #2a6df4; color: #ffffff; }";

const TODO_JS: &str = r"
const input = document.getElementById('todo-input');
const list = document.getElementById('todo-list');
function addTodo() {
  const text = input.value.trim();
  if (!text) { return; }
  const li = document.createElement('li');
  li.className = 'item';
  li.textContent = text;
  const remove = document.createElement('button');
  remove.textContent = 'Delete';
  remove.addEventListener('click', () => list.removeChild(li));
  li.appendChild(remove);
  list.appendChild(li);
  input.value = '';
}
document.getElementById('add-button').addEventListener('click', addTodo);
input.addEventListener('keypress', (event) => { if (event.key === 'Enter') { addTodo(); } });
";

#[tokio::test]
async fn identical_submission_scores_full_marks() -> Result<()> {
    let _log_init: Result<(), _> = env_logger::builder().is_test(true).try_init();
    if find_chrome_executable().is_none() {
        log::warn!("skipping: no Chrome executable found");
        return Ok(());
    }
    let config = AssayConfig::new();
    let chrome = ChromeConfig::from_env().with_timeouts(config.load_timeout(), config.step_timeout());
    let sandbox = ChromeSandbox::launch(chrome).await?;
    let rasterizer = ChromeRasterizer::new(config.capture_timeout());

    let submission = Submission::new(TODO_HTML, TODO_CSS, TODO_JS);
    let request = GradingRequest {
        submission: submission.clone(),
        reference: submission,
        strategy: FunctionalStrategy::Heuristic(HeuristicProfile::todo_app()),
        policy: AggregationPolicy::four_metric(),
    };
    let outcome = Grader::new(&sandbox, &rasterizer, config).grade(&request).await;
    sandbox.shutdown().await;
    let report = outcome?;

    assert_eq!(report.responsive.valid_comparisons, 3);
    assert_eq!(report.score.visual_pixel, Some(100));
    assert_eq!(report.score.layout, Some(100));
    assert_eq!(report.functional.score, Some(100));
    assert_eq!(report.score.total, Some(100));
    Ok(())
}
