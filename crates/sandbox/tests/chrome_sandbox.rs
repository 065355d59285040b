//! Runs against a real headless Chrome; every test returns early when no
//! browser binary can be found.

use anyhow::Result;
use core::time::Duration;
use sandbox::{
    ChromeConfig, ChromeRasterizer, ChromeSandbox, Rasterizer as _, Sandbox as _, SandboxHandle as _, Submission,
    ViewportPreset, find_chrome_executable,
};

const TODO_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Todo</title></head>
<body>
  <input id="todo-input" type="text">
  <button id="add-button">Add</button>
  <ul id="todo-list"></ul>
</body></html>"#;

const TODO_CSS: &str = "body { margin: 0; background: #ffffff; } #add-button { width: 80px; height: 30px; background: #000000; border: none; }";

const TODO_JS: &str = r"
const input = document.getElementById('todo-input');
document.getElementById('add-button').addEventListener('click', () => {
  const text = input.value.trim() || 'New item';
  const li = document.createElement('li');
  li.className = 'item';
  li.textContent = text;
  document.getElementById('todo-list').appendChild(li);
  input.value = '';
});
input.addEventListener('keypress', (event) => {
  if (event.key === 'Enter') { document.getElementById('add-button').click(); }
});
";

async fn launch() -> Result<Option<ChromeSandbox>> {
    let _log_init: Result<(), _> = env_logger::builder().is_test(true).try_init();
    if find_chrome_executable().is_none() {
        log::warn!("skipping: no Chrome executable found");
        return Ok(None);
    }
    let config = ChromeConfig::from_env().with_timeouts(Duration::from_secs(15), Duration::from_secs(5));
    Ok(Some(ChromeSandbox::launch(config).await?))
}

#[tokio::test]
async fn todo_submission_reacts_to_clicks_and_keys() -> Result<()> {
    let Some(sandbox) = launch().await? else {
        return Ok(());
    };
    let submission = Submission::new(TODO_HTML, TODO_CSS, TODO_JS);
    let viewport = ViewportPreset::new("Desktop", 1280, 720);
    let handle = sandbox.render(&submission, &viewport).await?;
    assert!(!handle.is_degraded());

    assert!(handle.set_value("#todo-input", "Buy milk").await?);
    assert!(handle.click("#add-button").await?);
    assert!(handle.set_value("#todo-input", "Walk dog").await?);
    assert!(handle.press_key("#todo-input", "Enter").await?);
    assert_eq!(handle.count_within("#todo-list", "li").await?, Some(2));

    let list = handle.query("#todo-list").await?;
    assert!(list.is_some_and(|info| info.text_content.contains("Buy milk")));
    assert!(handle.query("#missing").await?.is_none());
    assert!(!handle.click("#missing").await?);

    let scripts = handle.script_sources().await?;
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("addEventListener('click'"));

    assert!(handle.evaluate_predicate("(doc) => doc.querySelectorAll('li').length === 2").await?);
    assert!(handle.evaluate_predicate("(doc) => { throw new Error('boom'); }").await.is_err());

    handle.close().await?;
    sandbox.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn throwing_initialization_degrades_the_handle() -> Result<()> {
    let Some(sandbox) = launch().await? else {
        return Ok(());
    };
    let submission = Submission::new(TODO_HTML, "", "undefinedFunction();");
    let handle = sandbox.render(&submission, &ViewportPreset::new("Mobile", 360, 640)).await?;
    assert!(handle.is_degraded());
    assert!(handle.query("#todo-list").await?.is_none());
    handle.close().await?;
    sandbox.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn capture_has_the_requested_size() -> Result<()> {
    let Some(sandbox) = launch().await? else {
        return Ok(());
    };
    let submission = Submission::new(TODO_HTML, TODO_CSS, TODO_JS);
    let viewport = ViewportPreset::new("Tablet", 768, 1024);
    let handle = sandbox.render(&submission, &viewport).await?;
    let bitmap = ChromeRasterizer::default().capture(&handle, 768, 1024).await?;
    assert_eq!((bitmap.width(), bitmap.height()), (768, 1024));
    assert_eq!(bitmap.pixel(767, 1023), [255, 255, 255, 255]);
    handle.close().await?;
    sandbox.shutdown().await;
    Ok(())
}
