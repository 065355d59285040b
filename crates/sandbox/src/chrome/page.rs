use super::config::{CHROME_ARGS, ChromeConfig};
use super::scripts;
use crate::error::SandboxError;
use crate::handle::{ElementInfo, Sandbox, SandboxFuture, SandboxHandle};
use crate::submission::{Submission, compose_document};
use crate::viewport::ViewportPreset;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::Page;
use core::time::Duration;
use futures::StreamExt as _;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use urlencoding::encode;

const READY_POLL: Duration = Duration::from_millis(25);

/// Headless Chrome: one browser process, one fresh tab per rendered document.
///
/// Documents are loaded from `data:` URLs, so each gets an opaque origin and
/// shares no storage or globals with any other tab.
pub struct ChromeSandbox {
    browser: Browser,
    handler: JoinHandle<()>,
    config: ChromeConfig,
}

impl ChromeSandbox {
    /// Launches the browser and spawns its CDP event pump.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Launch`] if the browser cannot be configured or started.
    pub async fn launch(config: ChromeConfig) -> Result<Self, SandboxError> {
        let mut builder = BrowserConfig::builder().window_size(1280, 1024);
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in CHROME_ARGS {
            builder = builder.arg(arg);
        }
        let browser_config = builder
            .build()
            .map_err(|err| SandboxError::Launch(format!("browser config error: {err}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| SandboxError::Launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("browser event error: {err}");
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            config,
        })
    }

    pub fn config(&self) -> &ChromeConfig {
        &self.config
    }

    /// Closes the browser and waits for the process to exit.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!("failed to close browser: {err}");
        }
        if let Err(err) = self.browser.wait().await {
            debug!("browser did not exit cleanly: {err}");
        }
    }

    async fn load(&self, page: &Page, submission: &Submission, viewport: &ViewportPreset) -> Result<Option<String>, SandboxError> {
        set_viewport(page, viewport.width, viewport.height)
            .await
            .map_err(SandboxError::Navigation)?;

        let url = format!(
            "data:text/html;charset=utf-8,{}",
            encode(&compose_document(submission))
        );
        let limit = self.config.load_timeout;
        let started = Instant::now();
        let navigation = async {
            page.goto(url)
                .await
                .map_err(|err| SandboxError::Navigation(err.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|err| SandboxError::Navigation(err.to_string()))?;
            Ok::<(), SandboxError>(())
        };
        timeout(limit, navigation)
            .await
            .map_err(|_elapsed| SandboxError::Timeout {
                stage: "document load",
                after: limit,
            })??;

        loop {
            let remaining = limit.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(SandboxError::Timeout {
                    stage: "document readiness",
                    after: limit,
                });
            }
            let state: String = evaluate_json(page, scripts::ready_state(), remaining).await?;
            if state == "complete" {
                break;
            }
            sleep(READY_POLL).await;
        }

        let errors: Vec<String> = evaluate_json(page, scripts::recorded_errors(), self.config.step_timeout).await?;
        debug!(
            "{} document ready in {:?} ({} initialization errors)",
            viewport.name,
            started.elapsed(),
            errors.len()
        );
        Ok((!errors.is_empty()).then(|| errors.join("; ")))
    }
}

impl Drop for ChromeSandbox {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

impl Sandbox for ChromeSandbox {
    type Handle = ChromeHandle;

    fn render<'a>(&'a self, submission: &'a Submission, viewport: &'a ViewportPreset) -> SandboxFuture<'a, ChromeHandle> {
        Box::pin(async move {
            viewport.validate()?;
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|err| SandboxError::Navigation(err.to_string()))?;
            match self.load(&page, submission, viewport).await {
                Ok(degradation) => {
                    if let Some(reason) = &degradation {
                        warn!("{} sandbox degraded: {reason}", viewport.name);
                    }
                    Ok(ChromeHandle {
                        page,
                        viewport: viewport.clone(),
                        degradation,
                        step_timeout: self.config.step_timeout,
                    })
                }
                Err(err) => {
                    close_page(page, self.config.step_timeout).await;
                    Err(err)
                }
            }
        })
    }
}

/// A loaded Chrome tab.
pub struct ChromeHandle {
    page: Page,
    viewport: ViewportPreset,
    degradation: Option<String>,
    step_timeout: Duration,
}

impl ChromeHandle {
    pub(crate) fn page(&self) -> &Page {
        &self.page
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: String) -> Result<T, SandboxError> {
        evaluate_json(&self.page, script, self.step_timeout).await
    }
}

impl SandboxHandle for ChromeHandle {
    fn viewport(&self) -> &ViewportPreset {
        &self.viewport
    }

    fn degradation(&self) -> Option<&str> {
        self.degradation.as_deref()
    }

    fn query<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Option<ElementInfo>> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(None);
            }
            self.evaluate(scripts::query(selector)).await
        })
    }

    fn query_all<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Vec<ElementInfo>> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(Vec::new());
            }
            self.evaluate(scripts::query_all(selector)).await
        })
    }

    fn count_within<'a>(&'a self, selector: &'a str, item_selector: &'a str) -> SandboxFuture<'a, Option<usize>> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(None);
            }
            self.evaluate(scripts::count_within(selector, item_selector)).await
        })
    }

    fn click<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(false);
            }
            self.evaluate(scripts::click(selector)).await
        })
    }

    fn set_value<'a>(&'a self, selector: &'a str, value: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(false);
            }
            self.evaluate(scripts::set_value(selector, value)).await
        })
    }

    fn press_key<'a>(&'a self, selector: &'a str, key: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(false);
            }
            self.evaluate(scripts::press_key(selector, key)).await
        })
    }

    fn script_sources(&self) -> SandboxFuture<'_, Vec<String>> {
        Box::pin(async move { self.evaluate(scripts::script_sources()).await })
    }

    fn evaluate_predicate<'a>(&'a self, function_source: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move { self.evaluate(scripts::predicate(function_source)).await })
    }

    fn close(&self) -> SandboxFuture<'_, ()> {
        Box::pin(async move {
            close_page(self.page.clone(), self.step_timeout).await;
            Ok(())
        })
    }
}

/// Overrides the page's device metrics to exactly `width x height` CSS pixels.
pub(crate) async fn set_viewport(page: &Page, width: u32, height: u32) -> Result<(), String> {
    let params = SetDeviceMetricsOverrideParams::builder()
        .width(i64::from(width))
        .height(i64::from(height))
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(|err| format!("failed to build viewport params: {err}"))?;
    page.execute(params)
        .await
        .map_err(|err| format!("failed to set viewport: {err}"))?;
    Ok(())
}

/// Evaluates a snippet that returns a JSON string and decodes it.
async fn evaluate_json<T: DeserializeOwned>(page: &Page, script: String, limit: Duration) -> Result<T, SandboxError> {
    let result = match timeout(limit, page.evaluate(script)).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => return Err(SandboxError::Evaluation(err.to_string())),
        Err(_elapsed) => {
            return Err(SandboxError::Timeout {
                stage: "script evaluation",
                after: limit,
            });
        }
    };
    let json = result
        .value()
        .and_then(Value::as_str)
        .ok_or_else(|| SandboxError::Evaluation("script returned a non-string result".to_owned()))?;
    serde_json::from_str(json).map_err(|err| SandboxError::Evaluation(format!("malformed script result: {err}")))
}

async fn close_page(page: Page, limit: Duration) {
    match timeout(limit, page.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!("failed to close tab: {err}"),
        Err(_elapsed) => warn!("closing tab timed out after {limit:?}"),
    }
}
