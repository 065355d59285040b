//! In-memory sandbox for tests that must run without a browser.

mod document;

pub use document::{ElementId, Hook, MemoryDocument, Predicate};

use crate::error::SandboxError;
use crate::handle::{ElementInfo, Rasterizer, Sandbox, SandboxFuture, SandboxHandle};
use crate::submission::Submission;
use crate::viewport::ViewportPreset;
use core::cell::{Cell, Ref, RefCell};
use core::time::Duration;
use pixel_diff::Bitmap;
use tokio::time::sleep;

type DocumentFactory = Box<dyn Fn(&Submission) -> MemoryDocument>;
type BitmapFactory = Box<dyn Fn(&MemoryHandle, u32, u32) -> Result<Bitmap, SandboxError>>;

/// Builds a fresh [`MemoryDocument`] for every render.
pub struct MemorySandbox {
    factory: DocumentFactory,
    failing_viewports: Vec<String>,
    renders: Cell<usize>,
}

impl MemorySandbox {
    pub fn new(factory: impl Fn(&Submission) -> MemoryDocument + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            failing_viewports: Vec::new(),
            renders: Cell::new(0),
        }
    }

    /// Makes every render at the named viewport fail.
    #[must_use]
    pub fn failing_on(mut self, viewport: &str) -> Self {
        self.failing_viewports.push(viewport.to_owned());
        self
    }

    /// Number of successful renders so far.
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }
}

impl Sandbox for MemorySandbox {
    type Handle = MemoryHandle;

    fn render<'a>(&'a self, submission: &'a Submission, viewport: &'a ViewportPreset) -> SandboxFuture<'a, MemoryHandle> {
        Box::pin(async move {
            viewport.validate()?;
            if self.failing_viewports.contains(&viewport.name) {
                return Err(SandboxError::Navigation(format!(
                    "injected render failure at {}",
                    viewport.name
                )));
            }
            let document = (self.factory)(submission);
            self.renders.set(self.renders.get() + 1);
            Ok(MemoryHandle {
                viewport: viewport.clone(),
                submission: submission.clone(),
                degradation: document.degradation().map(str::to_owned),
                document: RefCell::new(document),
                closed: Cell::new(false),
            })
        })
    }
}

/// A rendered [`MemoryDocument`].
pub struct MemoryHandle {
    viewport: ViewportPreset,
    submission: Submission,
    degradation: Option<String>,
    document: RefCell<MemoryDocument>,
    closed: Cell<bool>,
}

impl MemoryHandle {
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn document(&self) -> Ref<'_, MemoryDocument> {
        self.document.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn live_target(&self, selector: &str) -> Option<ElementId> {
        if self.is_degraded() {
            return None;
        }
        self.document.borrow().find(selector)
    }
}

impl SandboxHandle for MemoryHandle {
    fn viewport(&self) -> &ViewportPreset {
        &self.viewport
    }

    fn degradation(&self) -> Option<&str> {
        self.degradation.as_deref()
    }

    fn query<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Option<ElementInfo>> {
        Box::pin(async move {
            Ok(self
                .live_target(selector)
                .map(|id| self.document.borrow().info(id)))
        })
    }

    fn query_all<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Vec<ElementInfo>> {
        Box::pin(async move {
            if self.is_degraded() {
                return Ok(Vec::new());
            }
            let document = self.document.borrow();
            Ok(document
                .find_all(selector)
                .into_iter()
                .map(|id| document.info(id))
                .collect())
        })
    }

    fn count_within<'a>(&'a self, selector: &'a str, item_selector: &'a str) -> SandboxFuture<'a, Option<usize>> {
        Box::pin(async move {
            Ok(self
                .live_target(selector)
                .map(|container| self.document.borrow().count_within(container, item_selector)))
        })
    }

    fn click<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            let Some(target) = self.live_target(selector) else {
                return Ok(false);
            };
            self.document.borrow_mut().dispatch_click(target);
            Ok(true)
        })
    }

    fn set_value<'a>(&'a self, selector: &'a str, value: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            let Some(target) = self.live_target(selector) else {
                return Ok(false);
            };
            self.document.borrow_mut().set_value(target, value);
            Ok(true)
        })
    }

    fn press_key<'a>(&'a self, selector: &'a str, _key: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            let Some(target) = self.live_target(selector) else {
                return Ok(false);
            };
            self.document.borrow_mut().dispatch_key(target);
            Ok(true)
        })
    }

    fn script_sources(&self) -> SandboxFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.document.borrow().scripts().to_vec()) })
    }

    fn evaluate_predicate<'a>(&'a self, function_source: &'a str) -> SandboxFuture<'a, bool> {
        Box::pin(async move {
            let document = self.document.borrow();
            let predicate = document.predicate(function_source).ok_or_else(|| {
                SandboxError::Evaluation(format!("ReferenceError: no behaviour registered for {function_source}"))
            })?;
            predicate(&document).map_err(SandboxError::Evaluation)
        })
    }

    fn close(&self) -> SandboxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.set(true);
            Ok(())
        })
    }
}

/// Produces bitmaps from a closure over the handle being captured.
pub struct MemoryRasterizer {
    factory: BitmapFactory,
    failing_viewports: Vec<String>,
    delay: Option<Duration>,
    captures: Cell<usize>,
}

impl MemoryRasterizer {
    pub fn new(factory: impl Fn(&MemoryHandle, u32, u32) -> Result<Bitmap, SandboxError> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            failing_viewports: Vec::new(),
            delay: None,
            captures: Cell::new(0),
        }
    }

    /// Every capture is a blank white page.
    pub fn blank() -> Self {
        Self::new(|_, width, height| Ok(Bitmap::white(width, height)))
    }

    /// Makes every capture at the named viewport fail.
    #[must_use]
    pub fn failing_on(mut self, viewport: &str) -> Self {
        self.failing_viewports.push(viewport.to_owned());
        self
    }

    /// Sleeps before each capture, to exercise timeouts.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn capture_count(&self) -> usize {
        self.captures.get()
    }
}

impl Rasterizer<MemoryHandle> for MemoryRasterizer {
    fn capture<'a>(&'a self, handle: &'a MemoryHandle, width: u32, height: u32) -> SandboxFuture<'a, Bitmap> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.captures.set(self.captures.get() + 1);
            if self.failing_viewports.contains(&handle.viewport().name) {
                return Err(SandboxError::Capture(format!(
                    "injected capture failure at {}",
                    handle.viewport().name
                )));
            }
            Ok((self.factory)(handle, width, height)?.fitted(width, height))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_diff::bitmap::WHITE;

    fn counter_document(_: &Submission) -> MemoryDocument {
        let mut document = MemoryDocument::new();
        let root = document.root();
        document.append(root, "span#count", "0");
        document.append(root, "button#inc", "+");
        document.on_click("#inc", |doc| {
            if let Some(count) = doc.find("#count") {
                let next = doc.text_content(count).parse::<u32>().unwrap_or(0) + 1;
                doc.set_text(count, &next.to_string());
            }
        });
        document
    }

    #[tokio::test]
    async fn every_render_gets_a_fresh_document() -> anyhow::Result<()> {
        let sandbox = MemorySandbox::new(counter_document);
        let submission = Submission::default();
        let viewport = ViewportPreset::new("Desktop", 1280, 720);

        let first = sandbox.render(&submission, &viewport).await?;
        assert!(first.click("#inc").await?);
        assert!(first.click("#inc").await?);
        let second = sandbox.render(&submission, &viewport).await?;

        let count = |info: Option<ElementInfo>| info.map(|element| element.text_content);
        assert_eq!(count(first.query("#count").await?).as_deref(), Some("2"));
        assert_eq!(count(second.query("#count").await?).as_deref(), Some("0"));
        assert_eq!(sandbox.render_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn degraded_documents_match_nothing() -> anyhow::Result<()> {
        let sandbox = MemorySandbox::new(|submission| {
            let mut document = counter_document(submission);
            document.degrade("TypeError: x is undefined");
            document
        });
        let handle = sandbox
            .render(&Submission::default(), &ViewportPreset::new("Mobile", 360, 640))
            .await?;
        assert!(handle.is_degraded());
        assert!(handle.query("#count").await?.is_none());
        assert!(!handle.click("#inc").await?);
        assert_eq!(handle.count_within("body", "span").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let sandbox = MemorySandbox::new(counter_document).failing_on("Tablet");
        let rasterizer = MemoryRasterizer::blank().failing_on("Mobile");
        let submission = Submission::default();

        let tablet = sandbox
            .render(&submission, &ViewportPreset::new("Tablet", 768, 1024))
            .await;
        assert!(matches!(tablet, Err(SandboxError::Navigation(_))));

        let mobile = ViewportPreset::new("Mobile", 360, 640);
        if let Ok(handle) = sandbox.render(&submission, &mobile).await {
            let capture = rasterizer.capture(&handle, 360, 640).await;
            assert!(matches!(capture, Err(SandboxError::Capture(_))));
        }
        assert_eq!(rasterizer.capture_count(), 1);
    }

    #[tokio::test]
    async fn captures_are_fitted_to_the_requested_size() -> anyhow::Result<()> {
        let sandbox = MemorySandbox::new(counter_document);
        let rasterizer = MemoryRasterizer::new(|_, _, _| Ok(Bitmap::filled(10, 10, [0, 0, 0, 255])));
        let handle = sandbox
            .render(&Submission::default(), &ViewportPreset::new("Desktop", 20, 5))
            .await?;
        let bitmap = rasterizer.capture(&handle, 20, 5).await?;
        assert_eq!((bitmap.width(), bitmap.height()), (20, 5));
        assert_eq!(bitmap.pixel(19, 0), WHITE);
        Ok(())
    }
}
