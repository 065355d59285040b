//! The seams between the scoring pipeline and whatever renders documents.

use crate::error::SandboxError;
use crate::submission::Submission;
use crate::viewport::ViewportPreset;
use core::future::Future;
use core::pin::Pin;
use pixel_diff::Bitmap;
use serde::{Deserialize, Serialize};

/// Boxed future returned by sandbox operations.
pub type SandboxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SandboxError>> + 'a>>;

/// Snapshot of one element of a rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    /// Lowercase tag name.
    pub tag: String,
    pub id: String,
    pub class_name: String,
    pub text_content: String,
    /// Current value of form controls; `None` for other elements.
    pub value: Option<String>,
    /// Names of `on*` attributes present in the markup, lowercase.
    pub inline_handlers: Vec<String>,
    /// Names of `on*` properties holding a function.
    pub property_handlers: Vec<String>,
}

impl ElementInfo {
    /// `true` when `event` has a handler attribute or handler property.
    pub fn has_direct_handler(&self, event: &str) -> bool {
        let name = format!("on{event}");
        self.inline_handlers.iter().any(|handler| *handler == name)
            || self.property_handlers.iter().any(|handler| *handler == name)
    }
}

/// Creates isolated, script-executing documents.
pub trait Sandbox {
    type Handle: SandboxHandle;

    /// Loads `submission` into a fresh document sized to `viewport` and waits
    /// until the submission's synchronous initialization has finished.
    ///
    /// A script that throws during initialization does not fail the render;
    /// the returned handle reports [`SandboxHandle::is_degraded`] instead.
    fn render<'a>(&'a self, submission: &'a Submission, viewport: &'a ViewportPreset) -> SandboxFuture<'a, Self::Handle>;
}

/// A rendered document.
///
/// Element operations on a degraded handle behave as if no selector matched.
pub trait SandboxHandle {
    fn viewport(&self) -> &ViewportPreset;

    /// Why initialization failed, if it did.
    fn degradation(&self) -> Option<&str>;

    fn is_degraded(&self) -> bool {
        self.degradation().is_some()
    }

    /// First element matching `selector`.
    fn query<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Option<ElementInfo>>;

    /// Every element matching `selector`, in document order.
    fn query_all<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, Vec<ElementInfo>>;

    /// Number of `item_selector` matches inside the first `selector` match, or
    /// `None` when `selector` matches nothing.
    fn count_within<'a>(&'a self, selector: &'a str, item_selector: &'a str) -> SandboxFuture<'a, Option<usize>>;

    /// Dispatches a click on the first match. Returns `false` if nothing matched.
    fn click<'a>(&'a self, selector: &'a str) -> SandboxFuture<'a, bool>;

    /// Assigns `value` to the first match and fires `input` and `change`.
    fn set_value<'a>(&'a self, selector: &'a str, value: &'a str) -> SandboxFuture<'a, bool>;

    /// Fires `keydown`, `keypress` and `keyup` for `key` on the first match.
    fn press_key<'a>(&'a self, selector: &'a str, key: &'a str) -> SandboxFuture<'a, bool>;

    /// Text of every script the submission contributed.
    fn script_sources(&self) -> SandboxFuture<'_, Vec<String>>;

    /// Calls the JavaScript function `function_source` with the document and
    /// returns its result coerced to a boolean.
    ///
    /// A function that throws yields [`SandboxError::Evaluation`].
    fn evaluate_predicate<'a>(&'a self, function_source: &'a str) -> SandboxFuture<'a, bool>;

    /// Releases the document.
    fn close(&self) -> SandboxFuture<'_, ()>;
}

/// Captures rendered documents as bitmaps.
pub trait Rasterizer<H: SandboxHandle> {
    /// Captures the document's root at exactly `width x height`: overflow is
    /// clipped and missing area is filled white.
    fn capture<'a>(&'a self, handle: &'a H, width: u32, height: u32) -> SandboxFuture<'a, Bitmap>;
}
