//! Isolated rendering of submissions.
//!
//! A [`Sandbox`] turns a [`Submission`] into a live document sized to a
//! [`ViewportPreset`]; the [`SandboxHandle`] it returns is what the functional
//! probe drives and what a [`Rasterizer`] captures. The production
//! implementation is headless Chrome ([`chrome`]); the `test-support` feature
//! adds an in-memory one.

#![forbid(unsafe_code)]

pub mod chrome;
pub mod error;
pub mod handle;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod submission;
pub mod viewport;

pub use chrome::{ChromeConfig, ChromeHandle, ChromeRasterizer, ChromeSandbox, find_chrome_executable};
pub use error::SandboxError;
pub use handle::{ElementInfo, Rasterizer, Sandbox, SandboxFuture, SandboxHandle};
pub use submission::{Submission, compose_document};
pub use viewport::ViewportPreset;
