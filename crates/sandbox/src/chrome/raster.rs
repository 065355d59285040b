use super::page::{ChromeHandle, set_viewport};
use crate::error::SandboxError;
use crate::handle::{Rasterizer, SandboxFuture};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use core::time::Duration;
use log::debug;
use pixel_diff::Bitmap;
use tokio::time::timeout;

/// Screenshots a Chrome tab through the compositor surface.
#[derive(Debug, Clone, Copy)]
pub struct ChromeRasterizer {
    capture_timeout: Duration,
}

impl ChromeRasterizer {
    pub const fn new(capture_timeout: Duration) -> Self {
        Self { capture_timeout }
    }
}

impl Default for ChromeRasterizer {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Rasterizer<ChromeHandle> for ChromeRasterizer {
    fn capture<'a>(&'a self, handle: &'a ChromeHandle, width: u32, height: u32) -> SandboxFuture<'a, Bitmap> {
        Box::pin(async move {
            let page = handle.page();
            let limit = self.capture_timeout;
            let screenshot = async {
                set_viewport(page, width, height)
                    .await
                    .map_err(SandboxError::Capture)?;
                let params = CaptureScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .from_surface(true)
                    .build();
                page.execute(params)
                    .await
                    .map_err(|err| SandboxError::Capture(err.to_string()))
            };
            let response = timeout(limit, screenshot)
                .await
                .map_err(|_elapsed| SandboxError::Timeout {
                    stage: "capture",
                    after: limit,
                })??;

            let base64_str: &str = response.data.as_ref();
            let bytes = BASE64_STANDARD
                .decode(base64_str)
                .map_err(|err| SandboxError::Capture(format!("failed to decode base64 screenshot: {err}")))?;
            let bitmap = Bitmap::decode_png(&bytes)?;
            if bitmap.width() != width || bitmap.height() != height {
                debug!(
                    "screenshot was {}x{}, fitting to {width}x{height}",
                    bitmap.width(),
                    bitmap.height()
                );
            }
            Ok(bitmap.fitted(width, height))
        })
    }
}
