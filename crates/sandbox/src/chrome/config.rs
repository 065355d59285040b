use core::time::Duration;
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Fixed browser arguments that keep rasterization deterministic.
pub const CHROME_ARGS: [&str; 10] = [
    "--force-device-scale-factor=1",
    "--hide-scrollbars",
    "--force-color-profile=sRGB",
    "--disable-gpu",
    "--disable-features=OverlayScrollbar,Translate",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--no-first-run",
];

/// How the headless browser is launched and how long it is waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeConfig {
    /// Browser binary; `None` lets the driver search the usual locations.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Pass `--no-sandbox` (needed when running as root in containers).
    pub no_sandbox: bool,
    /// Upper bound on loading a document and running its initialization.
    pub load_timeout: Duration,
    /// Upper bound on any single script evaluation or screenshot.
    pub step_timeout: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            load_timeout: Duration::from_secs(10),
            step_timeout: Duration::from_secs(5),
        }
    }
}

impl ChromeConfig {
    /// Reads `CHROME_BIN`, `ASSAY_CHROME_HEADFUL=1` and `ASSAY_CHROME_SANDBOX=1`
    /// on top of the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let flag = |name: &str| env::var(name).is_ok_and(|value| value == "1");
        Self {
            executable: find_chrome_executable(),
            headless: !flag("ASSAY_CHROME_HEADFUL"),
            no_sandbox: !flag("ASSAY_CHROME_SANDBOX"),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_timeouts(mut self, load_timeout: Duration, step_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self.step_timeout = step_timeout;
        self
    }
}

/// Locates a Chrome or Chromium binary: `CHROME_BIN` first, then well-known
/// command names that answer `--version` like a real browser.
pub fn find_chrome_executable() -> Option<PathBuf> {
    if let Ok(chrome_bin) = env::var("CHROME_BIN") {
        let path = PathBuf::from(&chrome_bin);
        if path.exists() {
            return Some(path);
        }
        log::warn!("CHROME_BIN points at missing file {chrome_bin}");
    }

    for candidate in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Snap stubs print no version and complain about snap on stderr.
            if (stdout.contains("Chrome") || stdout.contains("Chromium")) && !stderr.contains("snap") {
                return Some(PathBuf::from(candidate));
            }
        }
    }
    None
}
