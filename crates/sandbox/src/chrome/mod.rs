//! Headless Chrome implementation of the sandbox traits.

mod config;
mod page;
mod raster;
mod scripts;

pub use config::{CHROME_ARGS, ChromeConfig, find_chrome_executable};
pub use page::{ChromeHandle, ChromeSandbox};
pub use raster::ChromeRasterizer;
