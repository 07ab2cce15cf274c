//! Chrome/Chromium executable discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{Result, ScrapeError};

/// Well-known Chrome/Chromium executable paths per platform.
#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(windows)]
const KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

/// Command names looked up in `PATH`.
const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Looks for a Chrome/Chromium installation.
///
/// Checks, in order: the `CHROME` environment variable, well-known command
/// names in `PATH`, then well-known install locations.
pub fn detect_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME") {
        let candidate = PathBuf::from(&path);
        if candidate.exists() {
            debug!("Chrome found via CHROME env var: {}", path);
            return Some(candidate);
        }
    }

    if let Some(path) = KNOWN_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()) {
        debug!("Chrome found in PATH: {}", path.display());
        return Some(path);
    }

    KNOWN_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(|p| {
            debug!("Chrome found at known path: {}", p.display());
            p.to_path_buf()
        })
}

/// Returns a Chrome executable or an error naming the ways to provide one.
pub fn ensure_chrome() -> Result<PathBuf> {
    match detect_chrome() {
        Some(path) => {
            info!("Using Chrome at {}", path.display());
            Ok(path)
        }
        None => Err(ScrapeError::Browser(
            "No Chrome/Chromium installation found; install one, set CHROME, or pass --chrome-path"
                .to_string(),
        )),
    }
}
