//! Headless Chrome drivers built on the Chrome DevTools Protocol.
//!
//! [`BrowserFactory`] launches one Chrome process per pooled driver. Each
//! search opens a fresh tab on it, walks through the engine's UI and closes
//! the tab again, so cookies and consent state survive between requests
//! while page state does not.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::{Driver, DriverFactory, DriverPage};
use crate::{Result, ScrapeError};

/// Desktop Chrome user agent sent instead of the `HeadlessChrome` default.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How often `wait_for` polls the DOM.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launch options for Chrome.
#[derive(Debug, Clone)]
pub struct BrowserLaunchConfig {
    /// Whether to run the browser in headless mode.
    pub headless: bool,
    /// Path to the Chrome/Chromium executable. If `None`, auto-detected.
    pub chrome_path: Option<PathBuf>,
    /// Proxy URL for the browser to use.
    pub proxy_url: Option<String>,
    /// Additional launch arguments for Chrome.
    pub launch_args: Vec<String>,
    /// User agent override.
    pub user_agent: String,
    /// Upper bound for a single navigation.
    pub page_load_timeout: Duration,
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            proxy_url: None,
            launch_args: Vec::new(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserLaunchConfig {
    /// Chrome command-line switches derived from this configuration.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(
            [
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-popup-blocking",
                // Hide navigator.webdriver and other automation indicators.
                "--disable-blink-features=AutomationControlled",
                "--disable-notifications",
                "--disable-infobars",
                "--incognito",
                "--no-first-run",
                "--mute-audio",
            ]
            .iter()
            .map(|arg| arg.to_string()),
        );
        args.push(format!("--user-agent={}", self.user_agent));
        if let Some(ref proxy) = self.proxy_url {
            args.push(format!("--proxy-server={}", proxy));
        }
        args.extend(self.launch_args.iter().cloned());
        args
    }
}

/// Launches Chrome processes for the driver pool.
pub struct BrowserFactory {
    config: BrowserLaunchConfig,
}

impl BrowserFactory {
    pub fn new(config: BrowserLaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserLaunchConfig {
        &self.config
    }
}

#[async_trait]
impl DriverFactory for BrowserFactory {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        let chrome_path = match self.config.chrome_path {
            Some(ref path) => path.clone(),
            None => crate::browser_setup::ensure_chrome()?,
        };
        debug!("Launching Chrome at {}", chrome_path.display());

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            builder = builder.with_head();
        }
        for arg in self.config.args() {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            ScrapeError::Browser(format!("Failed to initialize browser: {}", e))
        })?;

        // The CDP event loop must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        info!("Chrome driver initialized successfully");
        Ok(Box::new(BrowserDriver {
            browser,
            handler,
            page_load_timeout: self.config.page_load_timeout,
        }))
    }
}

/// A running Chrome process and its CDP event loop.
pub struct BrowserDriver {
    browser: Browser,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
}

#[async_trait]
impl Driver for BrowserDriver {
    async fn open_page(&self) -> Result<Box<dyn DriverPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to open tab: {}", e)))?;
        Ok(Box::new(BrowserPage {
            page,
            page_load_timeout: self.page_load_timeout,
        }))
    }

    async fn is_alive(&self) -> bool {
        match self.browser.version().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Browser health check failed: {}", e);
                false
            }
        }
    }

    async fn quit(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error while closing browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Error while waiting for browser exit: {}", e);
        }
        self.handler.abort();
        info!("Browser closed successfully");
    }
}

impl Drop for BrowserDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// A single Chrome tab.
pub struct BrowserPage {
    page: Page,
    page_load_timeout: Duration,
}

#[async_trait]
impl DriverPage for BrowserPage {
    async fn goto(&self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::Browser(format!("Navigation to {} failed: {}", url, e))),
            Err(_) => Err(ScrapeError::Timeout(format!(
                "loading {} took longer than {}s",
                url,
                self.page_load_timeout.as_secs()
            ))),
        }
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.page.find_element(css).await.is_ok() {
                debug!("'{}' present after {:?}", css, start.elapsed());
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!("'{}' not found within {:?}", css, timeout);
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, css: &str) -> Result<bool> {
        let element = match self.page.find_element(css).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to click '{}': {}", css, e)))?;
        Ok(true)
    }

    async fn submit_query(&self, css: &str, text: &str) -> Result<()> {
        let selector = serde_json::to_string(css)?;
        let clear = format!(
            "(() => {{ const el = document.querySelector({}); if (el) {{ el.value = ''; }} }})()",
            selector
        );
        self.page
            .evaluate(clear)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to clear search box: {}", e)))?;

        let element = self
            .page
            .find_element(css)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Search box '{}' not found: {}", css, e)))?;
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to focus search box: {}", e)))?
            .type_str(text)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to type query: {}", e)))?
            .press_key("Enter")
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to submit query: {}", e)))?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to get page content: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to close tab: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_default() {
        let config = BrowserLaunchConfig::default();
        assert!(config.headless);
        assert!(config.chrome_path.is_none());
        assert!(config.proxy_url.is_none());
        assert!(config.launch_args.is_empty());
        assert_eq!(config.user_agent, DESKTOP_USER_AGENT);
        assert_eq!(config.page_load_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_args_headless_and_stealth() {
        let args = BrowserLaunchConfig::default().args();
        assert_eq!(args[0], "--headless=new");
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--incognito".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
        assert!(!args.iter().any(|a| a.starts_with("--proxy-server")));
    }

    #[test]
    fn test_args_headed_with_proxy_and_extras() {
        let config = BrowserLaunchConfig {
            headless: false,
            proxy_url: Some("socks5://127.0.0.1:1080".to_string()),
            launch_args: vec!["--lang=en-US".to_string()],
            ..Default::default()
        };
        let args = config.args();
        assert!(!args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--proxy-server=socks5://127.0.0.1:1080".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[test]
    fn test_factory_keeps_config() {
        let factory = BrowserFactory::new(BrowserLaunchConfig {
            chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        });
        assert_eq!(
            factory.config().chrome_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
    }
}
