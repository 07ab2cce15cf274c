//! Browser automation abstraction used by the search pipeline.
//!
//! The pipeline only needs a handful of UI operations: load a page, wait
//! for a DOM marker, click, type a query and read the rendered HTML. These
//! traits describe them so the pool and the search flow work against any
//! backend; [`crate::browser`] provides the Chrome DevTools implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// One tab of a browser instance.
#[async_trait]
pub trait DriverPage: Send + Sync {
    /// Navigates to `url` and waits for the load event.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Waits until `css` matches an element. Returns `false` on timeout.
    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool>;

    /// Clicks the first element matching `css`. Returns `false` when absent.
    async fn click(&self, css: &str) -> Result<bool>;

    /// Clears the input matching `css`, types `text` and presses Enter.
    async fn submit_query(&self, css: &str, text: &str) -> Result<()>;

    /// Returns the rendered HTML of the page.
    async fn content(&self) -> Result<String>;

    /// Closes the tab.
    async fn close(&self) -> Result<()>;
}

/// A running browser instance.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a fresh tab.
    async fn open_page(&self) -> Result<Box<dyn DriverPage>>;

    /// Returns true when the browser still answers commands.
    async fn is_alive(&self) -> bool;

    /// Shuts the browser down. Called once, before the driver is dropped.
    async fn quit(&mut self);
}

/// Creates browser instances for the pool.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Launches a new browser.
    async fn launch(&self) -> Result<Box<dyn Driver>>;
}
