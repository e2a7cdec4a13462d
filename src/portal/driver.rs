use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser session error: {0}")]
    Session(String),
    #[error("timed out after {timeout:?} waiting for {what}")]
    WaitTimeout { what: String, timeout: Duration },
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("browser command failed: {0}")]
    Command(String),
}

/// The portal workflow addresses repeated page blocks (vehicle rows,
/// certificate fieldsets) as an outer selector plus an index, and elements
/// inside a block through the `*_within` methods. That keeps the workflow
/// free of WebDriver element handles, which go stale across page updates.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;
    async fn reload(&mut self) -> Result<(), DriverError>;
    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// Waits until at least one match for `css` is displayed.
    async fn wait_visible(&mut self, css: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Waits until `inner` is displayed inside the `index`-th match of
    /// `outer`.
    async fn wait_visible_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Waits until the browser URL contains `fragment`.
    async fn wait_url_contains(
        &mut self,
        fragment: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn is_visible(&mut self, css: &str) -> Result<bool, DriverError>;

    /// Text of every displayed match for `css`.
    async fn visible_texts(&mut self, css: &str) -> Result<Vec<String>, DriverError>;

    async fn count(&mut self, css: &str) -> Result<usize, DriverError>;

    async fn count_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<usize, DriverError>;

    /// Text of every match for `inner` inside the `index`-th match of
    /// `outer`, displayed or not.
    async fn texts_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<Vec<String>, DriverError>;

    /// Attribute of the first match for `inner` inside the `index`-th match
    /// of `outer`.
    async fn attr_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Clears the field and types the value.
    async fn fill(&mut self, css: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&mut self, css: &str) -> Result<(), DriverError>;

    async fn click_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<(), DriverError>;

    /// Clicks the first match for `inner` inside the `index`-th match of
    /// `outer` whose text contains `text`. Covers buttons the portal only
    /// distinguishes by their label.
    async fn click_text_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        text: &str,
    ) -> Result<(), DriverError>;

    /// Sends an absolute file path to a file input inside a block.
    async fn upload_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        file: &Path,
    ) -> Result<(), DriverError>;

    /// PNG screenshot of the current page.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Ends the browser session. Further calls on the driver are invalid.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Creates browser sessions. The engine takes this as a boundary so tests
/// can count how many sessions a run actually opened.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>, DriverError>;
}
