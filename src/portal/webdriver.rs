use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use log::debug;
use serde_json::json;
use tokio::time::Instant;

use crate::portal::driver::{BrowserDriver, DriverError, DriverFactory};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn cmd(e: CmdError) -> DriverError {
    DriverError::Command(e.to_string())
}

/// `BrowserDriver` over a WebDriver endpoint (chromedriver) via fantoccini.
///
/// Elements are re-located on every call instead of being held across calls;
/// WebDriver element references go stale whenever the portal re-renders a
/// block.
pub struct FantocciniDriver {
    client: Client,
}

impl FantocciniDriver {
    async fn find_all(&self, css: &str) -> Result<Vec<Element>, DriverError> {
        self.client.find_all(Locator::Css(css)).await.map_err(cmd)
    }

    /// The `index`-th match of `outer`, or `NotFound`.
    async fn nth(&self, outer: &str, index: usize) -> Result<Element, DriverError> {
        let mut matches = self.find_all(outer).await?;
        if index < matches.len() {
            Ok(matches.swap_remove(index))
        } else {
            Err(DriverError::NotFound(format!(
                "{} has {} matches, wanted index {}",
                outer,
                matches.len(),
                index
            )))
        }
    }

    async fn inner_all(
        &self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<Vec<Element>, DriverError> {
        let block = self.nth(outer, index).await?;
        block.find_all(Locator::Css(inner)).await.map_err(cmd)
    }

    async fn any_displayed(&self, css: &str) -> Result<bool, DriverError> {
        for element in self.find_all(css).await? {
            if element.is_displayed().await.map_err(cmd)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl BrowserDriver for FantocciniDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        debug!("navigating to {}", url);
        self.client.goto(url).await.map_err(cmd)
    }

    async fn reload(&mut self) -> Result<(), DriverError> {
        self.client.refresh().await.map_err(cmd)
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.client.current_url().await.map_err(cmd)?.to_string())
    }

    async fn wait_visible(&mut self, css: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.any_displayed(css).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    what: css.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_visible_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            // The block itself may not be rendered yet; treat that as
            // "not visible yet" rather than an error while waiting.
            if let Ok(elements) = self.inner_all(outer, index, inner).await {
                for element in elements {
                    if element.is_displayed().await.map_err(cmd)? {
                        return Ok(());
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    what: format!("{}[{}] {}", outer, index, inner),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_url_contains(
        &mut self,
        fragment: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_url().await?.contains(fragment) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    what: format!("url containing {}", fragment),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&mut self, css: &str) -> Result<bool, DriverError> {
        self.any_displayed(css).await
    }

    async fn visible_texts(&mut self, css: &str) -> Result<Vec<String>, DriverError> {
        let mut texts = Vec::new();
        for element in self.find_all(css).await? {
            if element.is_displayed().await.map_err(cmd)? {
                texts.push(element.text().await.map_err(cmd)?);
            }
        }
        Ok(texts)
    }

    async fn count(&mut self, css: &str) -> Result<usize, DriverError> {
        Ok(self.find_all(css).await?.len())
    }

    async fn count_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<usize, DriverError> {
        Ok(self.inner_all(outer, index, inner).await?.len())
    }

    async fn texts_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<Vec<String>, DriverError> {
        let mut texts = Vec::new();
        for element in self.inner_all(outer, index, inner).await? {
            texts.push(element.text().await.map_err(cmd)?);
        }
        Ok(texts)
    }

    async fn attr_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError> {
        let mut elements = self.inner_all(outer, index, inner).await?;
        if elements.is_empty() {
            return Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            )));
        }
        elements.swap_remove(0).attr(attr).await.map_err(cmd)
    }

    async fn fill(&mut self, css: &str, value: &str) -> Result<(), DriverError> {
        let element = self
            .client
            .find(Locator::Css(css))
            .await
            .map_err(|_| DriverError::NotFound(css.to_string()))?;
        element.clear().await.map_err(cmd)?;
        element.send_keys(value).await.map_err(cmd)
    }

    async fn click(&mut self, css: &str) -> Result<(), DriverError> {
        let element = self
            .client
            .find(Locator::Css(css))
            .await
            .map_err(|_| DriverError::NotFound(css.to_string()))?;
        element.click().await.map_err(cmd)?;
        Ok(())
    }

    async fn click_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<(), DriverError> {
        let mut elements = self.inner_all(outer, index, inner).await?;
        if elements.is_empty() {
            return Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            )));
        }
        elements.swap_remove(0).click().await.map_err(cmd)?;
        Ok(())
    }

    async fn click_text_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        text: &str,
    ) -> Result<(), DriverError> {
        for element in self.inner_all(outer, index, inner).await? {
            if element.text().await.map_err(cmd)?.contains(text) {
                element.click().await.map_err(cmd)?;
                return Ok(());
            }
        }
        Err(DriverError::NotFound(format!(
            "{} with text {:?} inside {}[{}]",
            inner, text, outer, index
        )))
    }

    async fn upload_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        file: &Path,
    ) -> Result<(), DriverError> {
        let elements = self.inner_all(outer, index, inner).await?;
        if elements.is_empty() {
            return Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            )));
        }

        // Prefer a displayed input; some portal blocks keep a hidden input
        // alongside the visible one.
        let mut target = None;
        for element in &elements {
            if element.is_displayed().await.map_err(cmd)? {
                target = Some(element.clone());
                break;
            }
        }
        let target = target.unwrap_or_else(|| elements[0].clone());

        // WebDriver uploads by typing the absolute path into the input.
        let absolute = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        target
            .send_keys(&absolute.to_string_lossy())
            .await
            .map_err(cmd)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.client.screenshot().await.map_err(cmd)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.client.clone().close().await.map_err(cmd)
    }
}

/// Opens headless-Chrome sessions against a WebDriver endpoint.
pub struct WebDriverFactory {
    webdriver_url: String,
    headless: bool,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: &str, headless: bool) -> Self {
        WebDriverFactory {
            webdriver_url: webdriver_url.to_string(),
            headless,
        }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--window-size=1920,1080".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        let mut capabilities = serde_json::map::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| {
                DriverError::Session(format!(
                    "failed to connect to WebDriver at {}: {}",
                    self.webdriver_url, e
                ))
            })?;
        Ok(Box::new(FantocciniDriver { client }))
    }
}
