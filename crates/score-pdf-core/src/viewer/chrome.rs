use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::error::{Error, Result};
use super::traits::ViewerSession;

/// Chrome driven over the DevTools protocol, with a single tab.
///
/// DOM queries run as small scripts that resolve the XPath on every call, so
/// no node handle can go stale while the viewer recycles its page elements.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChromeSession {
    /// Launch Chrome with the given settings and open a blank tab.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .args(settings.extra_args.iter().map(String::as_str));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = settings.executable {
            builder = builder.chrome_executable(executable);
        }

        let config = builder.build().map_err(Error::BrowserLaunch)?;

        info!(
            "Launching Chrome ({})",
            if settings.headless { "headless" } else { "headful" }
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        // The handler stream must be polled for any DevTools command to complete
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::BrowserLaunch(format!("Failed to open tab: {e}")))?;

        Ok(Self {
            browser,
            page,
            handler: Some(handler),
            closed: false,
        })
    }

    /// Evaluate a script whose completion value is a `JSON.stringify` string.
    async fn eval_json<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let raw: String = self
            .page
            .evaluate_expression(script)
            .await
            .map_err(|e| Error::Browser(format!("Script evaluation failed: {e}")))?
            .into_value()
            .map_err(|e| Error::Browser(format!("Unexpected script result: {e}")))?;

        serde_json::from_str(&raw)
            .map_err(|e| Error::Browser(format!("Unexpected script result {raw:?}: {e}")))
    }
}

/// JS expression evaluating to the first node matching `xpath`, or null.
fn locate(xpath: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        js_string(xpath)
    )
}

fn js_string(s: &str) -> String {
    // A JSON string literal is a valid JS string literal
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl ViewerSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Opening {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::Browser(format!("Navigation to {url} failed: {e}")))?;
        Ok(())
    }

    async fn element_exists(&mut self, xpath: &str) -> Result<bool> {
        self.eval_json(format!("JSON.stringify(({}) !== null)", locate(xpath)))
            .await
    }

    async fn attribute(&mut self, xpath: &str, name: &str) -> Result<Option<String>> {
        // Prefer the DOM property so `src` comes back as an absolute URL
        let script = format!(
            "(() => {{ const el = {}; const n = {}; \
             if (!el) return JSON.stringify(null); \
             const v = (n in el) ? el[n] : el.getAttribute(n); \
             return JSON.stringify(v === undefined || v === null || v === '' ? null : String(v)); }})()",
            locate(xpath),
            js_string(name)
        );
        self.eval_json(script).await
    }

    async fn element_height(&mut self, xpath: &str) -> Result<f64> {
        let script = format!(
            "(() => {{ const el = {}; \
             return JSON.stringify(el ? el.getBoundingClientRect().height : null); }})()",
            locate(xpath)
        );
        let height: Option<f64> = self.eval_json(script).await?;
        height.ok_or_else(|| Error::Browser(format!("Element {xpath} disappeared before measuring")))
    }

    async fn scroll_by(&mut self, xpath: &str, dy: f64) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return JSON.stringify(false); \
             el.scrollBy(0, {dy}); return JSON.stringify(true); }})()",
            locate(xpath)
        );
        let scrolled: bool = self.eval_json(script).await?;
        if scrolled {
            Ok(())
        } else {
            Err(Error::Browser(format!("Scroll target {xpath} not found")))
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| Error::Browser(format!("Failed to close browser: {e}")));

        if let Err(e) = self.browser.wait().await {
            warn!("Chrome did not exit cleanly: {}", e);
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        debug!("Browser session closed");
        result
    }
}
