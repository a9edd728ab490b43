use async_trait::async_trait;

use crate::error::Result;

/// A live browser tab that can be driven through the score viewer.
///
/// Elements are addressed by XPath. "Not present" is a normal answer
/// (`Ok(false)` / `Ok(None)`), errors are reserved for driver failures.
#[async_trait]
pub trait ViewerSession: Send {
    /// Load `url` and wait for navigation to finish
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether an element matching `xpath` is currently in the DOM
    async fn element_exists(&mut self, xpath: &str) -> Result<bool>;

    /// Read an attribute of the first element matching `xpath`
    async fn attribute(&mut self, xpath: &str, name: &str) -> Result<Option<String>>;

    /// Rendered height in CSS pixels of the first element matching `xpath`
    async fn element_height(&mut self, xpath: &str) -> Result<f64>;

    /// Scroll the element matching `xpath` vertically by `dy` pixels
    async fn scroll_by(&mut self, xpath: &str, dy: f64) -> Result<()>;

    /// Release the browser; called exactly once per session
    async fn close(&mut self) -> Result<()>;
}
