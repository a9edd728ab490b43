//! Page discovery in a virtualized scroll viewer.
//!
//! The viewer only materializes page elements close to the current scroll
//! position. Discovery therefore reads one page, scrolls the container by
//! that page's height, and waits for the next child to appear. A page that
//! does not show up within the wait timeout marks the end of the score.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::source::SourceUrl;
use super::page_index::PageIndex;
use super::traits::ViewerSession;

/// Walks each source's viewer and collects one image URL per page.
#[derive(Debug, Clone)]
pub struct PageDiscoverer {
    config: ViewerConfig,
}

impl PageDiscoverer {
    pub const fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Collect image URLs from all sources, in source order then page order.
    ///
    /// The session is closed exactly once before returning, on success and on
    /// every error path.
    pub async fn discover<S>(&self, session: &mut S, sources: &[SourceUrl]) -> Result<Vec<String>>
    where
        S: ViewerSession + ?Sized,
    {
        let result = self.discover_all(session, sources).await;

        if let Err(e) = session.close().await {
            warn!("Failed to release browser session: {}", e);
        }

        result
    }

    async fn discover_all<S>(&self, session: &mut S, sources: &[SourceUrl]) -> Result<Vec<String>>
    where
        S: ViewerSession + ?Sized,
    {
        let mut image_urls = Vec::new();

        for source in sources {
            let found = self.discover_source(session, source).await?;
            info!("Found {} pages on {}", found.len(), source);
            image_urls.extend(found);
        }

        Ok(image_urls)
    }

    async fn discover_source<S>(&self, session: &mut S, source: &SourceUrl) -> Result<Vec<String>>
    where
        S: ViewerSession + ?Sized,
    {
        session.navigate(source.as_str()).await?;

        if !session.element_exists(&self.config.container_xpath).await? {
            return Err(Error::ViewerContainerMissing {
                url: source.to_string(),
            });
        }

        let mut image_urls = Vec::new();
        let mut page = PageIndex::FIRST;

        loop {
            let xpath = self.config.page_xpath(page.get());

            if !self.wait_for_element(session, &xpath).await? {
                debug!("No page {} on {}, end of score", page, source);
                break;
            }

            tokio::time::sleep(self.config.settle_delay()).await;

            match session.attribute(&xpath, &self.config.image_attribute).await? {
                Some(url) => {
                    info!("Page {}: {}", page, url);
                    image_urls.push(url);
                }
                None => warn!(
                    "Page {} on {} has no {} attribute, skipping",
                    page, source, self.config.image_attribute
                ),
            }

            let height = session.element_height(&xpath).await?;
            session
                .scroll_by(&self.config.container_xpath, height + self.config.scroll_margin)
                .await?;

            page = page.next();
        }

        Ok(image_urls)
    }

    /// Poll until `xpath` is present; `false` once the timeout elapses.
    async fn wait_for_element<S>(&self, session: &mut S, xpath: &str) -> Result<bool>
    where
        S: ViewerSession + ?Sized,
    {
        let deadline = Instant::now() + self.config.wait_timeout();

        loop {
            if session.element_exists(xpath).await? {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }
}
