//! Score PDF Core Library
//!
//! This library turns sheet-music pages shown in a browser score viewer into
//! a single PDF:
//! - Page discovery by scrolling a virtualized viewer (Chrome over CDP)
//! - Image download, with SVG pages rasterized to PNG
//! - PDF assembly, one page per image

pub mod acquire;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pdf;
pub mod source;
pub mod util;
pub mod viewer;

pub use acquire::{HttpFetcher, ImageAcquirer, ImageFetcher, ProgressFn};
pub use config::{AppConfig, BrowserSettings, DownloadConfig, OutputConfig, ViewerConfig};
pub use error::{Error, Result};
pub use pdf::DocumentAssembler;
pub use source::{ScoreJob, SourceUrl};
pub use util::WorkDir;
pub use viewer::{ChromeSession, PageDiscoverer, PageIndex, ViewerSession};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutcome {
    /// Image URLs found across all sources
    pub discovered: usize,
    /// Local images that made it into the work directory
    pub acquired: usize,
    /// The written PDF, if there were any images
    pub output: Option<PathBuf>,
}

/// High-level scraper that combines all components
pub struct ScorePdf {
    fetcher: Arc<dyn ImageFetcher>,
    config: AppConfig,
}

impl ScorePdf {
    /// Create a scraper that downloads over HTTP
    pub fn new(config: AppConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.download)?);
        Ok(Self { fetcher, config })
    }

    /// Create with a custom image fetcher
    pub fn with_fetcher(fetcher: Arc<dyn ImageFetcher>, config: AppConfig) -> Self {
        Self { fetcher, config }
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Launch Chrome and run the whole pipeline for `job`.
    pub async fn run(&self, job: &ScoreJob, progress: Option<Box<ProgressFn>>) -> Result<ScrapeOutcome> {
        self.config.validate()?;

        let mut session = ChromeSession::launch(&self.config.browser).await?;
        self.run_with_session(&mut session, job, progress).await
    }

    /// Run the pipeline against an already open viewer session.
    ///
    /// The session is closed once discovery is over, before any download, and
    /// also when the configuration is rejected.
    pub async fn run_with_session<S>(
        &self,
        session: &mut S,
        job: &ScoreJob,
        progress: Option<Box<ProgressFn>>,
    ) -> Result<ScrapeOutcome>
    where
        S: ViewerSession + ?Sized,
    {
        if let Err(e) = self.config.validate() {
            if let Err(close_err) = session.close().await {
                warn!("Failed to release browser session: {}", close_err);
            }
            return Err(e);
        }

        let discoverer = PageDiscoverer::new(self.config.viewer.clone());
        let image_urls = discoverer.discover(session, job.sources()).await?;
        let discovered = image_urls.len();

        if image_urls.is_empty() {
            warn!("No page images found; nothing to download");
            return Ok(ScrapeOutcome {
                discovered,
                acquired: 0,
                output: None,
            });
        }
        info!("Discovered {} page images", discovered);

        let work_dir = WorkDir::create(&self.config.output.work_dir)?;

        let acquirer = ImageAcquirer::new(Arc::clone(&self.fetcher), self.config.output.raster_width);
        let images = acquirer
            .acquire(&image_urls, work_dir.path(), progress.as_deref())
            .await?;
        let acquired = images.len();

        if images.is_empty() {
            warn!("None of the {} page images could be downloaded; no PDF written", discovered);
            return Ok(ScrapeOutcome {
                discovered,
                acquired,
                output: None,
            });
        }

        std::fs::create_dir_all(&self.config.output.output_dir)?;
        let output = self.config.output.output_dir.join(job.output_file_name());
        debug!("Assembling {} images into {}", acquired, output.display());

        let assembler = DocumentAssembler::new(self.config.output.page_width)
            .with_metadata(job.title(), job.composer());
        assembler.assemble(&images, &output)?;

        Ok(ScrapeOutcome {
            discovered,
            acquired,
            output: Some(output),
        })
    }
}
