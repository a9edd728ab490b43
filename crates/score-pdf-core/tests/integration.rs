//! Integration tests for score-pdf-core
//!
//! These tests drive the whole pipeline without a browser or network:
//! - Page discovery against a virtualized mock viewer
//! - Downloads from an in-memory fetcher, including failures
//! - SVG rasterization and PDF assembly
//! - Work directory lifecycle

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object};
use score_pdf_core::{
    AppConfig, Error, ImageFetcher, PageDiscoverer, ProgressFn, Result, ScorePdf, ScoreJob,
    SourceUrl, ViewerSession,
};

// =============================================================================
// Mock Viewer
// =============================================================================

/// A viewer that only renders the page right after the current scroll
/// position, like the real virtualized scroller.
#[derive(Default)]
struct MockSession {
    /// Image URLs per source; a source missing from the map has no container
    scores: HashMap<String, Vec<String>>,
    current: Option<String>,
    scrolls: usize,
    navigations: Vec<String>,
    closed: usize,
}

impl MockSession {
    fn with_score(mut self, source: &str, pages: &[&str]) -> Self {
        self.scores
            .insert(source.to_string(), pages.iter().map(ToString::to_string).collect());
        self
    }

    fn pages(&self) -> Option<&Vec<String>> {
        self.scores.get(self.current.as_deref()?)
    }

    /// 1-based page position in a page XPath, `None` for the container.
    fn position(xpath: &str) -> Option<usize> {
        let start = xpath.find("div[")? + 4;
        let end = start + xpath[start..].find(']')?;
        xpath[start..end].parse().ok()
    }

    fn rendered(&self, position: usize) -> bool {
        self.pages()
            .is_some_and(|pages| position <= pages.len() && position <= self.scrolls + 1)
    }
}

#[async_trait]
impl ViewerSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigations.push(url.to_string());
        self.current = Some(url.to_string());
        self.scrolls = 0;
        Ok(())
    }

    async fn element_exists(&mut self, xpath: &str) -> Result<bool> {
        Ok(match Self::position(xpath) {
            Some(n) => self.rendered(n),
            None => self.pages().is_some(),
        })
    }

    async fn attribute(&mut self, xpath: &str, _name: &str) -> Result<Option<String>> {
        let Some(n) = Self::position(xpath) else {
            return Ok(None);
        };
        if !self.rendered(n) {
            return Ok(None);
        }
        Ok(self.pages().map(|pages| pages[n - 1].clone()))
    }

    async fn element_height(&mut self, _xpath: &str) -> Result<f64> {
        Ok(1100.0)
    }

    async fn scroll_by(&mut self, _xpath: &str, _dy: f64) -> Result<()> {
        self.scrolls += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

// =============================================================================
// Mock Fetcher
// =============================================================================

/// Serves bodies from memory; unknown URLs answer 404.
#[derive(Default)]
struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        self.requests.lock().unwrap().push(url.to_string());

        let body = self.bodies.get(url).ok_or_else(|| Error::DownloadStatus {
            url: url.to_string(),
            status: 404,
        })?;
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }
}

// =============================================================================
// Helpers
// =============================================================================

const SOURCE_A: &str = "https://musescore.com/user/1/scores/100";
const SOURCE_B: &str = "https://musescore.com/user/1/scores/200";
const SOURCE_C: &str = "https://musescore.com/user/1/scores/300";

const PAGE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50">
    <rect width="100" height="50" fill="white"/>
    <path d="M0 25 H100" stroke="black" stroke-dasharray="5 5"/>
</svg>"#;

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(width, height, Rgb([250, 250, 250]))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn page_url(n: usize, ext: &str) -> String {
    format!("https://s3.example.com/score_{n}.{ext}?no-cache=1")
}

fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.viewer.wait_timeout_ms = 50;
    config.viewer.poll_interval_ms = 10;
    config.viewer.settle_delay_ms = 0;
    config.output.raster_width = 200;
    config.output.work_dir = root.join("work");
    config.output.output_dir = root.join("out");
    config
}

fn job(sources: &[&str]) -> ScoreJob {
    ScoreJob::from_urls(sources, "Gymnopédies", "Erik Satie").unwrap()
}

fn page_heights(path: &Path) -> Vec<f32> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            match &media_box[3] {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r,
                other => panic!("unexpected MediaBox entry {other:?}"),
            }
        })
        .collect()
}

fn assert_heights(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "page count: {actual:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 0.01, "heights {actual:?} != {expected:?}");
    }
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[tokio::test]
async fn test_raster_vector_raster_score() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let urls = [page_url(1, "png"), page_url(2, "svg"), page_url(3, "jpg")];

    let fetcher = MockFetcher::default()
        .serve(&urls[0], png(100, 200))
        .serve(&urls[1], PAGE_SVG.as_bytes().to_vec())
        .serve(&urls[2], png(100, 100));
    let mut session = MockSession::default()
        .with_score(SOURCE_A, &[urls[0].as_str(), urls[1].as_str(), urls[2].as_str()]);

    let scraper = ScorePdf::with_fetcher(Arc::new(fetcher), config.clone());
    let outcome = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), None)
        .await
        .unwrap();

    let output = outcome.output.unwrap();
    assert_eq!(output, config.output.output_dir.join("Erik Satie - Gymnopédies.pdf"));
    assert_eq!((outcome.discovered, outcome.acquired), (3, 3));
    // 100x200 PNG, SVG rasterized to 200x100, PNG behind a .jpg name
    assert_heights(&page_heights(&output), &[1190.0, 297.5, 595.0]);
    assert!(!config.output.work_dir.exists());
    assert_eq!(session.closed, 1);
}

#[tokio::test]
async fn test_failed_download_keeps_remaining_order() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let urls: Vec<String> = (1..=4).map(|n| page_url(n, "png")).collect();

    // Page n is n*100 px tall; page 2 is never served
    let fetcher = Arc::new(
        MockFetcher::default()
            .serve(&urls[0], png(100, 100))
            .serve(&urls[2], png(100, 300))
            .serve(&urls[3], png(100, 400)),
    );
    let pages: Vec<&str> = urls.iter().map(String::as_str).collect();
    let mut session = MockSession::default().with_score(SOURCE_A, &pages);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&progress);
    let callback: Box<ProgressFn> = Box::new(move |done, total| {
        recorded.lock().unwrap().push((done, total));
    });

    let scraper = ScorePdf::with_fetcher(fetcher.clone(), config);
    let outcome = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), Some(callback))
        .await
        .unwrap();

    assert_eq!((outcome.discovered, outcome.acquired), (4, 3));
    assert_heights(&page_heights(&outcome.output.unwrap()), &[595.0, 1785.0, 2380.0]);
    assert_eq!(fetcher.requests(), urls);
    assert_eq!(*progress.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[tokio::test]
async fn test_unrenderable_svg_is_left_out() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let urls = [page_url(1, "png"), page_url(2, "svg"), page_url(3, "png")];

    let fetcher = MockFetcher::default()
        .serve(&urls[0], png(100, 100))
        .serve(&urls[1], b"<html>rate limited</html>".to_vec())
        .serve(&urls[2], png(100, 200));
    let mut session = MockSession::default()
        .with_score(SOURCE_A, &[urls[0].as_str(), urls[1].as_str(), urls[2].as_str()]);

    let scraper = ScorePdf::with_fetcher(Arc::new(fetcher), config);
    let outcome = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), None)
        .await
        .unwrap();

    assert_eq!(outcome.acquired, 2);
    assert_heights(&page_heights(&outcome.output.unwrap()), &[595.0, 1190.0]);
}

#[tokio::test]
async fn test_no_images_downloaded_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let url = page_url(1, "png");

    let mut session = MockSession::default().with_score(SOURCE_A, &[url.as_str()]);
    let scraper = ScorePdf::with_fetcher(Arc::new(MockFetcher::default()), config.clone());

    let outcome = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), None)
        .await
        .unwrap();

    assert_eq!((outcome.discovered, outcome.acquired), (1, 0));
    assert!(outcome.output.is_none());
    assert!(!config.output.work_dir.exists());
    assert!(!config.output.output_dir.exists());
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[tokio::test]
async fn test_sources_concatenated_in_order() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let mut session = MockSession::default()
        .with_score(SOURCE_A, &["a1", "a2"])
        .with_score(SOURCE_B, &[])
        .with_score(SOURCE_C, &["c1"]);

    let sources: Vec<SourceUrl> = [SOURCE_A, SOURCE_B, SOURCE_C]
        .iter()
        .map(|s| SourceUrl::parse(s).unwrap())
        .collect();
    let urls = PageDiscoverer::new(config.viewer)
        .discover(&mut session, &sources)
        .await
        .unwrap();

    assert_eq!(urls, vec!["a1", "a2", "c1"]);
    assert_eq!(session.navigations, vec![SOURCE_A, SOURCE_B, SOURCE_C]);
    assert_eq!(session.closed, 1);
}

#[tokio::test]
async fn test_discovery_follows_scroll_position() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let pages: Vec<String> = (1..=6).map(|n| format!("p{n}")).collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let mut session = MockSession::default().with_score(SOURCE_A, &page_refs);

    let urls = PageDiscoverer::new(config.viewer)
        .discover(&mut session, &[SourceUrl::parse(SOURCE_A).unwrap()])
        .await
        .unwrap();

    // Every page only appears after scrolling past the previous one
    assert_eq!(urls, pages);
    assert_eq!(session.scrolls, 6);
}

#[tokio::test]
async fn test_zero_urls_creates_no_work_dir() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let mut session = MockSession::default().with_score(SOURCE_A, &[]);
    let fetcher = Arc::new(MockFetcher::default());

    let scraper = ScorePdf::with_fetcher(fetcher.clone(), config.clone());
    let outcome = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), None)
        .await
        .unwrap();

    assert_eq!(outcome.discovered, 0);
    assert!(outcome.output.is_none());
    assert!(fetcher.requests().is_empty());
    assert!(!config.output.work_dir.exists());
    assert!(!config.output.output_dir.exists());
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_missing_container_aborts_and_releases_session() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    // SOURCE_B has no viewer container
    let mut session = MockSession::default().with_score(SOURCE_A, &["a1"]);
    let fetcher = Arc::new(MockFetcher::default().serve("a1", png(10, 10)));

    let scraper = ScorePdf::with_fetcher(fetcher.clone(), config.clone());
    let err = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A, SOURCE_B]), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ViewerContainerMissing { ref url } if url == SOURCE_B));
    assert_eq!(session.closed, 1);
    assert!(fetcher.requests().is_empty());
    assert!(!config.output.work_dir.exists());
}

#[tokio::test]
async fn test_invalid_config_releases_session() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.viewer.page_xpath = "//div/img".to_string();
    let mut session = MockSession::default().with_score(SOURCE_A, &["a1"]);

    let scraper = ScorePdf::with_fetcher(Arc::new(MockFetcher::default()), config);
    let err = scraper
        .run_with_session(&mut session, &job(&[SOURCE_A]), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConfigInvalid { .. }));
    assert_eq!(session.closed, 1);
    assert!(session.navigations.is_empty());
}

#[test]
fn test_invalid_source_is_rejected_before_work() {
    let err = ScoreJob::from_urls(&[SOURCE_A, "musescore.com/no-scheme"], "T", "C").unwrap_err();
    assert_eq!(err.to_string(), "Invalid URL: 'musescore.com/no-scheme'");
}
