use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Placeholder substituted with the 1-based page index in `page_xpath`.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Desktop Chrome user agent; some image hosts reject non-browser clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_5) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/50.0.2661.102 Safari/537.36";

/// Locators and timings for the virtualized page viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// XPath of the scrollable container holding one child per page
    #[serde(default = "default_container_xpath")]
    pub container_xpath: String,

    /// XPath of a page image, with `{page}` standing for the page index
    #[serde(default = "default_page_xpath")]
    pub page_xpath: String,

    /// Attribute of the page element that carries the image URL
    #[serde(default = "default_image_attribute")]
    pub image_attribute: String,

    /// How long to wait for a page element before treating it as the end
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Delay between presence checks while waiting
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after an element appears so its lazy `src` gets filled in
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Extra pixels scrolled past each page's height
    #[serde(default = "default_scroll_margin")]
    pub scroll_margin: f64,
}

fn default_container_xpath() -> String {
    r#"//*[@id="jmuse-scroller-component"]"#.to_string()
}

fn default_page_xpath() -> String {
    r#"//*[@id="jmuse-scroller-component"]/div[{page}]/img"#.to_string()
}

fn default_image_attribute() -> String {
    "src".to_string()
}

const fn default_wait_timeout_ms() -> u64 {
    5000
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_settle_delay_ms() -> u64 {
    2000
}

const fn default_scroll_margin() -> f64 {
    16.0
}

impl ViewerConfig {
    /// XPath of the page element at the given 1-based position.
    pub fn page_xpath(&self, page: usize) -> String {
        self.page_xpath.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            container_xpath: default_container_xpath(),
            page_xpath: default_page_xpath(),
            image_attribute: default_image_attribute(),
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            scroll_margin: default_scroll_margin(),
        }
    }
}

/// Chrome launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window
    #[serde(default)]
    pub headless: bool,

    /// Chrome/Chromium executable (auto-detected when unset)
    pub executable: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Additional command-line switches passed to Chrome
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

const fn default_window_width() -> u32 {
    1920
}

const fn default_window_height() -> u32 {
    1080
}

fn default_extra_args() -> Vec<String> {
    vec!["--start-maximized".to_string()]
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            extra_args: default_extra_args(),
        }
    }
}

/// Image download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Rasterization and PDF layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pixel width SVG pages are rasterized to (2480 px is A4 at 300 dpi)
    #[serde(default = "default_raster_width")]
    pub raster_width: u32,

    /// PDF page width in points; heights follow each image's aspect ratio
    #[serde(default = "default_page_width")]
    pub page_width: f32,

    /// Scratch directory for downloaded images, removed after each run
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory the finished PDF is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

const fn default_raster_width() -> u32 {
    2480
}

const fn default_page_width() -> f32 {
    595.0
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raster_width: default_raster_width(),
            page_width: default_page_width(),
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub viewer: ViewerConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/score-pdf/config.toml, ./score-pdf.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("score-pdf").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("score-pdf.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./score-pdf.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./score-pdf.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Reject values that would make a run loop forever or produce empty pages.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| Error::ConfigInvalid {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if !self.viewer.page_xpath.contains(PAGE_PLACEHOLDER) {
            return Err(invalid(
                "viewer.page_xpath",
                "must contain the {page} placeholder",
            ));
        }
        if self.viewer.wait_timeout_ms == 0 {
            return Err(invalid("viewer.wait_timeout_ms", "must be greater than zero"));
        }
        if self.viewer.poll_interval_ms == 0 {
            return Err(invalid("viewer.poll_interval_ms", "must be greater than zero"));
        }
        if !self.viewer.scroll_margin.is_finite() || self.viewer.scroll_margin < 0.0 {
            return Err(invalid("viewer.scroll_margin", "must be a non-negative number"));
        }
        if self.output.raster_width == 0 {
            return Err(invalid("output.raster_width", "must be greater than zero"));
        }
        if !self.output.page_width.is_finite() || self.output.page_width <= 0.0 {
            return Err(invalid("output.page_width", "must be a positive number"));
        }

        Ok(())
    }
}
