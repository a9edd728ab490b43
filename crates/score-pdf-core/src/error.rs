use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for score-pdf-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Source URL and job validation
/// - Browser automation (launch, navigation, DOM queries)
/// - Image downloads and SVG rasterization
/// - PDF assembly
/// - Configuration loading and validation
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Input Errors
    // ==========================================================================
    /// Source URL does not match the accepted URL grammar
    #[error("Invalid URL: '{0}'")]
    InvalidSourceUrl(String),

    /// Score job is missing a required field
    #[error("invalid job: {0}")]
    InvalidJob(String),

    // ==========================================================================
    // Browser Errors
    // ==========================================================================
    /// Failed to launch or configure the browser
    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),

    /// A DevTools command failed for a reason other than a missing element
    #[error("browser error: {0}")]
    Browser(String),

    /// The page has no scroll container, so its layout is unsupported
    #[error("viewer container not found on {url} (unsupported page layout)")]
    ViewerContainerMissing { url: String },

    // ==========================================================================
    // Download Errors
    // ==========================================================================
    /// Request could not be sent or the body could not be read
    #[error("failed to download {url}: {reason}")]
    DownloadRequest { url: String, reason: String },

    /// Server answered with a non-success status
    #[error("failed to download {url}: HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    // ==========================================================================
    // Image Errors
    // ==========================================================================
    /// SVG could not be parsed or rendered
    #[error("failed to rasterize {}: {reason}", path.display())]
    Rasterize { path: PathBuf, reason: String },

    /// Raster image could not be read or decoded
    #[error("failed to decode image {}: {reason}", path.display())]
    ImageDecode { path: PathBuf, reason: String },

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Document layout could not be built
    #[error("failed to assemble PDF: {0}")]
    PdfAssemble(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error only affects a single downloaded image, which is then
    /// left out of the score. Decode errors at assembly time are fatal.
    pub const fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::DownloadRequest { .. }
                | Self::DownloadStatus { .. }
                | Self::Rasterize { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
