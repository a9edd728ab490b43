//! Image acquisition: download discovered page images into the work
//! directory, rasterizing vector pages on the way.

mod fetch;

pub use fetch::{HttpFetcher, ImageFetcher};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::normalize;

/// Extension used when the URL's last path segment has none.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Extension of the vector format that gets rasterized before assembly.
pub const VECTOR_EXTENSION: &str = "svg";

/// Progress callback, called with `(done, total)` after each image URL.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Downloads image URLs in order and hands back the usable local files.
pub struct ImageAcquirer {
    fetcher: Arc<dyn ImageFetcher>,
    raster_width: u32,
}

impl ImageAcquirer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, raster_width: u32) -> Self {
        Self {
            fetcher,
            raster_width,
        }
    }

    /// Fetch every URL into `dest` as `{index:03}.{ext}`.
    ///
    /// Failed downloads and failed SVG conversions are logged and left out,
    /// so the result may be shorter than `urls` but keeps their order. Errors
    /// that are not about a single image (local I/O) abort the whole run.
    pub async fn acquire(
        &self,
        urls: &[String],
        dest: &Path,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<PathBuf>> {
        let total = urls.len();
        let mut paths = Vec::with_capacity(total);

        for (i, url) in urls.iter().enumerate() {
            if let Some(path) = self.acquire_one(i, url, dest).await? {
                paths.push(path);
            }
            if let Some(callback) = progress {
                callback(i + 1, total);
            }
        }

        info!("Acquired {} of {} images", paths.len(), total);
        Ok(paths)
    }

    async fn acquire_one(&self, index: usize, url: &str, dest: &Path) -> Result<Option<PathBuf>> {
        let extension = extension_for(url);
        let file_path = dest.join(file_name(index, &extension));

        if let Err(e) = self.fetcher.fetch_to(url, &file_path).await {
            if file_path.exists() {
                if let Err(remove_err) = std::fs::remove_file(&file_path) {
                    warn!("Failed to remove partial {}: {}", file_path.display(), remove_err);
                }
            }
            return skip_or_abort(url, e);
        }

        let stored = if extension == VECTOR_EXTENSION {
            info!("Converting {} to PNG...", file_path.display());
            match normalize::normalize_svg(&file_path, self.raster_width) {
                Ok(png_path) => png_path,
                Err(e) => return skip_or_abort(url, e),
            }
        } else {
            file_path.clone()
        };

        info!("Downloaded: {}", file_path.display());
        Ok(Some(stored))
    }
}

fn skip_or_abort(url: &str, error: Error) -> Result<Option<PathBuf>> {
    if error.is_per_image() {
        warn!("Skipping {}: {}", url, error);
        Ok(None)
    } else {
        Err(error)
    }
}

/// Zero-padded (at least 3 digits) sequence index plus extension.
pub fn file_name(index: usize, extension: &str) -> String {
    format!("{index:03}.{extension}")
}

/// Extension of the URL's last path segment, lowercased, query stripped.
///
/// Falls back to [`DEFAULT_EXTENSION`] when the segment has no usable
/// extension.
pub fn extension_for(url: &str) -> String {
    let segment = Url::parse(url).map_or_else(
        |_| {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/').next().unwrap_or("").to_string()
        },
        |parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or("")
                .to_string()
        },
    );

    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}
