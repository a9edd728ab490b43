use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};

/// Backend that stores the body of an image URL into a local file.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Plain HTTP GET with a browser-like user agent, body streamed to disk.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::DownloadRequest {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let request_error = |e: reqwest::Error| Error::DownloadRequest {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(request_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Fetched {} bytes from {}", written, url);
        Ok(written)
    }
}
