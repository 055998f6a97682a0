use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::{SpanBackendWithUrl, TracingMiddleware};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_RETRIES: u32 = 5;

/// Fetches the bytes behind a URL into a file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `destination`, creating or truncating the file.
    async fn download(&self, url: &str, destination: &Path) -> Result<(), DownloadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Could not construct HTTP client\nError: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to `{0}` failed\nError: {1}")]
    Request(String, #[source] reqwest_middleware::Error),
    #[error("Reading response from request to `{0}` failed\nError: {1}")]
    ReadResponse(String, #[source] reqwest::Error),
    #[error("Could not open file at `{0}` for download of `{1}`\nError: {2}")]
    OpenFile(PathBuf, String, #[source] io::Error),
    #[error("Could not write to file at `{0}` for download of `{1}`\nError: {2}")]
    WriteFile(PathBuf, String, #[source] io::Error),
}

/// Downloads over HTTP(S), retrying transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    connect_timeout: Duration,
    read_timeout: Duration,
    max_retries: u32,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_retries: DEFAULT_RETRIES,
        }
    }
}

impl HttpDownloader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn client(&self) -> Result<ClientWithMiddleware, DownloadError> {
        let client = reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(self.max_retries),
            ))
            .with(TracingMiddleware::<SpanBackendWithUrl>::new())
            .build())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        let mut response = self
            .client()?
            .get(url)
            .send()
            .await
            .and_then(|res| {
                res.error_for_status()
                    .map_err(reqwest_middleware::Error::Reqwest)
            })
            .map_err(|e| DownloadError::Request(url.to_string(), e))?;

        let mut writer = tokio::fs::File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(destination)
            .await
            .map_err(|e| DownloadError::OpenFile(destination.to_path_buf(), url.to_string(), e))?;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::ReadResponse(url.to_string(), e))?
        {
            writer.write_all(&chunk).await.map_err(|e| {
                DownloadError::WriteFile(destination.to_path_buf(), url.to_string(), e)
            })?;
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::WriteFile(destination.to_path_buf(), url.to_string(), e))?;

        tracing::debug!(url, destination = %destination.display(), "download finished");

        Ok(())
    }
}
