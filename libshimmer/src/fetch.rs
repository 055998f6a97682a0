use crate::config::ShimmerConfig;
use crate::http::{DownloadError, Downloader};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

const CNB_SHIM_ARTIFACT: &str = "cnb-shim";

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Failed to create temporary file for cnb-shim: {0}")]
    CreateTempFile(#[source] std::io::Error),
    #[error("Failed to fetch cnb-shim from {0}: {1}")]
    Download(String, #[source] DownloadError),
    #[error("Fetching cnb-shim was cancelled")]
    Cancelled,
}

/// The URL of the cnb-shim release archive for the configured version.
#[must_use]
pub fn shim_runtime_url(config: &ShimmerConfig) -> String {
    let version = config.cnb_shim_version();
    format!(
        "{}/v{version}/{CNB_SHIM_ARTIFACT}-v{version}.tgz",
        config.cnb_shim_release_url().trim_end_matches('/')
    )
}

/// Downloads the cnb-shim release archive into a new temporary file.
///
/// The file is deleted when the returned handle is dropped.
pub async fn fetch_shim_runtime(
    config: &ShimmerConfig,
    downloader: &dyn Downloader,
    cancellation: &CancellationToken,
) -> Result<NamedTempFile, FetchError> {
    let url = shim_runtime_url(config);
    let archive = tempfile::Builder::new()
        .prefix("cnb-shim-")
        .suffix(".tgz")
        .tempfile()
        .map_err(FetchError::CreateTempFile)?;

    tracing::info!(%url, "fetching cnb-shim");

    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(FetchError::Cancelled),
        result = downloader.download(&url, archive.path()) => {
            result.map_err(|error| FetchError::Download(url, error))?;
            Ok(archive)
        }
    }
}
