use super::SourceError;
use crate::buildpack::{BuildpackOrigin, UnpackedBuildpack};
use crate::http::Downloader;
use crate::resolver::Source;
use crate::tar::Extractor;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Handles `http(s)://` references to gzip compressed buildpack tarballs.
///
/// The archive is downloaded to a temporary file and extracted as-is into the buildpack
/// directory.
#[derive(Clone)]
pub struct ArchiveUrlSource {
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn Extractor>,
}

impl ArchiveUrlSource {
    pub fn new(downloader: Arc<dyn Downloader>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            downloader,
            extractor,
        }
    }
}

#[async_trait]
impl Source for ArchiveUrlSource {
    fn handles(&self, reference: &str) -> bool {
        let path = reference.split(['?', '#']).next().unwrap_or(reference);

        (reference.starts_with("https://") || reference.starts_with("http://"))
            && (path.ends_with(".tgz") || path.ends_with(".tar.gz"))
    }

    async fn unpack(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<UnpackedBuildpack, SourceError> {
        let archive = tempfile::Builder::new()
            .prefix("buildpack-")
            .suffix(".tgz")
            .tempfile()
            .map_err(SourceError::CreateTempFile)?;

        self.downloader
            .download(reference, archive.path())
            .await
            .map_err(SourceError::Download)?;

        self.extractor
            .extract(archive.path(), destination)
            .map_err(SourceError::Extract)?;

        Ok(UnpackedBuildpack::new(
            destination,
            BuildpackOrigin::new(reference, reference),
        ))
    }
}
