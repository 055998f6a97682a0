use crate::buildpack::{Buildpack, UnpackedBuildpack};
use crate::http::Downloader;
use crate::sources::{ArchiveUrlSource, LocalDirectorySource, SourceError};
use crate::tar::Extractor;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Turns buildpack references into locally materialized buildpacks.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves every reference, returning exactly one buildpack per reference, in order.
    async fn resolve(
        &self,
        references: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Vec<Buildpack>, ResolveError>;
}

/// Materializes one kind of buildpack reference.
#[async_trait]
pub trait Source: Send + Sync {
    fn handles(&self, reference: &str) -> bool;

    /// Makes the buildpack available in `destination`, an empty directory owned by the caller.
    async fn unpack(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<UnpackedBuildpack, SourceError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("Failed to resolve buildpack `{reference}`: {source}")]
    Source {
        reference: String,
        #[source]
        source: SourceError,
    },
    #[error("Failed to clear buildpack working directory {0}: {1}")]
    ClearWorkDir(PathBuf, #[source] std::io::Error),
    #[error("Failed to create buildpack working directory {0}: {1}")]
    CreateWorkDir(PathBuf, #[source] std::io::Error),
    #[error("Buildpack resolution was cancelled")]
    Cancelled,
}

/// A [`Resolver`] that asks each installed [`Source`], in order, to handle a reference.
///
/// The first source that handles a reference unpacks it into its own directory below `work_dir`.
/// References that no source handles become [`Buildpack::Unresolved`].
pub struct SourceResolver {
    work_dir: PathBuf,
    sources: Vec<Box<dyn Source>>,
}

impl SourceResolver {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            sources: Vec::new(),
        }
    }

    /// A resolver for local buildpack directories and buildpack tarball URLs.
    pub fn with_default_sources(
        work_dir: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self::new(work_dir)
            .with_source(LocalDirectorySource)
            .with_source(ArchiveUrlSource::new(downloader, extractor))
    }

    pub fn install_sources(&mut self, sources: impl IntoIterator<Item = Box<dyn Source>>) {
        self.sources.extend(sources);
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    fn source_for(&self, reference: &str) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|source| source.handles(reference))
            .map(Box::as_ref)
    }
}

#[async_trait]
impl Resolver for SourceResolver {
    async fn resolve(
        &self,
        references: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Vec<Buildpack>, ResolveError> {
        let mut buildpacks = Vec::with_capacity(references.len());

        for (index, reference) in references.iter().enumerate() {
            if cancellation.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            let Some(source) = self.source_for(reference) else {
                tracing::debug!(%reference, "no source handles buildpack, passing through");
                buildpacks.push(Buildpack::Unresolved(reference.clone()));
                continue;
            };

            let destination = self.work_dir.join(format!("buildpack-{index}"));
            prepare_destination(&destination)?;

            let unpacked = tokio::select! {
                biased;
                () = cancellation.cancelled() => return Err(ResolveError::Cancelled),
                result = source.unpack(reference, &destination) => {
                    result.map_err(|source| ResolveError::Source {
                        reference: reference.clone(),
                        source,
                    })?
                }
            };

            tracing::debug!(
                %reference,
                local_dir = %unpacked.local_dir.display(),
                "resolved buildpack"
            );
            buildpacks.push(Buildpack::Unpacked(unpacked));
        }

        Ok(buildpacks)
    }
}

/// Leaves an empty directory at `destination`, removing whatever an earlier resolution left there.
fn prepare_destination(destination: &Path) -> Result<(), ResolveError> {
    match fs::remove_dir_all(destination) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => return Err(ResolveError::ClearWorkDir(destination.to_path_buf(), error)),
    }

    fs::create_dir_all(destination)
        .map_err(|error| ResolveError::CreateWorkDir(destination.to_path_buf(), error))
}
