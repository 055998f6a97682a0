use crate::buildpack::{Buildpack, IdDictionary, ShimmedBuildpack};
use crate::config::ShimmerConfig;
use crate::descriptor::{shim_descriptor, write_descriptor, DescriptorError};
use crate::fetch::{fetch_shim_runtime, FetchError};
use crate::http::{Downloader, HttpDownloader};
use crate::overlay::{apply_overlay, OverlayError};
use crate::resolver::{ResolveError, Resolver, SourceResolver};
use crate::sanitize::sanitize_buildpack_id;
use crate::tar::{Extractor, TarballExtractor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum ShimmerError {
    #[error("{0}")]
    Fetch(#[source] FetchError),
    #[error("{0}")]
    Resolve(#[source] ResolveError),
    #[error("Resolver returned {actual} buildpacks for {expected} references")]
    ResolvedCountMismatch { expected: usize, actual: usize },
    #[error("Failed to shim buildpack `{0}`: {1}")]
    Descriptor(String, #[source] DescriptorError),
    #[error("Failed to shim buildpack `{0}`: {1}")]
    Overlay(String, #[source] OverlayError),
    #[error("Shimming was cancelled")]
    Cancelled,
}

/// Prepares classic buildpacks so that a CNB builder can run them.
///
/// Each buildpack gets a `buildpack.toml` and the files of the
/// [cnb-shim](https://github.com/heroku/cnb-shim) release archive.
pub struct Shimmer {
    config: ShimmerConfig,
    resolver: Box<dyn Resolver>,
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn Extractor>,
}

impl Shimmer {
    /// A shimmer that resolves local directories and tarball URLs into `work_dir`.
    pub fn new(config: ShimmerConfig, work_dir: impl Into<PathBuf>) -> Self {
        let downloader: Arc<dyn Downloader> = Arc::new(HttpDownloader::new());
        let extractor: Arc<dyn Extractor> = Arc::new(TarballExtractor);
        let resolver =
            SourceResolver::with_default_sources(work_dir, downloader.clone(), extractor.clone());

        Self {
            config,
            resolver: Box::new(resolver),
            downloader,
            extractor,
        }
    }

    /// A shimmer using the given resolver. Downloads and extraction use the defaults.
    pub fn with_resolver(config: ShimmerConfig, resolver: impl Resolver + 'static) -> Self {
        Self {
            config,
            resolver: Box::new(resolver),
            downloader: Arc::new(HttpDownloader::new()),
            extractor: Arc::new(TarballExtractor),
        }
    }

    /// Replaces the downloader used to fetch the shim runtime.
    #[must_use]
    pub fn downloader(mut self, downloader: impl Downloader + 'static) -> Self {
        self.downloader = Arc::new(downloader);
        self
    }

    /// Replaces the extractor used to overlay the shim runtime.
    #[must_use]
    pub fn extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ShimmerConfig {
        &self.config
    }

    /// Shims every buildpack in `references`.
    ///
    /// Returns one buildpack per reference, in order. Buildpacks that were unpacked locally are
    /// returned as [`Buildpack::Shimmed`], everything else is returned as the resolver produced
    /// it. The returned dictionary maps the original name of each shimmed buildpack to the id
    /// written into its `buildpack.toml`.
    ///
    /// Processing stops at the first error. Buildpacks shimmed before the error stay shimmed.
    pub async fn apply(
        &self,
        cancellation: &CancellationToken,
        references: &[String],
    ) -> Result<(Vec<Buildpack>, IdDictionary), ShimmerError> {
        let shim_archive = fetch_shim_runtime(&self.config, self.downloader.as_ref(), cancellation)
            .await
            .map_err(ShimmerError::Fetch)?;

        let mut buildpacks = self
            .resolver
            .resolve(references, cancellation)
            .await
            .map_err(ShimmerError::Resolve)?;

        if buildpacks.len() != references.len() {
            return Err(ShimmerError::ResolvedCountMismatch {
                expected: references.len(),
                actual: buildpacks.len(),
            });
        }

        let mut ids = IdDictionary::new();

        for buildpack in &mut buildpacks {
            if cancellation.is_cancelled() {
                return Err(ShimmerError::Cancelled);
            }

            let Some(unpacked) = buildpack.as_unpacked() else {
                tracing::debug!(?buildpack, "buildpack is not unpacked, skipping");
                continue;
            };

            let name = unpacked.origin.original_buildpack().to_string();
            let id = sanitize_buildpack_id(unpacked.origin.canonical_buildpack());

            write_descriptor(
                &unpacked.local_dir,
                &shim_descriptor(&self.config, &id, unpacked),
            )
            .map_err(|error| ShimmerError::Descriptor(name.clone(), error))?;

            apply_overlay(
                self.extractor.as_ref(),
                shim_archive.path(),
                &unpacked.local_dir,
            )
            .map_err(|error| ShimmerError::Overlay(name.clone(), error))?;

            if let Some((other, _)) = ids
                .iter()
                .find(|(other, other_id)| **other_id == id && **other != name)
            {
                tracing::warn!(
                    buildpack = %name,
                    other = %other,
                    id = %id,
                    "buildpack id is shared with another buildpack"
                );
            }

            tracing::info!(
                buildpack = %name,
                id = %id,
                local_dir = %unpacked.local_dir.display(),
                "shimmed buildpack"
            );

            let shimmed = ShimmedBuildpack {
                unpacked: unpacked.clone(),
            };
            *buildpack = Buildpack::Shimmed(shimmed);
            ids.insert(name, id);
        }

        Ok((buildpacks, ids))
    }
}
