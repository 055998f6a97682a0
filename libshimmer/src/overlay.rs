use crate::tar::{ExtractError, Extractor};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error("Failed to unpack cnb-shim files into {0}: {1}")]
    Extract(PathBuf, #[source] ExtractError),
}

/// Extracts the shim runtime archive on top of a buildpack directory.
///
/// Files from the archive are added next to the buildpack's own files. Nothing is removed.
pub fn apply_overlay(
    extractor: &dyn Extractor,
    shim_archive: &Path,
    buildpack_dir: &Path,
) -> Result<(), OverlayError> {
    extractor
        .extract(shim_archive, buildpack_dir)
        .map_err(|error| OverlayError::Extract(buildpack_dir.to_path_buf(), error))
}
