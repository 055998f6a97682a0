use super::SourceError;
use crate::buildpack::{BuildpackOrigin, UnpackedBuildpack};
use crate::resolver::Source;
use async_trait::async_trait;
use fs_extra::dir::CopyOptions;
use std::fs;
use std::path::Path;

/// Handles references to buildpack directories on the local file system.
///
/// The directory is copied, so shimming never modifies the user's copy of the buildpack.
/// References may be plain paths or `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirectorySource;

fn local_path(reference: &str) -> &Path {
    Path::new(reference.strip_prefix("file://").unwrap_or(reference))
}

#[async_trait]
impl Source for LocalDirectorySource {
    fn handles(&self, reference: &str) -> bool {
        local_path(reference).is_dir()
    }

    async fn unpack(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<UnpackedBuildpack, SourceError> {
        let path = local_path(reference);
        let source_dir = fs::canonicalize(path)
            .map_err(|error| SourceError::Canonicalize(path.to_path_buf(), error))?;

        fs_extra::dir::copy(
            &source_dir,
            destination,
            &CopyOptions::new().content_only(true),
        )
        .map_err(|error| SourceError::Copy(source_dir.clone(), destination.to_path_buf(), error))?;

        Ok(UnpackedBuildpack::new(
            destination,
            BuildpackOrigin::new(source_dir.to_string_lossy(), reference),
        ))
    }
}
