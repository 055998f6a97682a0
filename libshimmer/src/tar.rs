use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use tar::Archive;

/// Unpacks an archive file into a directory.
pub trait Extractor: Send + Sync {
    /// Extracts `archive` into `destination`, merging with any files already there.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Could not open archive {0}: {1}")]
    OpenArchive(PathBuf, #[source] std::io::Error),
    #[error("Could not unpack archive {0} into {1}: {2}")]
    Unpack(PathBuf, PathBuf, #[source] std::io::Error),
}

/// Extracts gzip compressed tarballs (`.tgz`, `.tar.gz`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TarballExtractor;

impl Extractor for TarballExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError> {
        let mut tarball = File::open(archive)
            .map_err(|error| ExtractError::OpenArchive(archive.to_path_buf(), error))?;

        decompress_tarball(&mut tarball, destination).map_err(|error| {
            ExtractError::Unpack(archive.to_path_buf(), destination.to_path_buf(), error)
        })
    }
}

/// Decompresses and untars a given .tar.gz file to the given directory.
pub(crate) fn decompress_tarball(
    tarball: &mut File,
    destination: impl AsRef<Path>,
) -> Result<(), std::io::Error> {
    tarball.rewind()?;
    let mut archive = Archive::new(GzDecoder::new(tarball));
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);
    archive.unpack(destination)
}
