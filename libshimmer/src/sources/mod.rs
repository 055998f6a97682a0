//! Built-in [`Source`](crate::resolver::Source) implementations for the
//! [`SourceResolver`](crate::resolver::SourceResolver).

mod archive_url;
mod local_directory;

pub use archive_url::ArchiveUrlSource;
pub use local_directory::LocalDirectorySource;

use crate::http::DownloadError;
use crate::tar::ExtractError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Could not copy {0} to {1}: {2}")]
    Copy(PathBuf, PathBuf, #[source] fs_extra::error::Error),
    #[error("Could not canonicalize {0}: {1}")]
    Canonicalize(PathBuf, #[source] std::io::Error),
    #[error("Could not create temporary file for buildpack archive: {0}")]
    CreateTempFile(#[source] std::io::Error),
    #[error("Could not download buildpack archive: {0}")]
    Download(#[source] DownloadError),
    #[error("Could not extract buildpack archive: {0}")]
    Extract(#[source] ExtractError),
}
