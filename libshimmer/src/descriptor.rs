use crate::buildpack::UnpackedBuildpack;
use crate::config::{ShimmerConfig, DEFAULT_BUILDPACK_VERSION};
use libshimmer_data::descriptor::ShimBuildpackDescriptor;
use libshimmer_data::toml_file::{read_toml_file, TomlFileError};
use std::fs;
use std::path::{Path, PathBuf};

pub const BUILDPACK_TOML: &str = "buildpack.toml";

#[derive(thiserror::Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to create buildpack.toml content: {0}")]
    Render(#[source] toml::ser::Error),
    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("Failed to set permissions of {0}: {1}")]
    SetPermissions(PathBuf, #[source] std::io::Error),
}

/// Builds the descriptor for an unpacked buildpack that is about to be shimmed.
#[must_use]
pub fn shim_descriptor(
    config: &ShimmerConfig,
    id: &str,
    unpacked: &UnpackedBuildpack,
) -> ShimBuildpackDescriptor {
    ShimBuildpackDescriptor::new(
        config.buildpack_api_version(),
        id,
        unpacked.origin.original_buildpack(),
        unpacked
            .origin
            .requested_version()
            .unwrap_or(DEFAULT_BUILDPACK_VERSION),
        config.buildpack_stacks(),
    )
}

pub fn render_descriptor(descriptor: &ShimBuildpackDescriptor) -> Result<String, DescriptorError> {
    toml::to_string(descriptor).map_err(DescriptorError::Render)
}

/// Writes `buildpack.toml` into `buildpack_dir`, replacing any descriptor already there.
///
/// The file is made readable and executable for the build step that runs afterwards.
pub fn write_descriptor(
    buildpack_dir: &Path,
    descriptor: &ShimBuildpackDescriptor,
) -> Result<PathBuf, DescriptorError> {
    let contents = render_descriptor(descriptor)?;
    let path = buildpack_dir.join(BUILDPACK_TOML);

    fs::write(&path, contents).map_err(|error| DescriptorError::Write(path.clone(), error))?;
    set_descriptor_permissions(&path)
        .map_err(|error| DescriptorError::SetPermissions(path.clone(), error))?;

    Ok(path)
}

pub fn read_descriptor(buildpack_dir: &Path) -> Result<ShimBuildpackDescriptor, TomlFileError> {
    read_toml_file(buildpack_dir.join(BUILDPACK_TOML))
}

#[cfg(target_family = "unix")]
fn set_descriptor_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(target_family = "unix"))]
fn set_descriptor_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
