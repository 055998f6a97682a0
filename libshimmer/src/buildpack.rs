use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps each shimmed buildpack's original name to the id written into its `buildpack.toml`.
pub type IdDictionary = BTreeMap<String, String>;

/// A buildpack at some stage of the shimming pipeline.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Buildpack {
    /// A reference no resolver source could materialize locally. Passed through untouched.
    Unresolved(String),
    /// A buildpack that has been copied or unpacked into a local directory.
    Unpacked(UnpackedBuildpack),
    /// An unpacked buildpack that has had its descriptor written and the shim applied.
    Shimmed(ShimmedBuildpack),
}

impl Buildpack {
    /// Returns the unpacked buildpack if, and only if, this buildpack still needs shimming.
    #[must_use]
    pub fn as_unpacked(&self) -> Option<&UnpackedBuildpack> {
        match self {
            Buildpack::Unpacked(unpacked) => Some(unpacked),
            Buildpack::Unresolved(_) | Buildpack::Shimmed(_) => None,
        }
    }

    #[must_use]
    pub fn as_shimmed(&self) -> Option<&ShimmedBuildpack> {
        match self {
            Buildpack::Shimmed(shimmed) => Some(shimmed),
            Buildpack::Unresolved(_) | Buildpack::Unpacked(_) => None,
        }
    }

    /// The local directory of the buildpack, if it has been materialized.
    #[must_use]
    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            Buildpack::Unresolved(_) => None,
            Buildpack::Unpacked(unpacked) => Some(&unpacked.local_dir),
            Buildpack::Shimmed(shimmed) => Some(&shimmed.unpacked.local_dir),
        }
    }
}

/// Where an unpacked buildpack came from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BuildpackOrigin {
    canonical: String,
    original: String,
    requested_version: Option<String>,
}

impl BuildpackOrigin {
    pub fn new(canonical: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            original: original.into(),
            requested_version: None,
        }
    }

    #[must_use]
    pub fn with_requested_version(mut self, version: impl Into<String>) -> Self {
        self.requested_version = Some(version.into());
        self
    }

    /// Stable identity of the buildpack, for example a normalized URL.
    #[must_use]
    pub fn canonical_buildpack(&self) -> &str {
        &self.canonical
    }

    /// The name of the buildpack as the user requested it.
    #[must_use]
    pub fn original_buildpack(&self) -> &str {
        &self.original
    }

    /// The version the user requested, treating an empty version as absent.
    #[must_use]
    pub fn requested_version(&self) -> Option<&str> {
        self.requested_version
            .as_deref()
            .filter(|version| !version.is_empty())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnpackedBuildpack {
    pub local_dir: PathBuf,
    pub origin: BuildpackOrigin,
}

impl UnpackedBuildpack {
    pub fn new(local_dir: impl Into<PathBuf>, origin: BuildpackOrigin) -> Self {
        Self {
            local_dir: local_dir.into(),
            origin,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShimmedBuildpack {
    pub unpacked: UnpackedBuildpack,
}

impl ShimmedBuildpack {
    /// Path to the `buildpack.toml` written for the shim.
    #[must_use]
    pub fn buildpack_toml_path(&self) -> PathBuf {
        self.unpacked.local_dir.join("buildpack.toml")
    }
}
