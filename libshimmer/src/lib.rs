#![doc = include_str!("../README.md")]

pub mod buildpack;
pub mod config;
pub mod descriptor;
pub mod fetch;
pub mod http;
pub mod overlay;
pub mod resolver;
pub mod sanitize;
mod shimmer;
pub mod sources;
pub mod tar;
#[cfg(test)]
mod test_helper;

pub use buildpack::{Buildpack, BuildpackOrigin, IdDictionary, ShimmedBuildpack, UnpackedBuildpack};
pub use config::ShimmerConfig;
pub use shimmer::{Shimmer, ShimmerError};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
use indoc as _;
