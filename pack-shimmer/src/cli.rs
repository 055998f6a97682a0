use crate::pack::PullPolicy;
use clap::{Parser, Subcommand};
use libshimmer::ShimmerConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(bin_name = "pack-shimmer", version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: PackShimmerSubcommand,
}

#[derive(Subcommand)]
pub(crate) enum PackShimmerSubcommand {
    /// Shims classic buildpacks and builds an app image with pack
    Build(BuildArgs),
}

#[derive(Parser)]
pub(crate) struct BuildArgs {
    /// Name of the image to build
    pub(crate) image: String,
    /// Path to the app directory
    #[arg(long, default_value = ".")]
    pub(crate) path: PathBuf,
    /// Builder image to build with
    #[arg(long, env = "PACK_SHIMMER_BUILDER")]
    pub(crate) builder: String,
    /// Buildpack to use: a local directory, a .tgz URL or anything pack accepts
    #[arg(long = "buildpack", short = 'b')]
    pub(crate) buildpacks: Vec<String>,
    /// Build-time environment variable, in the form KEY=VALUE
    #[arg(long = "env", short = 'e', value_parser = parse_env_var)]
    pub(crate) env: Vec<(String, String)>,
    /// Trust the builder, allowing its lifecycle to run with access to credentials
    #[arg(long)]
    pub(crate) trust_builder: bool,
    /// Pull policy passed to pack
    #[arg(long, value_enum)]
    pub(crate) pull_policy: Option<PullPolicy>,
    /// Buildpack API version written to the shimmed buildpack.toml
    #[arg(long, env = "PACK_SHIMMER_API_VERSION")]
    pub(crate) api_version: Option<String>,
    /// Stack supported by the shimmed buildpacks, can be repeated
    #[arg(long = "stack", env = "PACK_SHIMMER_STACKS", value_delimiter = ',')]
    pub(crate) stacks: Vec<String>,
    /// Version of the cnb-shim release to inject
    #[arg(long, env = "PACK_SHIMMER_SHIM_VERSION")]
    pub(crate) shim_version: Option<String>,
    /// Base URL that cnb-shim releases are downloaded from
    #[arg(long, env = "PACK_SHIMMER_SHIM_RELEASE_URL")]
    pub(crate) shim_release_url: Option<String>,
    /// TOML file with shimming settings, overridden by flags
    #[arg(long, env = "PACK_SHIMMER_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    /// Enable debug logging, and verbose pack output
    #[arg(long, short = 'v')]
    pub(crate) verbose: bool,
}

impl BuildArgs {
    /// The shimming settings given on the command line, with unset flags left empty.
    pub(crate) fn shimmer_config(&self) -> ShimmerConfig {
        ShimmerConfig {
            api_version: self.api_version.clone().unwrap_or_default(),
            stacks: self.stacks.clone(),
            shim_version: self.shim_version.clone().unwrap_or_default(),
            shim_release_url: self.shim_release_url.clone().unwrap_or_default(),
        }
    }
}

fn parse_env_var(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{input}`")),
    }
}
