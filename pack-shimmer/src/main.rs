#![doc = include_str!("../README.md")]

mod cli;
mod exit_code;
mod pack;

use crate::cli::{BuildArgs, Cli, PackShimmerSubcommand};
use crate::pack::PackBuildCommand;
use clap::Parser;
use libshimmer::{CancellationToken, Shimmer, ShimmerConfig, ShimmerError};
use libshimmer_data::toml_file::{read_toml_file, TomlFileError};
use std::path::PathBuf;
use std::process::Command;
use tracing_subscriber::EnvFilter;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use indoc as _;

#[derive(thiserror::Error, Debug)]
enum BuildError {
    #[error("Could not read config file {0}: {1}")]
    ReadConfig(PathBuf, #[source] TomlFileError),
    #[error("Could not create working directory: {0}")]
    CreateWorkDir(#[source] std::io::Error),
    #[error("{0}")]
    Shimmer(#[source] ShimmerError),
    #[error("Could not run pack: {0}")]
    RunPack(#[source] std::io::Error),
    #[error("Could not wait for pack to finish: {0}")]
    WaitForPack(#[source] tokio::task::JoinError),
}

#[tokio::main]
async fn main() {
    let exit_code = match Cli::parse().command {
        PackShimmerSubcommand::Build(args) => {
            setup_logging(args.verbose);
            run_build_command(args).await.unwrap_or_else(|error| on_error(&error))
        }
    };

    std::process::exit(exit_code);
}

async fn run_build_command(args: BuildArgs) -> Result<i32, BuildError> {
    let config = load_config(&args)?;

    // Shimmed buildpacks are passed to pack by path, so they must outlive the pack invocation.
    let work_dir = tempfile::Builder::new()
        .prefix("pack-shimmer-")
        .tempdir()
        .map_err(BuildError::CreateWorkDir)?;

    let cancellation = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancellation.clone()));

    let shimmer = Shimmer::new(config, work_dir.path());
    tracing::info!(
        "Shimming with cnb-shim {} for buildpack API {}",
        shimmer.config().cnb_shim_version(),
        shimmer.config().buildpack_api_version()
    );
    let (buildpacks, ids) = shimmer
        .apply(&cancellation, &args.buildpacks)
        .await
        .map_err(BuildError::Shimmer)?;

    for (name, id) in &ids {
        tracing::info!("Shimmed buildpack {name} as {id}");
    }

    let mut pack_build_command = PackBuildCommand::new(args.builder, args.path, args.image);
    for buildpack in buildpacks {
        pack_build_command.buildpack(buildpack);
    }
    for (key, value) in args.env {
        pack_build_command.env(key, value);
    }
    if let Some(pull_policy) = args.pull_policy {
        pack_build_command.pull_policy(pull_policy);
    }
    pack_build_command
        .trust_builder(args.trust_builder)
        .verbose(args.verbose);

    let mut command: Command = pack_build_command.into();
    tracing::debug!(?command, "running pack");

    let status = tokio::task::spawn_blocking(move || command.status())
        .await
        .map_err(BuildError::WaitForPack)?
        .map_err(BuildError::RunPack)?;

    if !status.success() {
        tracing::error!("pack build failed: {status}");
    }

    Ok(status.code().unwrap_or(exit_code::UNSPECIFIED_ERROR))
}

/// Layers the command line flags over the config file, if one was given.
fn load_config(args: &BuildArgs) -> Result<ShimmerConfig, BuildError> {
    let file_config = match &args.config {
        Some(path) => read_toml_file::<ShimmerConfig>(path)
            .map_err(|error| BuildError::ReadConfig(path.clone(), error))?,
        None => ShimmerConfig::default(),
    };

    Ok(file_config.merge(args.shimmer_config()))
}

async fn cancel_on_interrupt(cancellation: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted, cancelling");
        cancellation.cancel();
    }
}

fn on_error(error: &BuildError) -> i32 {
    tracing::error!("{error}");
    exit_code::UNSPECIFIED_ERROR
}

fn setup_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
