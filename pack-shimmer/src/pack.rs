use libshimmer::Buildpack;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

/// Represents a `pack build` command.
#[derive(Clone, Debug)]
pub(crate) struct PackBuildCommand {
    builder: String,
    buildpacks: Vec<BuildpackReference>,
    env: BTreeMap<String, String>,
    image_name: String,
    path: PathBuf,
    pull_policy: Option<PullPolicy>,
    trust_builder: bool,
    verbose: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum BuildpackReference {
    Id(String),
    Path(PathBuf),
}

impl From<Buildpack> for BuildpackReference {
    fn from(buildpack: Buildpack) -> Self {
        match buildpack {
            Buildpack::Unresolved(reference) => BuildpackReference::Id(reference),
            Buildpack::Unpacked(unpacked) => BuildpackReference::Path(unpacked.local_dir),
            Buildpack::Shimmed(shimmed) => BuildpackReference::Path(shimmed.unpacked.local_dir),
        }
    }
}

/// Controls whether Pack should pull images.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub(crate) enum PullPolicy {
    /// Always pull images.
    Always,
    /// Use local images if they are already present, rather than pulling updated images.
    IfNotPresent,
    /// Never pull images. If the required images are not already available locally the pack command will fail.
    Never,
}

impl PackBuildCommand {
    pub(crate) fn new(
        builder: impl Into<String>,
        path: impl Into<PathBuf>,
        image_name: impl Into<String>,
    ) -> PackBuildCommand {
        PackBuildCommand {
            builder: builder.into(),
            buildpacks: Vec::new(),
            env: BTreeMap::new(),
            image_name: image_name.into(),
            path: path.into(),
            pull_policy: None,
            trust_builder: false,
            verbose: false,
        }
    }

    pub(crate) fn buildpack(&mut self, b: impl Into<BuildpackReference>) -> &mut Self {
        self.buildpacks.push(b.into());
        self
    }

    pub(crate) fn env(&mut self, k: impl Into<String>, v: impl Into<String>) -> &mut Self {
        self.env.insert(k.into(), v.into());
        self
    }

    pub(crate) fn pull_policy(&mut self, pull_policy: PullPolicy) -> &mut Self {
        self.pull_policy = Some(pull_policy);
        self
    }

    pub(crate) fn trust_builder(&mut self, trust_builder: bool) -> &mut Self {
        self.trust_builder = trust_builder;
        self
    }

    pub(crate) fn verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }
}

impl From<PackBuildCommand> for Command {
    fn from(pack_build_command: PackBuildCommand) -> Self {
        let mut command = Command::new("pack");

        let mut args = vec![
            String::from("build"),
            pack_build_command.image_name,
            String::from("--builder"),
            pack_build_command.builder,
            String::from("--path"),
            pack_build_command.path.to_string_lossy().to_string(),
        ];

        if let Some(pull_policy) = pack_build_command.pull_policy {
            args.push(String::from("--pull-policy"));
            args.push(String::from(match pull_policy {
                PullPolicy::Always => "always",
                PullPolicy::IfNotPresent => "if-not-present",
                PullPolicy::Never => "never",
            }));
        }

        for buildpack in pack_build_command.buildpacks {
            args.push(String::from("--buildpack"));

            match buildpack {
                BuildpackReference::Id(id) => {
                    args.push(id);
                }
                BuildpackReference::Path(path_buf) => {
                    args.push(path_buf.to_string_lossy().to_string());
                }
            }
        }

        for (env_key, env_value) in &pack_build_command.env {
            args.push(String::from("--env"));
            args.push(format!("{env_key}={env_value}"));
        }

        if pack_build_command.trust_builder {
            args.push(String::from("--trust-builder"));
        }

        if pack_build_command.verbose {
            args.push(String::from("--verbose"));
        }

        command.args(args);

        command
    }
}
