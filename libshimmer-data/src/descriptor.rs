use serde::{Deserialize, Serialize};

/// Data structure for the descriptor (buildpack.toml) of a shimmed classic buildpack.
///
/// Only the subset of [buildpack.toml](https://github.com/buildpacks/spec/blob/main/buildpack.md#buildpacktoml-toml)
/// that the CNB shim needs is modelled. Serializing produces a top-level `api`, a single
/// `[buildpack]` table and one `[[stacks]]` entry per stack, in the given order. An empty stack
/// list produces no `stacks` key at all.
///
/// # Example:
/// ```
/// use libshimmer_data::descriptor::ShimBuildpackDescriptor;
///
/// let descriptor = ShimBuildpackDescriptor::new(
///     "0.4",
///     "github.com_heroku_heroku-buildpack-nodejs",
///     "https://github.com/heroku/heroku-buildpack-nodejs",
///     "0.1",
///     ["heroku-20"],
/// );
///
/// let toml_str = toml::to_string(&descriptor).unwrap();
/// let parsed = toml::from_str::<ShimBuildpackDescriptor>(&toml_str).unwrap();
/// assert_eq!(parsed, descriptor);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShimBuildpackDescriptor {
    pub api: String,
    pub buildpack: ShimBuildpack,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<ShimStack>,
}

impl ShimBuildpackDescriptor {
    pub fn new<I, S>(
        api: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        stacks: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api: api.into(),
            buildpack: ShimBuildpack {
                id: id.into(),
                version: version.into(),
                name: name.into(),
            },
            stacks: stacks
                .into_iter()
                .map(|id| ShimStack { id: id.into() })
                .collect(),
        }
    }
}

// Field order is the order fields appear in the rendered `[buildpack]` table.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShimBuildpack {
    pub id: String,
    pub version: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShimStack {
    pub id: String,
}
