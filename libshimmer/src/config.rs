use serde::Deserialize;

/// The Buildpack API version written to `buildpack.toml` when none is configured.
pub const DEFAULT_BUILDPACK_API_VERSION: &str = "0.4";

/// The stacks written to `buildpack.toml` when none are configured.
pub const DEFAULT_BUILDPACK_STACKS: &[&str] = &["heroku-18", "heroku-20"];

/// The cnb-shim release used when none is configured.
pub const DEFAULT_CNB_SHIM_VERSION: &str = "0.2";

/// Base URL that cnb-shim release archives are downloaded from.
pub const DEFAULT_CNB_SHIM_RELEASE_URL: &str =
    "https://github.com/heroku/cnb-shim/releases/download";

/// The buildpack version written to `buildpack.toml` when the resolver reported none.
pub const DEFAULT_BUILDPACK_VERSION: &str = "0.1";

/// Settings that control how buildpacks are shimmed.
///
/// Every field is optional: an empty string or list means "use the default". The defaults are
/// resolved by the accessor methods on every call, so they never need to be written back into
/// the configuration.
///
/// Can be loaded from a TOML file with kebab-case keys:
///
/// ```
/// use libshimmer::config::ShimmerConfig;
///
/// let config: ShimmerConfig = toml::from_str(r#"
/// api-version = "0.6"
/// stacks = ["heroku-22"]
/// "#).unwrap();
///
/// assert_eq!(config.buildpack_api_version(), "0.6");
/// assert_eq!(config.buildpack_stacks(), vec!["heroku-22"]);
/// assert_eq!(config.cnb_shim_version(), "0.2");
/// ```
#[derive(Deserialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ShimmerConfig {
    pub api_version: String,
    pub stacks: Vec<String>,
    pub shim_version: String,
    pub shim_release_url: String,
}

impl ShimmerConfig {
    #[must_use]
    pub fn buildpack_api_version(&self) -> &str {
        non_empty_or(&self.api_version, DEFAULT_BUILDPACK_API_VERSION)
    }

    #[must_use]
    pub fn buildpack_stacks(&self) -> Vec<&str> {
        if self.stacks.is_empty() {
            DEFAULT_BUILDPACK_STACKS.to_vec()
        } else {
            self.stacks.iter().map(String::as_str).collect()
        }
    }

    #[must_use]
    pub fn cnb_shim_version(&self) -> &str {
        non_empty_or(&self.shim_version, DEFAULT_CNB_SHIM_VERSION)
    }

    #[must_use]
    pub fn cnb_shim_release_url(&self) -> &str {
        non_empty_or(&self.shim_release_url, DEFAULT_CNB_SHIM_RELEASE_URL)
    }

    /// Layers `overrides` on top of this configuration.
    ///
    /// Every non-empty field of `overrides` replaces the corresponding field of `self`. Used to
    /// apply command line flags on top of a configuration file.
    #[must_use]
    pub fn merge(self, overrides: ShimmerConfig) -> ShimmerConfig {
        fn pick<T: Default + PartialEq>(base: T, over: T) -> T {
            if over == T::default() {
                base
            } else {
                over
            }
        }

        ShimmerConfig {
            api_version: pick(self.api_version, overrides.api_version),
            stacks: pick(self.stacks, overrides.stacks),
            shim_version: pick(self.shim_version, overrides.shim_version),
            shim_release_url: pick(self.shim_release_url, overrides.shim_release_url),
        }
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
