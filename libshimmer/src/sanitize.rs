/// Derives a buildpack id for `buildpack.toml` from a canonical buildpack reference.
///
/// The URL scheme is dropped, then every `:` and every `//` is replaced by `_`. The result keeps
/// the host and path of the reference, so ids stay traceable to where the buildpack came from.
///
/// Distinct references can map to the same id (`a:b` and `a_b` both become `a_b`). No attempt is
/// made to detect this here.
///
/// # Examples
/// ```
/// use libshimmer::sanitize::sanitize_buildpack_id;
///
/// assert_eq!(
///     sanitize_buildpack_id("https://github.com/org/repo"),
///     "github.com/org/repo"
/// );
/// assert_eq!(sanitize_buildpack_id("local:path//to/bp"), "local_path_to/bp");
/// ```
#[must_use]
pub fn sanitize_buildpack_id(canonical: &str) -> String {
    let without_scheme = canonical
        .split_once("://")
        .map_or(canonical, |(_, remainder)| remainder);

    without_scheme.replace(':', "_").replace("//", "_")
}
