//! Path helpers shared by the cache and registry layouts.

use std::path::PathBuf;

/// Escape a package URL for use as a relative path.
///
/// `:` becomes `%3A` so the result is a valid path segment everywhere;
/// `/` stays the separator. A leading `/` (absolute-path URLs used in
/// tests and local setups) is stripped so the result joins cleanly onto a
/// cache root.
pub fn escape_url(url: &str) -> PathBuf {
    url.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace(':', "%3A"))
        .collect()
}

/// Relative path of a package inside a cache root: `<escaped-url>/<version>`.
pub fn url_version_rel_path(url: &str, version: &str) -> PathBuf {
    escape_url(url).join(version)
}

/// Whether `s` is a valid dependency prefix: letters, digits and
/// underscores, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
