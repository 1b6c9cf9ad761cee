//! Registry and package fixtures.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Escape a package URL for use as a relative path, the same way the
/// package manager lays out registries and caches (`:` becomes `%3A`).
pub fn escape_url(url: &str) -> PathBuf {
    url.trim_start_matches('/')
        .split('/')
        .map(|segment| segment.replace(':', "%3A"))
        .collect()
}

/// Render a minimal description file for a package.
///
/// `deps` maps dependency URLs to constraint strings.
pub fn desc_yaml(name: &str, url: &str, version: &str, deps: &[(&str, &str)]) -> String {
    let mut out = String::new();
    writeln!(out, "name: {name}").unwrap();
    writeln!(out, "url: {url}").unwrap();
    writeln!(out, "version: {version}").unwrap();
    writeln!(out, "license: MIT").unwrap();
    if !deps.is_empty() {
        writeln!(out, "dependencies:").unwrap();
        for (dep_url, constraint) in deps {
            writeln!(out, "  - url: {dep_url}").unwrap();
            writeln!(out, "    version: \"{constraint}\"").unwrap();
        }
    }
    out
}

/// Place a description file into a local registry directory, using the
/// canonical `packages/<escaped-url>/<version>/desc.yaml` layout.
pub fn write_desc(registry_root: &Path, url: &str, version: &str, yaml: &str) {
    let dir = registry_root
        .join("packages")
        .join(escape_url(url))
        .join(version);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("desc.yaml"), yaml).unwrap();
}

/// Render a project spec (`package.yaml`) with the given prefix → (url,
/// constraint) dependencies.
pub fn spec_yaml(name: Option<&str>, deps: &[(&str, &str, &str)]) -> String {
    let mut out = String::new();
    if let Some(name) = name {
        writeln!(out, "name: {name}").unwrap();
    }
    if !deps.is_empty() {
        writeln!(out, "dependencies:").unwrap();
        for (prefix, url, constraint) in deps {
            writeln!(out, "  {prefix}:").unwrap();
            writeln!(out, "    url: {url}").unwrap();
            writeln!(out, "    version: \"{constraint}\"").unwrap();
        }
    }
    out
}
