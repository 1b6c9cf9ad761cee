//! Turning a package directory into a registry description.
//!
//! `describe` works either on a local directory or on a remote tag (which
//! is cloned into a temporary directory first). The resulting description
//! carries a content hash over the package tree so registries can verify
//! downloads byte-for-byte.

use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::constants::{LOCK_FILE, PROJECT_PACKAGES_DIR, SPEC_FILE};
use crate::desc::{Desc, DescDep};
use crate::error::{Error, Result};
use crate::fetch;
use crate::spec::Spec;
use crate::ui::Ui;

/// How to treat `path:` dependencies while scraping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDepsPolicy {
    /// Keep quiet about them.
    Allow,
    /// Warn, but produce a description anyway.
    Report,
    /// Fail: a published package cannot depend on local paths.
    Disallow,
}

/// SHA-256 over the package tree: for every file (sorted by path) the
/// forward-slash relative path and the file content, each NUL-terminated.
/// `.git`, `.packages`, and the lock file are not part of the package and
/// are excluded. Result is `sha256:<hex>`.
pub fn tree_hash(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if name == ".git" || name == PROJECT_PACKAGES_DIR {
                return false;
            }
            !(entry.depth() == 1 && name == LOCK_FILE)
        });
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::io(&path, io),
                None => Error::NotFound(format!("cannot walk '{}'", path.display())),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .expect("walked entries live under the root");
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        hasher.update(rel.join("/").as_bytes());
        hasher.update([0]);
        let content = std::fs::read(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
        hasher.update(&content);
        hasher.update([0]);
    }
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// Build a description from the package at `dir`.
///
/// Name, description, and license come from the spec; the URL and version
/// stay empty (the caller knows them for remote scrapes). Local `path:`
/// dependencies are handled per `policy` and never appear in the
/// description.
pub fn scrape_description_at(
    dir: &Path,
    policy: LocalDepsPolicy,
    ui: &dyn Ui,
) -> Result<Desc> {
    let spec_path = dir.join(SPEC_FILE);
    if !spec_path.is_file() {
        return Err(ui.report_error(&format!(
            "Missing '{}' in '{}'",
            SPEC_FILE,
            dir.display()
        )));
    }
    let spec = Spec::parse_file(&spec_path, ui)?;
    let Some(name) = spec.name.clone() else {
        return Err(ui.report_error(&format!(
            "Package at '{}' has no name; add a 'name' entry to {}",
            dir.display(),
            SPEC_FILE
        )));
    };

    // Collect local deps across the whole local graph so the policy also
    // catches transitive ones.
    let mut local_deps: Vec<String> = Vec::new();
    spec.visit_local_deps(dir, ui, &mut |display, _, visited| {
        for (prefix, dep) in &visited.deps {
            if dep.path.is_some() {
                let context = if display == "." {
                    prefix.clone()
                } else {
                    format!("{display}: {prefix}")
                };
                local_deps.push(context);
            }
        }
        Ok(())
    })?;
    if !local_deps.is_empty() {
        match policy {
            LocalDepsPolicy::Allow => {}
            LocalDepsPolicy::Report => {
                for dep in &local_deps {
                    ui.report_warning(&format!("Package has local dependency '{dep}'"));
                }
            }
            LocalDepsPolicy::Disallow => {
                for dep in &local_deps {
                    let _ = ui.report_error(&format!(
                        "Published packages must not have local dependencies: '{dep}'"
                    ));
                }
                return Err(Error::AlreadyReported);
            }
        }
    }

    let deps = spec
        .deps
        .iter()
        .filter_map(|(_, dep)| {
            dep.url.as_ref().map(|url| DescDep {
                url: url.clone(),
                version: dep.version.clone().unwrap_or_else(|| "*".to_string()),
            })
        })
        .collect();

    Ok(Desc {
        name,
        description: spec.description.clone(),
        license: spec.license.clone(),
        url: String::new(),
        version: String::new(),
        hash: Some(tree_hash(dir)?),
        environment: spec.environment.clone(),
        deps,
    })
}

/// Clone the tag for (url, version) into a temporary directory and scrape
/// it. The description is stamped with the URL and version.
pub fn scrape_description_git(
    url: &str,
    version: &str,
    policy: LocalDepsPolicy,
    cancel: &CancellationToken,
    ui: &dyn Ui,
) -> Result<Desc> {
    let tmp = tempfile::tempdir().map_err(|e| Error::io("scrape-tmp", e))?;
    let pkg_dir = tmp.path().join("pkg");
    fetch::download_git(&pkg_dir, url, version, None, cancel, ui)?;
    let mut desc = scrape_description_at(&pkg_dir, policy, ui)?;
    desc.url = url.to_string();
    desc.version = version.to_string();
    Ok(desc)
}
