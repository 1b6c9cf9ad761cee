//! Downloading packages into the cache.
//!
//! A package lives at a tag of a git repository. The URL may embed a path
//! after `.git/` (`host.com/org/repo.git/sub/dir`), in which case the
//! checked-out sub-directory becomes the package. Tags follow
//! `v<version>`, or `<last-segment>-v<version>` for nested packages.
//!
//! Downloads are staged in a temporary directory next to the target (same
//! volume) and renamed into place, so the cache only ever holds complete
//! packages. When two processes race on one entry, the loser's rename
//! fails against the winner's directory and its staging area is removed.

use std::fs;
use std::path::Path;

use crate::cache::make_contained_read_only;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::scrape;
use crate::ui::Ui;

/// Split a package URL into the repository URL and the embedded path.
/// `github.com/example/pkgs.git/bar/gee` becomes
/// (`github.com/example/pkgs`, Some(`bar/gee`)).
fn decompose_pkg_url(url: &str) -> (String, Option<String>) {
    match url.rfind(".git/") {
        Some(index) => {
            let path = &url[index + ".git/".len()..];
            (url[..index].to_string(), Some(path.to_string()))
        }
        None => (url.to_string(), None),
    }
}

/// Download the package (url, version) into `dir`, replacing whatever was
/// there. When `expected_hash` is given, the downloaded tree must match
/// it before it reaches `dir`. File modes are set read-only only after
/// the rename succeeds. Returns the checked-out commit hash.
pub fn download_git(
    dir: &Path,
    url: &str,
    version: &str,
    expected_hash: Option<&str>,
    cancel: &CancellationToken,
    ui: &dyn Ui,
) -> Result<String> {
    cancel.checkpoint()?;

    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| {
            let _ = ui.report_error(&format!(
                "Failed to remove old package directory '{}': {e}",
                dir.display()
            ));
            Error::AlreadyReported
        })?;
    }

    // Absolute paths are local repositories; only remote-style URLs can
    // embed a `.git/` sub-path.
    let (repo_url, sub_path) = if Path::new(url).is_absolute() {
        (url.to_string(), None)
    } else {
        decompose_pkg_url(url)
    };

    let tag = match &sub_path {
        Some(path) => {
            let last_segment = path.rsplit('/').next().unwrap_or(path);
            format!("{last_segment}-v{version}")
        }
        None => format!("v{version}"),
    };

    let parent = dir.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    // Stage next to the target: the rename below must stay on one volume.
    // Dropping the staging directory cleans up every failure path,
    // including cancellation.
    let staging = tempfile::Builder::new()
        .prefix(".partial-checkout-")
        .tempdir_in(parent)
        .map_err(|e| {
            let _ = ui.report_error(&format!(
                "Failed to create staging directory to download '{url}@{version}': {e}"
            ));
            Error::AlreadyReported
        })?;
    let clone_dir = staging.path().join("clone");

    let commit = tern_git::clone(&clone_dir, &tern_git::CloneOptions::tag(&repo_url, &tag))
        .map_err(|e| {
            let _ = ui.report_error(&format!(
                "Error while cloning '{repo_url}' with tag '{tag}': {e}"
            ));
            Error::AlreadyReported
        })?;
    cancel.checkpoint()?;

    let source = match &sub_path {
        None => clone_dir,
        Some(path) => {
            let nested = clone_dir.join(path);
            match fs::metadata(&nested) {
                Err(_) => {
                    return Err(ui.report_error(&format!(
                        "Repository '{repo_url}' does not have path '{path}'"
                    )));
                }
                Ok(metadata) if !metadata.is_dir() => {
                    return Err(ui.report_error(&format!(
                        "Path '{path}' in repository '{repo_url}' is not a directory"
                    )));
                }
                Ok(_) => nested,
            }
        }
    };

    // Verify while the content is still staged; the final location never
    // sees a tree that failed verification.
    if let Some(expected) = expected_hash.filter(|h| !h.is_empty()) {
        let actual = scrape::tree_hash(&source)?;
        if actual != expected {
            return Err(ui.report_error(&format!(
                "Content hash mismatch for '{url}@{version}': expected {expected}, got {actual}"
            )));
        }
    }

    if let Err(e) = fs::rename(&source, dir) {
        // Another process may have won the race; equivalent content is
        // already in place then.
        if !dir.is_dir() {
            let _ = ui.report_error(&format!(
                "Failed to move downloaded package to '{}': {e}",
                dir.display()
            ));
            return Err(Error::AlreadyReported);
        }
    }

    make_contained_read_only(dir);
    Ok(commit)
}
