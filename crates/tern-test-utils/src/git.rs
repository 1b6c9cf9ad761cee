//! Git repository fixtures.
//!
//! Fixtures shell out to the `git` CLI so the produced repositories are
//! indistinguishable from user-made ones (hooks, tags, reflogs).

use std::fs;
use std::path::Path;
use std::process::Command;

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Initialise a repository with a configured identity and `main` as the
/// default branch. No commits are made.
pub fn init_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    run_git(dir, &["init"]);
    // Works on any git version, unlike `init --initial-branch`.
    run_git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    run_git(dir, &["config", "user.email", "test@test.invalid"]);
    run_git(dir, &["config", "user.name", "Test User"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Stage everything and commit.
pub fn commit_all(dir: &Path, message: &str) {
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "--allow-empty", "-m", message]);
}

/// Create a lightweight tag at HEAD.
pub fn tag(dir: &Path, name: &str) {
    run_git(dir, &["tag", name]);
}

/// Write `files` into the repository, commit, and tag the commit.
///
/// `files` maps a repository-relative path to its content; parent
/// directories are created as needed.
pub fn commit_files_tagged(dir: &Path, files: &[(&str, &str)], tag_name: &str) {
    for (rel, content) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    commit_all(dir, &format!("release {tag_name}"));
    tag(dir, tag_name);
}
