//! Clone and pull operations.
//!
//! Package downloads always check out a single tag with a shallow fetch, so
//! instead of a full `git clone` this module initialises an empty repository,
//! fetches exactly one refspec (optionally depth-limited), and checks out the
//! fetched commit. Registry clones fetch a branch and leave a normal local
//! branch behind so later `pull`s can fast-forward it.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, FetchOptions, Repository};

use crate::{Error, Result};

/// What to check out after the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneTarget {
    /// A tag, e.g. `v1.0.6`.
    Tag(String),
    /// A branch, e.g. `main`.
    Branch(String),
}

/// Options for [`clone`].
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Repository URL. Local absolute paths are accepted as-is.
    pub url: String,
    /// The tag or branch to check out.
    pub target: CloneTarget,
    /// Limit history depth; `None` fetches the full history.
    pub depth: Option<i32>,
}

impl CloneOptions {
    /// Shallow single-tag options, the shape used for package downloads.
    pub fn tag(url: impl Into<String>, tag: impl Into<String>) -> Self {
        CloneOptions {
            url: url.into(),
            target: CloneTarget::Tag(tag.into()),
            depth: Some(1),
        }
    }

    /// Full single-branch options, the shape used for registry clones.
    pub fn branch(url: impl Into<String>, branch: impl Into<String>) -> Self {
        CloneOptions {
            url: url.into(),
            target: CloneTarget::Branch(branch.into()),
            depth: None,
        }
    }
}

/// Clone `opts.url` into `dir` and check out the requested target.
///
/// The fetch is single-ref: only the requested tag or branch is transferred.
/// Returns the hex id of the checked-out commit.
pub fn clone(dir: &Path, opts: &CloneOptions) -> Result<String> {
    let repo = Repository::init(dir)?;
    let mut remote = repo.remote("origin", &opts.url)?;

    let refspec = match &opts.target {
        CloneTarget::Tag(tag) => format!("refs/tags/{tag}:refs/tags/{tag}"),
        CloneTarget::Branch(branch) => {
            format!("refs/heads/{branch}:refs/remotes/origin/{branch}")
        }
    };

    let mut fetch_opts = FetchOptions::new();
    if let Some(depth) = opts.depth {
        fetch_opts.depth(depth);
    }

    tracing::debug!(url = %opts.url, refspec = %refspec, "fetching");
    remote
        .fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)
        .map_err(|e| classify_fetch_error(&opts.url, &opts.target, e))?;

    let commit = match &opts.target {
        CloneTarget::Tag(tag) => {
            let oid = repo
                .refname_to_id(&format!("refs/tags/{tag}"))
                .map_err(|_| Error::TagNotFound {
                    url: opts.url.clone(),
                    tag: tag.clone(),
                })?;
            // Annotated tags need an extra peel to reach the commit.
            repo.find_object(oid, None)?.peel_to_commit()?
        }
        CloneTarget::Branch(branch) => {
            let oid = repo
                .refname_to_id(&format!("refs/remotes/origin/{branch}"))
                .map_err(|_| Error::BranchNotFound {
                    url: opts.url.clone(),
                    branch: branch.clone(),
                })?;
            repo.find_commit(oid)?
        }
    };

    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;

    match &opts.target {
        CloneTarget::Tag(_) => {
            repo.set_head_detached(commit.id())?;
        }
        CloneTarget::Branch(branch) => {
            // Leave a regular local branch behind so `pull` can fast-forward.
            repo.branch(branch, &commit, true)?;
            repo.set_head(&format!("refs/heads/{branch}"))?;
            let mut config = repo.config()?;
            config.set_str(&format!("branch.{branch}.remote"), "origin")?;
            config.set_str(
                &format!("branch.{branch}.merge"),
                &format!("refs/heads/{branch}"),
            )?;
        }
    }

    Ok(commit.id().to_string())
}

fn classify_fetch_error(url: &str, target: &CloneTarget, e: git2::Error) -> Error {
    if e.code() == ErrorCode::NotFound {
        match target {
            CloneTarget::Tag(tag) => {
                return Error::TagNotFound {
                    url: url.to_string(),
                    tag: tag.clone(),
                }
            }
            CloneTarget::Branch(branch) => {
                return Error::BranchNotFound {
                    url: url.to_string(),
                    branch: branch.clone(),
                }
            }
        }
    }
    Error::CloneFailed {
        url: url.to_string(),
        message: e.message().to_string(),
    }
}

/// Pull the tracked branch of the repository at `dir` using fetch +
/// fast-forward. A merge that would require conflict resolution is an error:
/// registry clones are never edited locally, so anything other than a
/// fast-forward means the remote rewrote history.
pub fn pull(dir: &Path) -> Result<()> {
    let repo = Repository::open(dir)?;

    let head = repo.head()?;
    if !head.is_branch() {
        return Err(Error::DetachedHead {
            path: dir.to_path_buf(),
        });
    }
    let branch_name = head.shorthand().unwrap_or("HEAD").to_string();

    let mut remote = repo.find_remote("origin").map_err(|e| Error::PullFailed {
        path: dir.to_path_buf(),
        message: e.message().to_string(),
    })?;

    remote
        .fetch(&[branch_name.as_str()], None, None)
        .map_err(|e| Error::PullFailed {
            path: dir.to_path_buf(),
            message: format!("fetch failed: {}", e.message()),
        })?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .map_err(|e| Error::PullFailed {
            path: dir.to_path_buf(),
            message: format!("could not find FETCH_HEAD: {}", e.message()),
        })?;
    let fetch_commit = fetch_head
        .peel_to_commit()
        .map_err(|e| Error::PullFailed {
            path: dir.to_path_buf(),
            message: format!("could not resolve FETCH_HEAD: {}", e.message()),
        })?;

    let (analysis, _) =
        repo.merge_analysis(&[&repo.find_annotated_commit(fetch_commit.id())?])?;

    if analysis.is_up_to_date() {
        return Ok(());
    }

    if analysis.is_fast_forward() {
        let refname = format!("refs/heads/{branch_name}");
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(
            fetch_commit.id(),
            &format!("pull: fast-forward to {}", fetch_commit.id()),
        )?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
        return Ok(());
    }

    Err(Error::CannotFastForward {
        path: dir.to_path_buf(),
        message: format!(
            "cannot fast-forward '{}' to {}",
            branch_name,
            fetch_commit.id()
        ),
    })
}
