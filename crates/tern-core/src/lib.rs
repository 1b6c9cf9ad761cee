//! Core of the Tern package manager.
//!
//! Given a project's `package.yaml` and a set of registries, this crate
//! produces a reproducible `package.lock` and a populated on-disk package
//! cache. The pieces:
//!
//! - [`version`] / [`constraint`]: the semver-ish algebra
//! - [`desc`] / [`spec`]: registry descriptions and project specifications
//! - [`lock`]: the pinned dependency graph and its writer
//! - [`registry`]: local and git-backed description sources with search
//! - [`cache`]: (url, version) → read-only on-disk directories
//! - [`solver`]: backtracking resolution with major-version coalescing
//! - [`project`]: the install/uninstall/update/clean orchestration
//! - [`scrape`]: turning a package tree into a registry description
//!
//! The crate talks to the outside world through capabilities: [`ui::Ui`]
//! for reporting, [`track::Tracker`] for telemetry, and the `tern-git`
//! crate for VCS work. It never reads configuration files or environment
//! variables; the front end owns those.

pub mod cache;
pub mod cancel;
pub mod constants;
pub mod constraint;
pub mod desc;
pub mod error;
pub mod fetch;
mod io;
pub mod lock;
pub mod path;
pub mod project;
pub mod registry;
pub mod scrape;
pub mod solver;
pub mod spec;
pub mod track;
pub mod ui;
pub mod version;

pub use cache::Cache;
pub use cancel::CancellationToken;
pub use constraint::Constraint;
pub use desc::{Desc, DescDep, Environment};
pub use error::{Error, Result};
pub use lock::{build_lock_file, LockFile, PackageEntry};
pub use project::{init_directory, ProjectManager, ProjectPaths};
pub use registry::{
    without_lower_versions, DescMatch, GitRegistry, LocalRegistry, Registries, Registry,
    RegistryConfig, RegistryKind,
};
pub use scrape::{scrape_description_at, scrape_description_git, LocalDepsPolicy};
pub use solver::{Solution, Solver, SolverDep};
pub use spec::{Spec, SpecDep};
pub use track::{Event, NullTracker, Tracker};
pub use ui::{FmtUi, RecordingUi, Ui};
pub use version::Version;
