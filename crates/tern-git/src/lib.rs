//! Git driver for the Tern package manager.
//!
//! Packages and registries both live in git repositories. This crate wraps
//! the two operations the package manager needs:
//!
//! - [`clone`]: fetch a single tag (shallow) or branch into a directory
//! - [`pull`]: fast-forward an existing clone to its remote
//!
//! Everything goes through libgit2; no subprocesses are spawned.

mod error;
mod ops;

pub use error::{Error, Result};
pub use ops::{clone, pull, CloneOptions, CloneTarget};
