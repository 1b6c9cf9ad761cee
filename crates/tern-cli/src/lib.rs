//! Command layer of the Tern package manager.
//!
//! The binary in `main.rs` is a thin shell: argument parsing lives in
//! [`cli`], the user configuration in [`config`], and each subcommand in
//! [`commands`]. Exposed as a library so integration tests can drive the
//! commands with a recording UI and a temporary configuration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
