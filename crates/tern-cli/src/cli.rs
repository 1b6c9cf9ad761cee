//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Tern - package manager for Tern projects
#[derive(Parser, Debug)]
#[command(name = "tern")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Specify the project root instead of searching upward from the
    /// current directory
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    List,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::List => write!(f, "list"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Create package and lock files in the current directory
    ///
    /// Initializes the directory as a project root by creating
    /// 'package.yaml' and 'package.lock'.
    Init,

    /// Install a package, or download all dependencies
    ///
    /// Without an argument, downloads all dependencies of the project,
    /// recomputing the lock file only when necessary (or when
    /// '--recompute' is given).
    ///
    /// With an argument, installs the named package. The argument is
    /// matched against package names and (suffixes of) package URLs, and
    /// may carry a version after '@':
    ///
    ///   tern install morse
    ///   tern install example/morse --prefix=m
    ///   tern install morse@1.0.6
    ///   tern install --local ../my_other_package
    Install {
        /// Package name or URL; a local path with '--local'
        package: Option<String>,

        /// Treat the package argument as a local path
        #[arg(long)]
        local: bool,

        /// The prefix under which the package is imported
        #[arg(long)]
        prefix: Option<String>,

        /// Recompute the lock file even if it is up to date
        #[arg(long)]
        recompute: bool,
    },

    /// Remove the package with the given prefix
    Uninstall {
        /// Prefix of the package to remove
        prefix: String,
    },

    /// Update all packages to their newest compatible versions
    Update,

    /// Remove packages that are no longer referenced by the lock file
    Clean,

    /// List all available packages
    List {
        /// Only list packages of the registry at this path
        registry: Option<PathBuf>,

        /// Show more information
        #[arg(short = 'V', long)]
        details: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::List)]
        output: OutputFormat,
    },

    /// Search package names, descriptions, and URLs
    Search {
        /// Text to search for
        needle: String,

        /// Show more information
        #[arg(short = 'V', long)]
        details: bool,
    },

    /// Manage registries
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Synchronize all registries (same as 'registry sync')
    Sync,

    /// Generate a registry description of a package
    ///
    /// With no argument, describes the package in the current directory.
    /// With one argument, describes the package at that path. With two
    /// arguments, clones the given URL at the given version first.
    Describe {
        /// Package path, or URL when a version is also given
        path_or_url: Option<String>,

        /// Version to describe (makes the first argument a URL)
        version: Option<String>,

        /// Write the description into this registry directory instead of
        /// printing it
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Allow local path dependencies without reporting them
        #[arg(long)]
        allow_local_deps: bool,

        /// Treat local path dependencies as errors
        #[arg(long, conflicts_with = "allow_local_deps")]
        disallow_local_deps: bool,
    },
}

/// Registry management actions
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RegistryAction {
    /// Add a registry
    Add {
        /// Name for the registry; must not be in use yet
        name: String,

        /// Git URL, or a directory path with '--local'
        url: String,

        /// The registry is a local directory of descriptions
        #[arg(long)]
        local: bool,
    },

    /// Remove a registry
    Remove {
        /// Name of the registry to remove
        name: String,
    },

    /// Synchronize registries (all of them, or only the named ones)
    Sync {
        /// Registries to synchronize
        names: Vec<String>,
    },

    /// List configured registries
    List,
}
