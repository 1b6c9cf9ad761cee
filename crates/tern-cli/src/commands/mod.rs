//! Command implementations.
//!
//! Every command runs against a [`CommandContext`]: the loaded user
//! configuration plus the UI, tracking, and cancellation capabilities.
//! The functions here are thin glue over `tern-core`; tests drive them
//! directly with a recording UI.

mod describe;
mod project;
mod registry;
mod search;

pub use describe::run_describe;
pub use project::{run_clean, run_init, run_install, run_uninstall, run_update};
pub use registry::{
    run_registry_add, run_registry_list, run_registry_remove, run_registry_sync,
};
pub use search::{run_list, run_search};

use std::path::PathBuf;

use tern_core::{
    Cache, CancellationToken, ProjectManager, ProjectPaths, Registries, Tracker, Ui,
};

use crate::config::Config;
use crate::error::Result;

/// Everything a command needs to run.
pub struct CommandContext<'a> {
    pub config: Config,
    /// Where configuration changes are persisted.
    pub config_path: PathBuf,
    /// `--project-root`, if given.
    pub project_root: Option<PathBuf>,
    pub ui: &'a dyn Ui,
    pub tracker: &'a dyn Tracker,
    pub cancel: CancellationToken,
}

impl<'a> CommandContext<'a> {
    pub fn cache(&self) -> Cache {
        Cache::new(
            self.config.package_cache_paths.clone(),
            self.config.registry_cache_paths.clone(),
        )
    }

    /// Load the configured registries (or the default one).
    pub fn load_registries(&self, sync: bool, cache: &Cache) -> Result<Registries> {
        Ok(Registries::from_configs(
            &self.config.registry_configs_or_default(),
            sync,
            cache,
            &self.cancel,
            self.ui,
        )?)
    }

    /// The project paths: `--project-root` when given, otherwise found by
    /// walking upward from the current directory.
    pub fn project_paths(&self) -> Result<ProjectPaths> {
        match &self.project_root {
            Some(root) => Ok(ProjectPaths::new(root)),
            None => Ok(ProjectPaths::discover(&std::env::current_dir()?)),
        }
    }

    /// A fully wired project manager. Registries are synced first when
    /// the configuration asks for it.
    pub fn project_manager(&self) -> Result<ProjectManager<'a>> {
        let cache = self.cache();
        let registries = self.load_registries(self.config.autosync, &cache)?;
        Ok(ProjectManager::new(
            registries,
            cache,
            self.project_paths()?,
            self.ui,
            self.tracker,
        ))
    }
}
