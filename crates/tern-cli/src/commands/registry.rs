//! Registry management: add, remove, sync, list.

use std::fs;

use tern_core::{Event, RegistryConfig, RegistryKind};

use crate::commands::CommandContext;
use crate::error::{CliError, Result};

pub fn run_registry_add(
    ctx: &mut CommandContext,
    name: &str,
    url: &str,
    local: bool,
) -> Result<()> {
    let (kind, path) = if local {
        let abs = fs::canonicalize(url)
            .map_err(|_| CliError::user(format!("Path doesn't exist: '{url}'")))?;
        if !abs.is_dir() {
            return Err(CliError::user(format!("Path isn't a directory: '{url}'")));
        }
        (RegistryKind::Local, abs.display().to_string())
    } else {
        (RegistryKind::Git, url.to_string())
    };

    let configs = ctx.config.registry_configs_or_default();
    if let Some(existing) = configs.iter().find(|c| c.name == name) {
        if existing.kind != kind || existing.path != path {
            return Err(CliError::user(format!("Registry '{name}' already exists")));
        }
        // Same configuration; make sure it is persisted.
        if ctx.config.registries.is_empty() {
            ctx.config.registries = configs;
            ctx.config.store(&ctx.config_path)?;
        }
        return Ok(());
    }

    let config = RegistryConfig {
        name: name.to_string(),
        kind,
        path,
    };
    ctx.tracker.track(
        &Event::new("pkg", "registry-add")
            .with_field("kind", kind.to_string())
            .with_field("path", config.path.clone()),
    );

    // Loading validates the registry (and clones git-backed ones) before
    // anything is persisted.
    let cache = ctx.cache();
    config.load(true, &cache, &ctx.cancel, ctx.ui)?;

    let mut configs = configs;
    configs.push(config);
    ctx.config.registries = configs;
    ctx.config.store(&ctx.config_path)
}

pub fn run_registry_remove(ctx: &mut CommandContext, name: &str) -> Result<()> {
    let index = ctx
        .config
        .registries
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| CliError::user(format!("Registry '{name}' does not exist")))?;
    let removed = ctx.config.registries.remove(index);
    ctx.tracker
        .track(&Event::new("pkg", "registry-remove").with_field("path", removed.path));
    ctx.config.store(&ctx.config_path)
}

pub fn run_registry_sync(ctx: &CommandContext, names: &[String]) -> Result<()> {
    let configs = ctx.config.registry_configs_or_default();
    let to_sync: Vec<&RegistryConfig> = if names.is_empty() {
        configs.iter().collect()
    } else {
        let mut selected = Vec::new();
        for name in names {
            match configs.iter().find(|c| &c.name == name) {
                Some(config) => selected.push(config),
                None => ctx
                    .ui
                    .report_warning(&format!("Registry '{name}' not found")),
            }
        }
        selected
    };

    let cache = ctx.cache();
    let mut has_errors = false;
    for config in to_sync {
        ctx.ui.report_info(&format!("Syncing '{}'", config.name));
        if let Err(e) = config.load(true, &cache, &ctx.cancel, ctx.ui) {
            if !e.is_already_reported() {
                let _ = ctx
                    .ui
                    .report_error(&format!("Error while syncing '{}': {e}", config.name));
            }
            has_errors = true;
        }
    }
    if has_errors {
        return Err(tern_core::Error::AlreadyReported.into());
    }
    Ok(())
}

pub fn run_registry_list(ctx: &CommandContext) -> Result<()> {
    for config in ctx.config.registry_configs_or_default() {
        println!("{}: {} ({})", config.name, config.path, config.kind);
    }
    Ok(())
}
