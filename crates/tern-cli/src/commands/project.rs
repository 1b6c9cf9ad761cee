//! Project commands: init, install, uninstall, update, clean.

use tern_core::{init_directory, Event, ProjectPaths};

use crate::commands::CommandContext;
use crate::error::{CliError, Result};

pub fn run_init(ctx: &CommandContext) -> Result<()> {
    // Unlike the other commands, init never searches upward: it
    // initializes exactly the requested (or current) directory.
    let root = match &ctx.project_root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    init_directory(&ProjectPaths::new(root), ctx.ui)?;
    Ok(())
}

pub fn run_install(
    ctx: &CommandContext,
    package: Option<&str>,
    local: bool,
    prefix: Option<&str>,
    recompute: bool,
) -> Result<()> {
    let Some(package) = package else {
        if local {
            return Err(CliError::user("The '--local' flag requires a package argument"));
        }
        if prefix.is_some() {
            return Err(CliError::user(
                "The '--prefix' flag can only be used when installing a package",
            ));
        }
        let manager = ctx.project_manager()?;
        manager.install(recompute, &ctx.cancel)?;
        let action = if recompute {
            "install-recompute"
        } else {
            "install-fetch"
        };
        ctx.tracker.track(&Event::new("pkg", action));
        return Ok(());
    };

    if recompute {
        return Err(CliError::user(
            "The '--recompute' flag can only be used without a package argument",
        ));
    }

    let manager = ctx.project_manager()?;
    let (prefix, pkg_string) = manager.install_pkg(local, prefix, package, &ctx.cancel)?;
    ctx.ui.report_info(&format!(
        "Package '{pkg_string}' installed with prefix '{prefix}'"
    ));
    ctx.tracker
        .track(&Event::new("pkg", "install").with_field("package", pkg_string));
    Ok(())
}

pub fn run_uninstall(ctx: &CommandContext, prefix: &str) -> Result<()> {
    let manager = ctx.project_manager()?;
    manager.uninstall(prefix, &ctx.cancel)?;
    Ok(())
}

pub fn run_update(ctx: &CommandContext) -> Result<()> {
    let manager = ctx.project_manager()?;
    manager.update(&ctx.cancel)?;
    ctx.tracker.track(&Event::new("pkg", "update"));
    Ok(())
}

pub fn run_clean(ctx: &CommandContext) -> Result<()> {
    let manager = ctx.project_manager()?;
    manager.clean()?;
    Ok(())
}
