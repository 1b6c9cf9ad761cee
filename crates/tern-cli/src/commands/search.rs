//! Listing and searching packages.

use std::path::Path;

use tern_core::{without_lower_versions, Desc, Event, LocalRegistry, Registry};

use crate::cli::OutputFormat;
use crate::commands::CommandContext;
use crate::error::{CliError, Result};

pub fn run_list(
    ctx: &CommandContext,
    registry: Option<&Path>,
    details: bool,
    output: OutputFormat,
) -> Result<()> {
    let cache = ctx.cache();
    if let Some(path) = registry {
        let mut local = LocalRegistry::new("", path);
        local.load(false, &cache, &ctx.cancel, ctx.ui)?;
        print_registry(&local, details, output)?;
        return Ok(());
    }
    let registries = ctx.load_registries(ctx.config.autosync, &cache)?;
    for registry in registries.iter() {
        print_registry(registry, details, output)?;
    }
    Ok(())
}

fn print_registry(registry: &dyn Registry, details: bool, output: OutputFormat) -> Result<()> {
    println!("{}:", registry.describe());
    for desc in registry.entries() {
        print_desc(desc, "  ", details, output)?;
    }
    Ok(())
}

pub fn run_search(ctx: &CommandContext, needle: &str, details: bool) -> Result<()> {
    ctx.tracker
        .track(&Event::new("pkg", "search").with_field("needle", needle));

    let cache = ctx.cache();
    let registries = ctx.load_registries(ctx.config.autosync, &cache)?;
    let found = registries.search_all(needle);
    let found = without_lower_versions(found, None)?;
    for m in found {
        print_desc(m.desc, "", details, OutputFormat::List)?;
    }
    Ok(())
}

/// Print one description: JSON, a one-liner, or the detailed block.
pub(crate) fn print_desc(
    desc: &Desc,
    indent: &str,
    details: bool,
    output: OutputFormat,
) -> Result<()> {
    if output == OutputFormat::Json {
        let json = serde_json::to_string(desc)
            .map_err(|e| CliError::user(format!("Cannot serialize description: {e}")))?;
        println!("{json}");
        return Ok(());
    }
    if !details {
        println!("{indent}{} - {}", desc.name, desc.version);
        return Ok(());
    }
    println!("{indent}{}:", desc.name);
    if let Some(description) = &desc.description {
        println!("{indent}  description: {description}");
    }
    println!("{indent}  url: {}", desc.url);
    println!("{indent}  version: {}", desc.version);
    if let Some(license) = &desc.license {
        println!("{indent}  license: {license}");
    }
    if let Some(hash) = &desc.hash {
        println!("{indent}  hash: {hash}");
    }
    if !desc.deps.is_empty() {
        println!("{indent}  dependencies:");
        for dep in &desc.deps {
            println!("{indent}    {} - {}", dep.url, dep.version);
        }
    }
    Ok(())
}
