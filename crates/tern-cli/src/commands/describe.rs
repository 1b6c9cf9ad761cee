//! The describe command: scrape a package into a registry description.

use std::path::Path;

use tern_core::{scrape_description_at, scrape_description_git, Event, LocalDepsPolicy};

use crate::cli::OutputFormat;
use crate::commands::search::print_desc;
use crate::commands::CommandContext;
use crate::error::{CliError, Result};

pub fn run_describe(
    ctx: &CommandContext,
    path_or_url: Option<&str>,
    version: Option<&str>,
    out_dir: Option<&Path>,
    allow_local_deps: bool,
    disallow_local_deps: bool,
) -> Result<()> {
    if out_dir.is_some() && version.is_none() {
        return Err(CliError::user(
            "The '--out-dir' flag requires a URL and a version",
        ));
    }

    // Descriptions for a concrete (url, version) are publishable and must
    // not carry local dependencies.
    let policy = if allow_local_deps {
        LocalDepsPolicy::Allow
    } else if disallow_local_deps || version.is_some() {
        LocalDepsPolicy::Disallow
    } else {
        LocalDepsPolicy::Report
    };

    let desc = match (path_or_url, version) {
        (Some(url), Some(version)) => {
            ctx.tracker.track(
                &Event::new("pkg", "describe")
                    .with_field("url", url)
                    .with_field("version", version),
            );
            scrape_description_git(url, version, policy, &ctx.cancel, ctx.ui)?
        }
        (Some(path), None) => scrape_description_at(Path::new(path), policy, ctx.ui)?,
        (None, _) => scrape_description_at(&std::env::current_dir()?, policy, ctx.ui)?,
    };

    match out_dir {
        Some(dir) => {
            let written = desc.write_in_dir(dir)?;
            ctx.ui
                .report_info(&format!("Wrote '{}'", written.display()));
        }
        None => print_desc(&desc, "", true, OutputFormat::List)?,
    }
    Ok(())
}
