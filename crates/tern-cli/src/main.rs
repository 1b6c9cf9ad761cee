//! Tern CLI
//!
//! The command-line interface of the Tern package manager. All actual
//! package management lives in `tern-core`; this binary parses arguments,
//! loads the user configuration, and wires up the UI, tracking, and
//! cancellation capabilities.

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tern_core::{CancellationToken, Event, FmtUi, Tracker};

use tern_cli::cli::{Cli, Commands, RegistryAction};
use tern_cli::commands::{self, CommandContext};
use tern_cli::config::Config;
use tern_cli::error::Result;

/// Tracker that funnels events into the tracing log; real delivery is a
/// deployment concern and failures never reach the user.
struct LogTracker;

impl Tracker for LogTracker {
    fn track(&self, event: &Event) {
        tracing::debug!(
            category = %event.category,
            action = %event.action,
            label = event.label.as_deref().unwrap_or(""),
            "tracking event"
        );
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("failed to set tracing subscriber");
        tracing::debug!("verbose mode enabled");
    }

    let ui = FmtUi;
    let tracker = LogTracker;
    let config_path = Config::default_path();
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            std::process::exit(1);
        }
    };

    let mut ctx = CommandContext {
        config,
        config_path,
        project_root: cli.project_root.clone(),
        ui: &ui,
        tracker: &tracker,
        cancel: CancellationToken::new(),
    };

    if let Err(e) = run(cli.command, &mut ctx) {
        // Errors that went through the UI already printed themselves.
        if !e.is_silent() {
            eprintln!("{}: {e}", "error".red().bold());
        }
        std::process::exit(1);
    }
}

fn run(command: Commands, ctx: &mut CommandContext) -> Result<()> {
    match command {
        Commands::Init => commands::run_init(ctx),
        Commands::Install {
            package,
            local,
            prefix,
            recompute,
        } => commands::run_install(ctx, package.as_deref(), local, prefix.as_deref(), recompute),
        Commands::Uninstall { prefix } => commands::run_uninstall(ctx, &prefix),
        Commands::Update => commands::run_update(ctx),
        Commands::Clean => commands::run_clean(ctx),
        Commands::List {
            registry,
            details,
            output,
        } => commands::run_list(ctx, registry.as_deref(), details, output),
        Commands::Search { needle, details } => commands::run_search(ctx, &needle, details),
        Commands::Registry { action } => match action {
            RegistryAction::Add { name, url, local } => {
                commands::run_registry_add(ctx, &name, &url, local)
            }
            RegistryAction::Remove { name } => commands::run_registry_remove(ctx, &name),
            RegistryAction::Sync { names } => commands::run_registry_sync(ctx, &names),
            RegistryAction::List => commands::run_registry_list(ctx),
        },
        Commands::Sync => commands::run_registry_sync(ctx, &[]),
        Commands::Describe {
            path_or_url,
            version,
            out_dir,
            allow_local_deps,
            disallow_local_deps,
        } => commands::run_describe(
            ctx,
            path_or_url.as_deref(),
            version.as_deref(),
            out_dir.as_deref(),
            allow_local_deps,
            disallow_local_deps,
        ),
    }
}
