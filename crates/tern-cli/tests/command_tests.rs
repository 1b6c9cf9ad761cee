//! Command-level tests driving the CLI glue with a recording UI and a
//! temporary configuration.

use std::fs;
use std::path::PathBuf;

use tern_cli::commands::{self, CommandContext};
use tern_cli::config::Config;
use tern_core::{CancellationToken, NullTracker, RecordingUi, RegistryConfig, RegistryKind};
use tern_test_utils::{git, registry as fixtures};

struct Sandbox {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    project: PathBuf,
    registry_dir: PathBuf,
}

impl Sandbox {
    fn new() -> Sandbox {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let project = root.join("project");
        let registry_dir = root.join("registry");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&registry_dir).unwrap();
        Sandbox {
            _tmp: tmp,
            root,
            project,
            registry_dir,
        }
    }

    fn publish(&self, name: &str, version: &str) -> String {
        let repo = self.root.join("repos").join(name);
        git::init_repo(&repo);
        let url = repo.display().to_string();
        let spec = fixtures::spec_yaml(Some(name), &[]);
        git::commit_files_tagged(
            &repo,
            &[("package.yaml", spec.as_str()), ("src/lib.tn", "// x\n")],
            &format!("v{version}"),
        );
        fixtures::write_desc(
            &self.registry_dir,
            &url,
            version,
            &fixtures::desc_yaml(name, &url, version, &[]),
        );
        url
    }

    fn context<'a>(&self, ui: &'a RecordingUi, tracker: &'a NullTracker) -> CommandContext<'a> {
        let mut config = Config::default();
        config.autosync = false;
        config.package_cache_paths = vec![self.root.join("cache/packages")];
        config.registry_cache_paths = vec![self.root.join("cache/registries")];
        config.registries = vec![RegistryConfig {
            name: "dev".to_string(),
            kind: RegistryKind::Local,
            path: self.registry_dir.display().to_string(),
        }];
        CommandContext {
            config,
            config_path: self.root.join("config.yaml"),
            project_root: Some(self.project.clone()),
            ui,
            tracker,
            cancel: CancellationToken::new(),
        }
    }
}

#[test]
fn init_creates_project_files() {
    let sandbox = Sandbox::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let ctx = sandbox.context(&ui, &tracker);

    commands::run_init(&ctx).unwrap();
    assert!(sandbox.project.join("package.yaml").is_file());
    assert!(sandbox.project.join("package.lock").is_file());
}

#[test]
fn install_package_end_to_end() {
    let sandbox = Sandbox::new();
    sandbox.publish("morse", "1.0.6");
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let ctx = sandbox.context(&ui, &tracker);

    commands::run_install(&ctx, Some("morse"), false, None, false).unwrap();

    assert!(sandbox.project.join("package.lock").is_file());
    let lock = fs::read_to_string(sandbox.project.join("package.lock")).unwrap();
    assert!(lock.contains("1.0.6"));
    assert!(ui
        .messages()
        .iter()
        .any(|m| m.contains("installed with prefix 'morse'")));
}

#[test]
fn install_flag_validation() {
    let sandbox = Sandbox::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let ctx = sandbox.context(&ui, &tracker);

    let err = commands::run_install(&ctx, None, true, None, false).unwrap_err();
    assert!(err.to_string().contains("--local"));

    let err = commands::run_install(&ctx, None, false, Some("m"), false).unwrap_err();
    assert!(err.to_string().contains("--prefix"));

    let err = commands::run_install(&ctx, Some("morse"), false, None, true).unwrap_err();
    assert!(err.to_string().contains("--recompute"));
}

#[test]
fn registry_add_and_remove_persist_config() {
    let sandbox = Sandbox::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let mut ctx = sandbox.context(&ui, &tracker);

    let second = sandbox.root.join("second-registry");
    fs::create_dir_all(&second).unwrap();
    let second_str = second.display().to_string();

    commands::run_registry_add(&mut ctx, "second", &second_str, true).unwrap();
    assert_eq!(ctx.config.registries.len(), 2);
    // Persisted for the next invocation.
    let reloaded = Config::load(&ctx.config_path).unwrap();
    assert!(reloaded.registries.iter().any(|r| r.name == "second"));

    let err = commands::run_registry_add(&mut ctx, "second", "/elsewhere", false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    commands::run_registry_remove(&mut ctx, "second").unwrap();
    let reloaded = Config::load(&ctx.config_path).unwrap();
    assert!(!reloaded.registries.iter().any(|r| r.name == "second"));

    let err = commands::run_registry_remove(&mut ctx, "second").unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn registry_add_rejects_missing_local_path() {
    let sandbox = Sandbox::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let mut ctx = sandbox.context(&ui, &tracker);

    let missing = sandbox.root.join("nope").display().to_string();
    let err = commands::run_registry_add(&mut ctx, "broken", &missing, true).unwrap_err();
    assert!(err.to_string().contains("doesn't exist"));
}

#[test]
fn describe_writes_into_out_dir() {
    let sandbox = Sandbox::new();
    let url = sandbox.publish("morse", "1.0.6");
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let ctx = sandbox.context(&ui, &tracker);

    let out_dir = sandbox.root.join("out");
    commands::run_describe(
        &ctx,
        Some(url.as_str()),
        Some("1.0.6"),
        Some(out_dir.as_path()),
        false,
        false,
    )
    .unwrap();

    let written = out_dir
        .join("packages")
        .join(fixtures::escape_url(&url))
        .join("1.0.6/desc.yaml");
    assert!(written.is_file(), "expected {}", written.display());
    let content = fs::read_to_string(written).unwrap();
    assert!(content.contains("name: morse"));
    assert!(content.contains("hash: sha256:"));
}

#[test]
fn describe_out_dir_requires_version() {
    let sandbox = Sandbox::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let ctx = sandbox.context(&ui, &tracker);

    let out = sandbox.root.join("out");
    let err =
        commands::run_describe(&ctx, Some("x"), None, Some(out.as_path()), false, false)
            .unwrap_err();
    assert!(err.to_string().contains("--out-dir"));
}
