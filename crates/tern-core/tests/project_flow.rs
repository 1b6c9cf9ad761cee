//! End-to-end project flows: install, update, uninstall, clean against a
//! local registry of real (tagged) git repositories.

use std::fs;
use std::path::PathBuf;

use tern_core::{
    Cache, CancellationToken, LocalRegistry, LockFile, NullTracker, ProjectManager,
    ProjectPaths, RecordingUi, Registries, Registry, Spec,
};
use tern_test_utils::{git, registry as fixtures};

struct Playground {
    _tmp: tempfile::TempDir,
    project: PathBuf,
    registry_dir: PathBuf,
    repos: PathBuf,
}

impl Playground {
    fn new() -> Playground {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        let registry_dir = tmp.path().join("registry");
        let repos = tmp.path().join("repos");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&registry_dir).unwrap();
        fs::create_dir_all(&repos).unwrap();
        Playground {
            _tmp: tmp,
            project,
            registry_dir,
            repos,
        }
    }

    /// Tag a new version of `name` in its fixture repository and write a
    /// matching description into the registry. Returns the package URL
    /// (the repository path).
    fn publish(&self, name: &str, version: &str, deps: &[(&str, &str, &str)]) -> String {
        let repo = self.repos.join(name);
        if !repo.join(".git").exists() {
            git::init_repo(&repo);
        }
        let url = repo.display().to_string();
        let spec = fixtures::spec_yaml(Some(name), deps);
        git::commit_files_tagged(
            &repo,
            &[
                ("package.yaml", spec.as_str()),
                ("src/lib.tn", "// package code\n"),
            ],
            &format!("v{version}"),
        );
        let desc_deps: Vec<(&str, &str)> =
            deps.iter().map(|(_, dep_url, c)| (*dep_url, *c)).collect();
        fixtures::write_desc(
            &self.registry_dir,
            &url,
            version,
            &fixtures::desc_yaml(name, &url, version, &desc_deps),
        );
        url
    }

    fn manager<'a>(
        &self,
        ui: &'a RecordingUi,
        tracker: &'a NullTracker,
    ) -> ProjectManager<'a> {
        let cache = Cache::new(Vec::new(), Vec::new());
        let mut local = LocalRegistry::new("test", &self.registry_dir);
        local
            .load(false, &cache, &CancellationToken::new(), ui)
            .unwrap();
        let registries = Registries::new(vec![Box::new(local)]);
        ProjectManager::new(
            registries,
            cache,
            ProjectPaths::new(&self.project),
            ui,
            tracker,
        )
    }

    fn lock(&self) -> LockFile {
        LockFile::parse_file(&self.project.join("package.lock")).unwrap()
    }

    fn spec(&self, ui: &RecordingUi) -> Spec {
        Spec::parse_file(&self.project.join("package.yaml"), ui).unwrap()
    }
}

#[test]
fn install_by_name_pins_and_downloads() {
    let play = Playground::new();
    let url = play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    let cancel = CancellationToken::new();

    let (prefix, pkg_string) = m.install_pkg(false, None, "morse", &cancel).unwrap();
    assert_eq!(prefix, "morse");
    assert_eq!(pkg_string, format!("{url}@1.0.6"));

    // The spec gained a semver-compatible constraint.
    let spec = play.spec(&ui);
    let dep = &spec.deps["morse"];
    assert_eq!(dep.url.as_deref(), Some(url.as_str()));
    assert_eq!(dep.version.as_deref(), Some("^1.0.6"));

    // The lock pins the exact version under a short id.
    let lock = play.lock();
    let id = &lock.prefixes["morse"];
    let entry = &lock.packages[id];
    assert_eq!(entry.url.as_deref(), Some(url.as_str()));
    assert_eq!(entry.version.as_deref(), Some("1.0.6"));

    // The package landed in the project cache, read-only, with a README
    // next to it.
    let pkg_dir = m
        .cache
        .find_pkg(&play.project, &url, "1.0.6")
        .unwrap()
        .expect("package downloaded");
    let spec_file = pkg_dir.join("package.yaml");
    assert!(spec_file.is_file());
    assert!(fs::metadata(&spec_file).unwrap().permissions().readonly());
    assert!(play.project.join(".packages/README.md").is_file());
}

#[test]
fn install_by_short_url_suffix() {
    let play = Playground::new();
    let url = play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    // The repos live at <tmp>/repos/morse; "repos/morse" is a
    // slash-aligned suffix of the full URL.
    let (prefix, pkg_string) = m
        .install_pkg(false, None, "repos/morse", &CancellationToken::new())
        .unwrap();
    assert_eq!(prefix, "morse");
    assert_eq!(pkg_string, format!("{url}@1.0.6"));
}

#[test]
fn install_resolves_transitive_dependencies() {
    let play = Playground::new();
    let url_b = play.publish("b", "1.1.0", &[]);
    let url_a = play.publish("a", "1.7.0", &[("b", url_b.as_str(), "^1.0.0")]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    m.install_pkg(false, None, "a", &CancellationToken::new())
        .unwrap();

    let lock = play.lock();
    assert_eq!(lock.packages.len(), 2);
    let a_entry = &lock.packages[&lock.prefixes["a"]];
    assert_eq!(a_entry.url.as_deref(), Some(url_a.as_str()));
    // a's own prefix `b` is resolved inside its lock entry.
    let b_id = &a_entry.prefixes["b"];
    assert_eq!(lock.packages[b_id].url.as_deref(), Some(url_b.as_str()));
    assert_eq!(lock.packages[b_id].version.as_deref(), Some("1.1.0"));

    // Both packages are on disk.
    assert!(m
        .cache
        .find_pkg(&play.project, &url_b, "1.1.0")
        .unwrap()
        .is_some());
}

#[test]
fn install_with_version_constraint() {
    let play = Playground::new();
    play.publish("morse", "1.0.6", &[]);
    play.publish("morse", "1.2.0", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    let (_, pkg_string) = m
        .install_pkg(false, None, "morse@1.0.6", &CancellationToken::new())
        .unwrap();
    assert!(pkg_string.ends_with("@1.0.6"));

    let lock = play.lock();
    let entry = &lock.packages[&lock.prefixes["morse"]];
    assert_eq!(entry.version.as_deref(), Some("1.0.6"));
}

#[test]
fn reinstall_is_byte_identical() {
    let play = Playground::new();
    play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    let cancel = CancellationToken::new();

    m.install_pkg(false, None, "morse", &cancel).unwrap();
    let lock_before = fs::read(play.project.join("package.lock")).unwrap();
    let spec_before = fs::read(play.project.join("package.yaml")).unwrap();

    // A forced recompute prefers the locked versions and must reproduce
    // the files byte for byte.
    m.install(true, &cancel).unwrap();
    assert_eq!(fs::read(play.project.join("package.lock")).unwrap(), lock_before);
    assert_eq!(fs::read(play.project.join("package.yaml")).unwrap(), spec_before);
}

#[test]
fn install_keeps_locked_version_update_moves_on() {
    let play = Playground::new();
    play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    let cancel = CancellationToken::new();
    m.install_pkg(false, None, "morse", &cancel).unwrap();

    // A newer compatible version appears.
    play.publish("morse", "1.3.0", &[]);
    let m = play.manager(&ui, &tracker);

    // A forced recompute still prefers the locked 1.0.6.
    m.install(true, &cancel).unwrap();
    let entry_version = {
        let lock = play.lock();
        lock.packages[&lock.prefixes["morse"]]
            .version
            .clone()
            .unwrap()
    };
    assert_eq!(entry_version, "1.0.6");

    // Update resolves fresh and moves to 1.3.0.
    m.update(&cancel).unwrap();
    let lock = play.lock();
    let entry = &lock.packages[&lock.prefixes["morse"]];
    assert_eq!(entry.version.as_deref(), Some("1.3.0"));
}

#[test]
fn uninstall_removes_package_and_clean_prunes_cache() {
    let play = Playground::new();
    let url = play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    let cancel = CancellationToken::new();
    m.install_pkg(false, None, "morse", &cancel).unwrap();

    m.uninstall("morse", &cancel).unwrap();
    let lock = play.lock();
    assert!(lock.prefixes.is_empty());
    assert!(lock.packages.is_empty());

    // The download is still on disk until `clean` runs.
    let pkg_dir = m.cache.preferred_pkg_path(&play.project, &url, "1.0.6");
    assert!(pkg_dir.is_dir());
    m.clean().unwrap();
    assert!(!pkg_dir.exists());
    assert!(play.project.join(".packages/README.md").is_file());
}

#[test]
fn uninstall_unknown_prefix_is_informational() {
    let play = Playground::new();
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    m.uninstall("nope", &CancellationToken::new()).unwrap();
    assert_eq!(ui.messages(), vec!["Info: Prefix 'nope' does not exist"]);
}

#[test]
fn local_path_dependencies_reach_the_lock() {
    let play = Playground::new();
    let url_b = play.publish("b", "1.1.0", &[]);

    // A local library that itself depends on the registry package b.
    let lib = play.project.join("lib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(
        lib.join("package.yaml"),
        format!("name: lib\ndependencies:\n  b:\n    url: {url_b}\n    version: ^1.0.0\n"),
    )
    .unwrap();
    fs::write(
        play.project.join("package.yaml"),
        "name: app\ndependencies:\n  lib:\n    path: ./lib\n",
    )
    .unwrap();

    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    m.install(false, &CancellationToken::new()).unwrap();

    let lock = play.lock();
    let lib_id = &lock.prefixes["lib"];
    let lib_entry = &lock.packages[lib_id];
    assert_eq!(lib_entry.path.as_deref(), Some("lib"));
    // The local package's own prefix resolves to the downloaded b.
    let b_id = &lib_entry.prefixes["b"];
    assert_eq!(lock.packages[b_id].version.as_deref(), Some("1.1.0"));
}

#[test]
fn sdk_constraint_reaches_the_lock() {
    let play = Playground::new();
    let url = play.publish("morse", "1.0.6", &[]);
    fs::write(
        play.project.join("package.yaml"),
        format!(
            "name: app\nenvironment:\n  sdk: ^2.1.0\ndependencies:\n  morse:\n    url: {url}\n    version: ^1.0.0\n"
        ),
    )
    .unwrap();

    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    m.install(false, &CancellationToken::new()).unwrap();

    let lock = play.lock();
    assert_eq!(lock.sdk.as_deref(), Some("^2.1.0"));
    assert_eq!(
        lock.packages[&lock.prefixes["morse"]].version.as_deref(),
        Some("1.0.6")
    );
}

#[test]
fn drifted_lock_is_rejected() {
    let play = Playground::new();
    play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);
    let cancel = CancellationToken::new();
    m.install_pkg(false, None, "morse", &cancel).unwrap();

    // Someone empties the spec but leaves the lock behind.
    fs::write(play.project.join("package.yaml"), "name: app\n").unwrap();
    let err = m.install(false, &cancel).unwrap_err();
    assert!(err.is_already_reported());
    assert!(ui
        .messages()
        .iter()
        .any(|message| message.contains("morse")));
}

#[test]
fn registry_hash_is_verified_on_download() {
    let play = Playground::new();
    let url = play.publish("morse", "1.0.6", &[]);
    // Overwrite the description with a bogus content hash.
    let mut yaml = fixtures::desc_yaml("morse", &url, "1.0.6", &[]);
    yaml.push_str("hash: sha256:0000000000000000000000000000000000000000000000000000000000000000\n");
    fixtures::write_desc(&play.registry_dir, &url, "1.0.6", &yaml);

    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    let err = m
        .install_pkg(false, None, "morse", &CancellationToken::new())
        .unwrap_err();
    assert!(err.is_already_reported());
    assert!(ui
        .messages()
        .iter()
        .any(|message| message.contains("hash mismatch") || message.contains("Hash mismatch")));
    // The failed download left nothing behind.
    let partial = m.cache.preferred_pkg_path(&play.project, &url, "1.0.6");
    assert!(!partial.exists());
}

#[test]
fn cancellation_leaves_no_partial_state() {
    let play = Playground::new();
    play.publish("morse", "1.0.6", &[]);
    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = m.install_pkg(false, None, "morse", &cancel).unwrap_err();
    assert!(matches!(err, tern_core::Error::Cancelled));
    assert!(!play.project.join("package.lock").exists());
}

#[test]
fn local_install_uses_directory_name_as_prefix() {
    let play = Playground::new();
    let lib = play.project.join("mylib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("package.yaml"), "name: mylib\n").unwrap();

    let ui = RecordingUi::new();
    let tracker = NullTracker;
    let m = play.manager(&ui, &tracker);

    let lib_arg = lib.display().to_string();
    let (prefix, _) = m
        .install_pkg(true, None, &lib_arg, &CancellationToken::new())
        .unwrap();
    assert_eq!(prefix, "mylib");

    let spec = play.spec(&ui);
    assert_eq!(spec.deps["mylib"].path.as_deref(), Some(lib_arg.as_str()));
}
