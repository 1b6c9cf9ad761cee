//! Git-backed registries: clone on first sync, pull afterwards.

use std::path::PathBuf;

use tern_core::{Cache, CancellationToken, GitRegistry, RecordingUi, Registry};
use tern_test_utils::{git, registry as fixtures};

struct Remote {
    _tmp: tempfile::TempDir,
    origin: PathBuf,
    cache_root: PathBuf,
}

impl Remote {
    fn new() -> Remote {
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        let cache_root = tmp.path().join("registries");
        git::init_repo(&origin);
        Remote {
            _tmp: tmp,
            origin,
            cache_root,
        }
    }

    fn publish(&self, name: &str, url: &str, version: &str) {
        let rel = PathBuf::from("packages")
            .join(fixtures::escape_url(url))
            .join(version)
            .join("desc.yaml");
        let yaml = fixtures::desc_yaml(name, url, version, &[]);
        git::commit_files_tagged(
            &self.origin,
            &[(rel.to_str().unwrap(), yaml.as_str())],
            &format!("{name}-{version}"),
        );
    }

    fn cache(&self) -> Cache {
        Cache::new(Vec::new(), vec![self.cache_root.clone()])
    }
}

#[test]
fn first_sync_clones_with_branch_fallback() {
    let remote = Remote::new();
    remote.publish("morse", "github.com/example/morse", "1.0.6");
    let ui = RecordingUi::new();
    let cache = remote.cache();
    let url = remote.origin.display().to_string();

    // The fixture repository uses `main`, so the `master` attempt has to
    // fall through.
    let mut registry = GitRegistry::new("dev", &url, &cache).unwrap();
    assert!(registry.entries().is_empty());
    registry
        .load(true, &cache, &CancellationToken::new(), &ui)
        .unwrap();

    assert_eq!(registry.entries().len(), 1);
    assert_eq!(registry.entries()[0].name, "morse");
}

#[test]
fn later_syncs_pull_new_entries() {
    let remote = Remote::new();
    remote.publish("morse", "github.com/example/morse", "1.0.6");
    let ui = RecordingUi::new();
    let cache = remote.cache();
    let url = remote.origin.display().to_string();

    let mut registry = GitRegistry::new("dev", &url, &cache).unwrap();
    registry
        .load(true, &cache, &CancellationToken::new(), &ui)
        .unwrap();
    assert_eq!(registry.entries().len(), 1);

    remote.publish("encoding", "github.com/example/encoding", "2.0.0");

    // A fresh registry picks the existing clone up from the cache and
    // pulls instead of cloning.
    let mut registry = GitRegistry::new("dev", &url, &cache).unwrap();
    registry
        .load(true, &cache, &CancellationToken::new(), &ui)
        .unwrap();
    assert_eq!(registry.entries().len(), 2);
}

#[test]
fn unsynced_registry_loads_empty() {
    let remote = Remote::new();
    let ui = RecordingUi::new();
    let cache = remote.cache();
    let url = remote.origin.display().to_string();

    let mut registry = GitRegistry::new("dev", &url, &cache).unwrap();
    registry
        .load(false, &cache, &CancellationToken::new(), &ui)
        .unwrap();
    assert!(registry.entries().is_empty());
}
