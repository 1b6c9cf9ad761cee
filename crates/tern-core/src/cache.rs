//! The package and registry caches.
//!
//! A cache is a list of roots. For packages the per-project `.packages/`
//! directory is always consulted first and is the preferred (writable)
//! destination; any configured global roots serve as read-only fallbacks.
//! Registries have their own root list, with the first root preferred.
//!
//! Layout: `<root>/<escaped-url>/<version>/...` for packages and
//! `<root>/<url>/...` for registry clones, where escaping replaces `:`
//! with `%3A`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{PROJECT_PACKAGES_DIR, SPEC_FILE};
use crate::error::{Error, Result};
use crate::path::{escape_url, url_version_rel_path};
use crate::ui::Ui;

const PACKAGES_README: &str = "\
# Package Cache Directory

This directory contains packages downloaded by the Tern package manager.

The package manager can download these packages again at any time, so it
is safe to delete the contents of this directory.
";

/// Resolves (url, version) pairs to on-disk directories across the
/// configured cache roots.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    /// Package roots; searched after the project's `.packages`.
    pkg_cache_paths: Vec<PathBuf>,
    /// Registry roots; the first one receives new clones.
    registry_cache_paths: Vec<PathBuf>,
}

impl Cache {
    pub fn new(pkg_cache_paths: Vec<PathBuf>, registry_cache_paths: Vec<PathBuf>) -> Cache {
        Cache {
            pkg_cache_paths,
            registry_cache_paths,
        }
    }

    fn find(&self, rel: &Path, roots: impl Iterator<Item = PathBuf>) -> Result<Option<PathBuf>> {
        for root in roots {
            let candidate = root.join(rel);
            match fs::metadata(&candidate) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&candidate, e)),
                Ok(metadata) => {
                    if !metadata.is_dir() {
                        return Err(Error::NotFound(format!(
                            "cache path '{}' exists but is not a directory",
                            candidate.display()
                        )));
                    }
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    /// The directory holding (url, version), searching the project's
    /// `.packages` first, then the configured package roots.
    pub fn find_pkg(
        &self,
        project_root: &Path,
        url: &str,
        version: &str,
    ) -> Result<Option<PathBuf>> {
        let rel = url_version_rel_path(url, version);
        let project_packages = project_root.join(PROJECT_PACKAGES_DIR);
        let roots = std::iter::once(project_packages).chain(self.pkg_cache_paths.iter().cloned());
        self.find(&rel, roots)
    }

    /// The clone of the registry with the given URL, if any root has one.
    pub fn find_registry(&self, url: &str) -> Result<Option<PathBuf>> {
        let rel = escape_url(url);
        self.find(&rel, self.registry_cache_paths.iter().cloned())
    }

    /// Path of the spec file inside the cached package (url, version).
    ///
    /// Returns `Ok(None)` when the package is not cached at all; a cached
    /// package without a spec file is an error.
    pub fn spec_path_for(
        &self,
        project_root: &Path,
        url: &str,
        version: &str,
    ) -> Result<Option<PathBuf>> {
        let Some(pkg_path) = self.find_pkg(project_root, url, version)? else {
            return Ok(None);
        };
        let spec_path = pkg_path.join(SPEC_FILE);
        if !spec_path.is_file() {
            return Err(Error::NotFound(format!(
                "missing spec file for package '{url}@{version}'"
            )));
        }
        Ok(Some(spec_path))
    }

    /// Where a new download of (url, version) should go: the project's
    /// `.packages`.
    pub fn preferred_pkg_path(&self, project_root: &Path, url: &str, version: &str) -> PathBuf {
        project_root
            .join(PROJECT_PACKAGES_DIR)
            .join(url_version_rel_path(url, version))
    }

    /// Where a new registry clone should go: the first registry root.
    pub fn preferred_registry_path(&self, url: &str) -> PathBuf {
        self.registry_cache_paths
            .first()
            .cloned()
            .unwrap_or_default()
            .join(escape_url(url))
    }

    /// Create the project's `.packages` directory (with its README) if it
    /// does not exist yet.
    pub fn create_packages_cache_dir(&self, project_root: &Path, ui: &dyn Ui) -> Result<()> {
        let dir = project_root.join(PROJECT_PACKAGES_DIR);
        match fs::metadata(&dir) {
            Ok(metadata) => {
                if !metadata.is_dir() {
                    return Err(ui.report_error(&format!(
                        "Package cache path already exists but is not a directory: '{}'",
                        dir.display()
                    )));
                }
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&dir, e)),
        }
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let readme = dir.join("README.md");
        fs::write(&readme, PACKAGES_README).map_err(|e| Error::io(&readme, e))
    }
}

/// Clear the write bits of every file below `dir`. Directories keep their
/// modes so the cache itself can still be cleaned.
pub fn make_contained_read_only(dir: &Path) {
    for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        permissions.set_readonly(true);
        if let Err(e) = fs::set_permissions(entry.path(), permissions) {
            tracing::warn!(path = %entry.path().display(), error = %e, "failed to mark read-only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingUi;

    #[test]
    fn project_packages_is_searched_first() {
        let project = tempfile::tempdir().unwrap();
        let global = tempfile::tempdir().unwrap();
        let rel = "github.com/example/morse/1.0.6";
        let in_project = project.path().join(".packages").join(rel);
        let in_global = global.path().join(rel);
        fs::create_dir_all(&in_project).unwrap();
        fs::create_dir_all(&in_global).unwrap();

        let cache = Cache::new(vec![global.path().to_path_buf()], Vec::new());
        let found = cache
            .find_pkg(project.path(), "github.com/example/morse", "1.0.6")
            .unwrap();
        assert_eq!(found, Some(in_project));
    }

    #[test]
    fn global_root_is_fallback() {
        let project = tempfile::tempdir().unwrap();
        let global = tempfile::tempdir().unwrap();
        let in_global = global.path().join("github.com/example/morse/1.0.6");
        fs::create_dir_all(&in_global).unwrap();

        let cache = Cache::new(vec![global.path().to_path_buf()], Vec::new());
        let found = cache
            .find_pkg(project.path(), "github.com/example/morse", "1.0.6")
            .unwrap();
        assert_eq!(found, Some(in_global));
    }

    #[test]
    fn missing_package_is_none() {
        let project = tempfile::tempdir().unwrap();
        let cache = Cache::new(Vec::new(), Vec::new());
        assert_eq!(
            cache.find_pkg(project.path(), "github.com/x/y", "1.0.0").unwrap(),
            None
        );
    }

    #[test]
    fn spec_path_requires_spec_file() {
        let project = tempfile::tempdir().unwrap();
        let pkg_dir = project
            .path()
            .join(".packages/github.com/example/morse/1.0.6");
        fs::create_dir_all(&pkg_dir).unwrap();

        let cache = Cache::new(Vec::new(), Vec::new());
        let err = cache
            .spec_path_for(project.path(), "github.com/example/morse", "1.0.6")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        fs::write(pkg_dir.join("package.yaml"), "name: morse\n").unwrap();
        let found = cache
            .spec_path_for(project.path(), "github.com/example/morse", "1.0.6")
            .unwrap();
        assert_eq!(found, Some(pkg_dir.join("package.yaml")));
    }

    #[test]
    fn create_packages_cache_dir_writes_readme() {
        let project = tempfile::tempdir().unwrap();
        let ui = RecordingUi::new();
        let cache = Cache::new(Vec::new(), Vec::new());
        cache
            .create_packages_cache_dir(project.path(), &ui)
            .unwrap();
        let readme = project.path().join(".packages/README.md");
        assert!(readme.is_file());
        // Idempotent.
        cache
            .create_packages_cache_dir(project.path(), &ui)
            .unwrap();
    }

    #[test]
    fn read_only_marks_files_not_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("pkg/src");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("lib.tn");
        fs::write(&file, "content").unwrap();

        make_contained_read_only(dir.path());

        assert!(fs::metadata(&file).unwrap().permissions().readonly());
        assert!(!fs::metadata(&nested).unwrap().permissions().readonly());
    }

    #[test]
    fn preferred_paths() {
        let cache = Cache::new(
            vec![PathBuf::from("/global")],
            vec![PathBuf::from("/registries")],
        );
        assert_eq!(
            cache.preferred_pkg_path(Path::new("/proj"), "host.com:1/x", "1.0.0"),
            PathBuf::from("/proj/.packages/host.com%3A1/x/1.0.0")
        );
        assert_eq!(
            cache.preferred_registry_path("github.com/example/registry"),
            PathBuf::from("/registries/github.com/example/registry")
        );
    }
}
