//! Project-level package management: the operations behind `install`,
//! `uninstall`, `update`, and `clean`.
//!
//! A [`ProjectManager`] bundles the loaded registries, the cache, the
//! project paths, and the UI/tracking capabilities, and owns the full
//! cycle: read spec → solve → download → write lock.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::cancel::CancellationToken;
use crate::constants::{LOCK_FILE, PROJECT_PACKAGES_DIR, SPEC_FILE};
use crate::constraint::Constraint;
use crate::desc::Desc;
use crate::error::{Error, Result};
use crate::fetch;
use crate::lock::{build_lock_file, LockFile};
use crate::path::is_identifier;
use crate::registry::{without_lower_versions, Registries};
use crate::solver::Solver;
use crate::spec::{Spec, SpecDep};
use crate::track::{Event, Tracker};
use crate::ui::Ui;

/// The files a project's package management operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub lock_path: PathBuf,
    pub spec_path: PathBuf,
}

impl ProjectPaths {
    /// Paths with the default file names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> ProjectPaths {
        let root = root.into();
        ProjectPaths {
            lock_path: root.join(LOCK_FILE),
            spec_path: root.join(SPEC_FILE),
            root,
        }
    }

    /// Walk upward from `start` until a directory holding a spec or lock
    /// file is found. Falls back to `start` itself when no project root
    /// exists on the way up.
    pub fn discover(start: &Path) -> ProjectPaths {
        let mut dir = start;
        loop {
            if dir.join(LOCK_FILE).is_file() || dir.join(SPEC_FILE).is_file() {
                return ProjectPaths::new(dir);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return ProjectPaths::new(start),
            }
        }
    }
}

/// Initialize `paths.root` as a project root by creating empty spec and
/// lock files. Reports (and succeeds) when the directory is already
/// initialized.
pub fn init_directory(paths: &ProjectPaths, ui: &dyn Ui) -> Result<()> {
    if paths.spec_path.is_file() || paths.lock_path.is_file() {
        ui.report_info(&format!(
            "Directory '{}' already initialized",
            paths.root.display()
        ));
        return Ok(());
    }
    fs::write(&paths.spec_path, "# Tern package file.\n")
        .map_err(|e| Error::io(&paths.spec_path, e))?;
    fs::write(&paths.lock_path, "# Tern lock file.\n")
        .map_err(|e| Error::io(&paths.lock_path, e))
}

/// Package manager for one project.
pub struct ProjectManager<'a> {
    pub registries: Registries,
    pub cache: Cache,
    pub paths: ProjectPaths,
    pub ui: &'a dyn Ui,
    pub tracker: &'a dyn Tracker,
}

impl<'a> ProjectManager<'a> {
    pub fn new(
        registries: Registries,
        cache: Cache,
        paths: ProjectPaths,
        ui: &'a dyn Ui,
        tracker: &'a dyn Tracker,
    ) -> ProjectManager<'a> {
        ProjectManager {
            registries,
            cache,
            paths,
            ui,
            tracker,
        }
    }

    /// Read the spec and lock files that exist, validating that the lock
    /// has not drifted from the spec. A missing spec is synthesized from
    /// the lock (or empty).
    pub fn read_spec_and_lock(&self) -> Result<(Spec, Option<LockFile>)> {
        let spec = if self.paths.spec_path.is_file() {
            Some(Spec::parse_file(&self.paths.spec_path, self.ui)?)
        } else {
            None
        };
        let lock = if self.paths.lock_path.is_file() {
            Some(LockFile::parse_file(&self.paths.lock_path)?)
        } else {
            None
        };

        if let (Some(spec), Some(lock)) = (&spec, &lock) {
            // Don't silently regenerate a lock whose prefixes the spec no
            // longer declares; that usually means an emptied spec file.
            let mut missing: Vec<&str> = lock
                .prefixes
                .keys()
                .filter(|prefix| !spec.deps.contains_key(*prefix))
                .map(String::as_str)
                .collect();
            missing.sort_unstable();
            match missing.len() {
                0 => {}
                1 => {
                    return Err(self.ui.report_error(&format!(
                        "Lock file has prefix that isn't in {}: '{}'",
                        SPEC_FILE, missing[0]
                    )));
                }
                _ => {
                    return Err(self.ui.report_error(&format!(
                        "Lock file has prefixes that aren't in {}: {}",
                        SPEC_FILE,
                        missing.join(", ")
                    )));
                }
            }
        }

        let spec = match (spec, &lock) {
            (Some(spec), _) => spec,
            (None, Some(lock)) => Spec::from_lock_file(lock, &self.paths.spec_path)?,
            (None, None) => Spec::new(&self.paths.spec_path),
        };
        Ok((spec, lock))
    }

    fn write_spec_and_lock(&self, spec: &Spec, lock: &LockFile) -> Result<()> {
        spec.write_to_file()?;
        lock.write_to_file()
    }

    /// Fetch (url, version) unless some cache root already has it.
    fn download(
        &self,
        url: &str,
        version: &str,
        hash: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.cache.find_pkg(&self.paths.root, url, version)?.is_some() {
            return Ok(());
        }
        self.cache
            .create_packages_cache_dir(&self.paths.root, self.ui)?;
        let dest = self.cache.preferred_pkg_path(&self.paths.root, url, version);
        let result = fetch::download_git(&dest, url, version, hash, cancel, self.ui);

        let mut event = Event::new("pkg", "download-git")
            .with_field("url", url)
            .with_field("version", version);
        if let Some(hash) = hash {
            event = event.with_field("hash", hash);
        }
        if result.is_err() {
            event = event.with_label("failure");
        }
        self.tracker.track(&event);

        result.map(|_commit| ())
    }

    /// Make sure every package of the lock is present: downloads for
    /// url/version entries, a directory check for path entries.
    fn download_lock_file_packages(
        &self,
        lock: &LockFile,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut encountered_error = false;
        for (id, entry) in &lock.packages {
            match &entry.path {
                None => {
                    let (Some(url), Some(version)) = (&entry.url, &entry.version) else {
                        return Err(Error::Internal(format!(
                            "lock entry '{id}' has neither path nor url/version"
                        )));
                    };
                    self.download(url, version, entry.hash.as_deref(), cancel)?;
                }
                Some(path) => {
                    let dir = self.paths.root.join(path);
                    if !dir.is_dir() {
                        let _ = self.ui.report_error(&format!(
                            "Target of '{id}' is not a directory: '{}'",
                            dir.display()
                        ));
                        encountered_error = true;
                    }
                }
            }
        }
        if encountered_error {
            return Err(Error::AlreadyReported);
        }
        Ok(())
    }

    /// Solve the spec, download everything the solution selected, and
    /// build the corresponding lock file. `preferred` pairs are tried
    /// first by the solver, ahead of versions taken from `old_lock`.
    fn download_and_update_lock(
        &self,
        spec: &Spec,
        old_lock: Option<&LockFile>,
        mut preferred: Vec<(String, String)>,
        cancel: &CancellationToken,
    ) -> Result<LockFile> {
        let solver_deps = spec.build_solver_deps(&self.paths.root, self.ui)?;
        let mut solver = Solver::new(&self.registries, self.ui)?;
        if let Some(lock) = old_lock {
            for entry in lock.packages.values() {
                if let (Some(url), Some(version)) = (&entry.url, &entry.version) {
                    preferred.push((url.clone(), version.clone()));
                }
            }
        }
        solver.set_preferred(&preferred);
        let solution = solver.solve(solver_deps)?;

        // The lock builder reads each selected package's own spec, so
        // everything must be on disk first.
        for (url, versions) in solution.iter() {
            for version in versions {
                let version = version.to_string();
                let hash = self.registries.hash_for(url, &version);
                self.download(url, &version, hash.as_deref(), cancel)?;
            }
        }

        build_lock_file(
            spec,
            &solution,
            &self.registries,
            &self.cache,
            &self.paths.root,
            &self.paths.lock_path,
            self.ui,
        )
    }

    /// Install one package. `id` is a local directory (with `is_local`),
    /// a package name, or a (suffix of a) package URL, optionally ending
    /// in `@<version>`. Returns the chosen prefix and a display string
    /// for the installed package.
    pub fn install_pkg(
        &self,
        is_local: bool,
        prefix: Option<&str>,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let mut preferred = Vec::new();
        let (suggested_prefix, dep, pkg_string) = if is_local {
            let suggested = self.prepare_install_local(id)?;
            (suggested, SpecDep::local(id), id.to_string())
        } else {
            let desc = self.prepare_install_git(id)?;
            // Installed packages accept semver compatible upgrades.
            let constraint = format!("^{}", desc.version);
            preferred.push((desc.url.clone(), desc.version.clone()));
            let pkg_string = format!("{}@{}", desc.url, desc.version);
            (
                desc.name.clone(),
                SpecDep::remote(desc.url, Some(constraint)),
                pkg_string,
            )
        };

        let prefix = match prefix {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => suggested_prefix,
        };
        if !is_identifier(&prefix) {
            return Err(self.ui.report_error(&format!(
                "'{prefix}' is not a valid prefix; provide one with '--prefix'"
            )));
        }

        let (mut spec, lock) = self.read_spec_and_lock()?;
        spec.add_dep(&prefix, dep, self.ui)?;
        let updated = self.download_and_update_lock(&spec, lock.as_ref(), preferred, cancel)?;
        self.write_spec_and_lock(&spec, &updated)?;
        Ok((prefix, pkg_string))
    }

    /// Check that `path` is a package directory; the suggested prefix is
    /// its base name.
    fn prepare_install_local(&self, path: &str) -> Result<String> {
        let abs = fs::canonicalize(path)
            .map_err(|_| self.ui.report_error(&format!("Target '{path}' is not a directory")))?;
        if !abs.is_dir() {
            return Err(self
                .ui
                .report_error(&format!("Target '{path}' is not a directory")));
        }
        Ok(abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    /// Find the description of the package to install. Searches short
    /// URLs always, names when `id` has no `/`, filters to the requested
    /// version range, and requires an unambiguous result.
    fn prepare_install_git(&self, id: &str) -> Result<Desc> {
        if id.is_empty() {
            return Err(self.ui.report_error("Missing package name"));
        }

        let (name, version_str) = match id.rfind('@') {
            Some(pos) if pos > 0 => (&id[..pos], Some(&id[pos + 1..])),
            _ => (id, None),
        };
        if version_str == Some("") {
            return Err(self
                .ui
                .report_error(&format!("Missing version after '@' in '{id}'")));
        }

        let mut found = self.registries.search_short_url(name);
        if !name.contains('/') {
            found.extend(self.registries.search_name(name));
        }
        if found.is_empty() {
            return Err(self.ui.report_error(&format!("Package '{name}' not found")));
        }

        let constraint = match version_str {
            None => None,
            Some(v) => Some(Constraint::parse_install(v).map_err(|_| {
                self.ui.report_error(&format!("Invalid version: '{v}'"))
            })?),
        };
        let found = without_lower_versions(found, constraint.as_ref())?;

        match found.len() {
            0 => {
                let version = version_str.unwrap_or_default();
                Err(self
                    .ui
                    .report_error(&format!("Package '{name}@{version}' not found")))
            }
            1 => Ok(found[0].desc.clone()),
            _ => {
                // A package URL could embed someone else's full URL; an
                // exact match outranks suffix matches.
                if let Some(exact) = found.iter().find(|m| m.desc.url == name) {
                    return Ok(exact.desc.clone());
                }
                Err(self.ui.report_error(&format!(
                    "More than one matching package '{name}' found"
                )))
            }
        }
    }

    /// Remove the dependency under `prefix` and re-resolve. A missing
    /// prefix is reported as information, not an error.
    pub fn uninstall(&self, prefix: &str, cancel: &CancellationToken) -> Result<()> {
        let (mut spec, lock) = self.read_spec_and_lock()?;
        if spec.deps.remove(prefix).is_none() {
            self.ui
                .report_info(&format!("Prefix '{prefix}' does not exist"));
            return Ok(());
        }
        let updated = self.download_and_update_lock(&spec, lock.as_ref(), Vec::new(), cancel)?;
        self.write_spec_and_lock(&spec, &updated)
    }

    /// Download all dependencies. The lock is reused as-is when possible;
    /// it is recomputed (preferring locked versions) when forced, absent,
    /// or when it contains local path dependencies whose constraints may
    /// have changed.
    pub fn install(&self, force_recompute: bool, cancel: &CancellationToken) -> Result<()> {
        let (spec, lock) = self.read_spec_and_lock()?;
        if !force_recompute {
            if let Some(lock) = &lock {
                if lock.packages.values().all(|entry| entry.path.is_none()) {
                    return self.download_lock_file_packages(lock, cancel);
                }
            }
        }
        let updated = self.download_and_update_lock(&spec, lock.as_ref(), Vec::new(), cancel)?;
        self.write_spec_and_lock(&spec, &updated)
    }

    /// Re-resolve everything to the highest compatible versions, ignoring
    /// the current lock.
    pub fn update(&self, cancel: &CancellationToken) -> Result<()> {
        let (spec, _lock) = self.read_spec_and_lock()?;
        let updated = self.download_and_update_lock(&spec, None, Vec::new(), cancel)?;
        self.write_spec_and_lock(&spec, &updated)
    }

    /// Remove every `.packages/` entry the lock does not reference. The
    /// cache README survives.
    pub fn clean(&self) -> Result<()> {
        let (_, lock) = self.read_spec_and_lock()?;
        let lock = lock.unwrap_or_else(|| LockFile::new(&self.paths.lock_path));

        let packages_root = self.paths.root.join(PROJECT_PACKAGES_DIR);
        match fs::metadata(&packages_root) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(&packages_root, e)),
            Ok(metadata) if !metadata.is_dir() => {
                return Err(self.ui.report_error(&format!(
                    "Packages cache path is not a directory: '{}'",
                    packages_root.display()
                )));
            }
            Ok(_) => {}
        }
        let packages_root =
            fs::canonicalize(&packages_root).map_err(|e| Error::io(&packages_root, e))?;

        // Map every path segment leading to a kept package: `false` means
        // recurse further, `true` means the whole subtree stays.
        let mut keep: HashMap<PathBuf, bool> = HashMap::new();
        for entry in lock.packages.values() {
            let (Some(url), Some(version)) = (&entry.url, &entry.version) else {
                continue;
            };
            let Some(pkg_path) = self.cache.find_pkg(&self.paths.root, url, version)? else {
                continue;
            };
            let full = fs::canonicalize(&pkg_path).map_err(|e| Error::io(&pkg_path, e))?;
            if let Ok(rel) = full.strip_prefix(&packages_root) {
                let mut accumulated = PathBuf::new();
                for component in rel.components() {
                    accumulated.push(component);
                    keep.insert(accumulated.clone(), false);
                }
                keep.insert(rel.to_path_buf(), true);
            }
        }
        keep.insert(PathBuf::from("README.md"), false);

        clean_dir(&packages_root, Path::new(""), &keep)
    }
}

fn clean_dir(dir: &Path, rel: &Path, keep: &HashMap<PathBuf, bool>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let child_rel = rel.join(entry.file_name());
        let child_path = entry.path();
        match keep.get(&child_rel) {
            None => {
                let file_type = entry.file_type().map_err(|e| Error::io(&child_path, e))?;
                if file_type.is_dir() {
                    fs::remove_dir_all(&child_path).map_err(|e| Error::io(&child_path, e))?;
                } else {
                    fs::remove_file(&child_path).map_err(|e| Error::io(&child_path, e))?;
                }
            }
            Some(true) => {}
            Some(false) => {
                if entry
                    .file_type()
                    .map_err(|e| Error::io(&child_path, e))?
                    .is_dir()
                {
                    clean_dir(&child_path, &child_rel, keep)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingUi;

    #[test]
    fn discover_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let nested = root.join("src/deeply/nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join(SPEC_FILE), "name: app\n").unwrap();

        let paths = ProjectPaths::discover(&nested);
        assert_eq!(paths.root, root);
        assert_eq!(paths.spec_path, root.join(SPEC_FILE));
    }

    #[test]
    fn discover_defaults_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::discover(dir.path());
        assert_eq!(paths.root, dir.path());
    }

    #[test]
    fn init_creates_both_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let ui = RecordingUi::new();

        init_directory(&paths, &ui).unwrap();
        assert!(paths.spec_path.is_file());
        assert!(paths.lock_path.is_file());
        assert!(ui.messages().is_empty());

        init_directory(&paths, &ui).unwrap();
        assert_eq!(ui.messages().len(), 1);
        assert!(ui.messages()[0].contains("already initialized"));
    }
}
