//! The lock file (`package.lock`): the resolved, pinned dependency graph.
//!
//! The lock maps short opaque package ids to pinned (url, version, hash)
//! triples or local paths, and maps prefixes (the project's own and each
//! package's) to those ids. The writer regenerates the file wholesale;
//! ids are minimised deterministically so diffs stay small.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::constraint::Constraint;
use crate::error::{Error, Result};
use crate::io;
use crate::registry::Registries;
use crate::solver::Solution;
use crate::spec::Spec;
use crate::ui::Ui;
use crate::version::Version;

/// One pinned package inside the lock file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Set for local path dependencies instead of url/version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// This package's own prefix → package-id mapping.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefixes: BTreeMap<String, String>,
}

/// A parsed `package.lock`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    /// SDK constraint the project needs, e.g. `^2.0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    /// The project's prefix → package-id mapping.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefixes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, PackageEntry>,
    /// Where this lock was read from and will be written to.
    #[serde(skip)]
    pub path: PathBuf,
}

impl LockFile {
    /// An empty lock that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> LockFile {
        LockFile {
            path: path.into(),
            ..LockFile::default()
        }
    }

    pub fn parse_file(path: &Path) -> Result<LockFile> {
        let content = io::read_to_string(path)?;
        Self::parse_str(&content, path)
    }

    pub fn parse_str(content: &str, path: &Path) -> Result<LockFile> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::yaml(path, e.to_string()))?;
        // A file holding only comments parses as null; treat it as empty.
        if value.is_null() {
            return Ok(LockFile::new(path));
        }
        let mut lock: LockFile =
            serde_yaml::from_value(value).map_err(|e| Error::yaml(path, e.to_string()))?;
        lock.path = path.to_path_buf();
        lock.validate()?;
        Ok(lock)
    }

    fn validate(&self) -> Result<()> {
        let check = |prefix: &str, id: &str| -> Result<()> {
            if !self.packages.contains_key(id) {
                return Err(Error::yaml(
                    &self.path,
                    format!("prefix '{prefix}' refers to unknown package '{id}'"),
                ));
            }
            Ok(())
        };
        for (prefix, id) in &self.prefixes {
            check(prefix, id)?;
        }
        for entry in self.packages.values() {
            for (prefix, id) in &entry.prefixes {
                check(prefix, id)?;
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::yaml(&self.path, e.to_string()))
    }

    pub fn write_to_file(&self) -> Result<()> {
        io::write_atomic(&self.path, self.to_yaml()?.as_bytes())
    }

    /// Shorten package ids to the last URL segment, disambiguating shared
    /// segments with `-<version>` and, failing that, with further URL
    /// segments. Deterministic for a given package set and idempotent:
    /// candidates are derived from urls and versions, never from the
    /// current ids.
    pub fn optimize_pkg_ids(&mut self) {
        let mut candidate_lists: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (old_id, entry) in &self.packages {
            candidate_lists.insert(old_id.clone(), id_candidates(old_id, entry));
        }

        let mut level: BTreeMap<&str, usize> = candidate_lists
            .keys()
            .map(|id| (id.as_str(), 0usize))
            .collect();
        loop {
            let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
            for (id, lvl) in &level {
                let cands = &candidate_lists[*id];
                let candidate = &cands[(*lvl).min(cands.len() - 1)];
                groups.entry(candidate.as_str()).or_default().push(*id);
            }
            let mut changed = false;
            for ids in groups.values() {
                if ids.len() < 2 {
                    continue;
                }
                for id in ids {
                    let cands = &candidate_lists[*id];
                    let lvl = level.get_mut(*id).expect("level tracked for every id");
                    if *lvl + 1 < cands.len() {
                        *lvl += 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let renames: HashMap<String, String> = level
            .into_iter()
            .map(|(id, lvl)| {
                let cands = &candidate_lists[id];
                (id.to_string(), cands[lvl.min(cands.len() - 1)].clone())
            })
            .collect();

        let packages = std::mem::take(&mut self.packages);
        for (old_id, mut entry) in packages {
            for id in entry.prefixes.values_mut() {
                *id = renames[id.as_str()].clone();
            }
            self.packages.insert(renames[&old_id].clone(), entry);
        }
        for id in self.prefixes.values_mut() {
            *id = renames[id.as_str()].clone();
        }
    }
}

/// Candidate ids for a package, most preferred first. The original id is
/// the final fallback and is always unique.
fn id_candidates(old_id: &str, entry: &PackageEntry) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(url) = &entry.url {
        let segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
        if let Some((last, rest)) = segments.split_last() {
            candidates.push((*last).to_string());
            if let Some(version) = &entry.version {
                let mut name = format!("{last}-{version}");
                candidates.push(name.clone());
                for segment in rest.iter().rev() {
                    name = format!("{segment}-{name}");
                    candidates.push(name.clone());
                }
            }
        }
    } else if let Some(path) = &entry.path {
        if let Some(base) = Path::new(path).file_name() {
            candidates.push(base.to_string_lossy().into_owned());
        }
    }
    candidates.push(old_id.to_string());
    candidates
}

/// Build a lock file for a solved spec.
///
/// Every prefix of the project spec (and, transitively, of each selected
/// package's own spec, read from the cache) is resolved to a package id.
/// Cycles are broken by memoising (url, version) and canonical local
/// paths. The returned lock already has minimised ids.
pub fn build_lock_file(
    spec: &Spec,
    solution: &Solution,
    registries: &Registries,
    cache: &Cache,
    project_root: &Path,
    lock_path: &Path,
    ui: &dyn Ui,
) -> Result<LockFile> {
    let root = fs::canonicalize(project_root).map_err(|e| Error::io(project_root, e))?;
    let mut builder = Builder {
        solution,
        registries,
        cache,
        project_root: &root,
        ui,
        packages: BTreeMap::new(),
        remote_ids: HashMap::new(),
        local_ids: HashMap::new(),
        sdk_min: None,
    };

    builder.collect_sdk(spec)?;
    let prefixes = builder.process_spec_deps(spec, Some(&root))?;

    let mut lock = LockFile {
        sdk: builder.sdk_min.as_ref().map(|v| format!("^{v}")),
        prefixes,
        packages: builder.packages,
        path: lock_path.to_path_buf(),
    };
    lock.optimize_pkg_ids();
    Ok(lock)
}

struct Builder<'a> {
    solution: &'a Solution,
    registries: &'a Registries,
    cache: &'a Cache,
    project_root: &'a Path,
    ui: &'a dyn Ui,
    packages: BTreeMap<String, PackageEntry>,
    /// (url, version) → package id, breaks cycles in the remote graph.
    remote_ids: HashMap<(String, String), String>,
    /// Canonical path → package id, breaks cycles in the local graph.
    local_ids: HashMap<PathBuf, String>,
    sdk_min: Option<Version>,
}

impl Builder<'_> {
    /// Resolve the prefixes of one spec. `local_base` is the directory
    /// against which `path:` deps resolve; `None` for cached packages,
    /// which must not have local deps.
    fn process_spec_deps(
        &mut self,
        spec: &Spec,
        local_base: Option<&Path>,
    ) -> Result<BTreeMap<String, String>> {
        let mut prefixes = BTreeMap::new();
        for (prefix, dep) in &spec.deps {
            let id = if let Some(path) = &dep.path {
                let Some(base) = local_base else {
                    return Err(self.ui.report_error(&format!(
                        "Cached package spec '{}' has a local path dependency '{}'",
                        spec.path.display(),
                        prefix
                    )));
                };
                self.ensure_local(&base.join(path))?
            } else if let Some(url) = &dep.url {
                let constraint = match &dep.version {
                    None => Constraint::any(),
                    Some(v) => Constraint::parse(v)?,
                };
                let Some(version) = self.solution.version_for(url, &constraint) else {
                    return Err(Error::Internal(format!(
                        "package solution is missing '{url}' satisfying '{constraint}'"
                    )));
                };
                self.ensure_remote(url, version)?
            } else {
                continue;
            };
            prefixes.insert(prefix.clone(), id);
        }
        Ok(prefixes)
    }

    fn ensure_remote(&mut self, url: &str, version: &Version) -> Result<String> {
        let key = (url.to_string(), version.to_string());
        if let Some(id) = self.remote_ids.get(&key) {
            return Ok(id.clone());
        }
        let id = format!("{url}-{version}");
        self.remote_ids.insert(key, id.clone());
        self.packages.insert(
            id.clone(),
            PackageEntry {
                url: Some(url.to_string()),
                version: Some(version.to_string()),
                hash: self
                    .registries
                    .hash_for(url, &version.to_string())
                    .filter(|h| !h.is_empty()),
                path: None,
                prefixes: BTreeMap::new(),
            },
        );

        let spec_path = self
            .cache
            .spec_path_for(self.project_root, url, &version.to_string())?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "package '{url}@{version}' missing from cache after download"
                ))
            })?;
        let pkg_spec = Spec::parse_file(&spec_path, self.ui)?;
        self.collect_sdk(&pkg_spec)?;
        let prefixes = self.process_spec_deps(&pkg_spec, None)?;
        self.packages
            .get_mut(&id)
            .expect("entry inserted above")
            .prefixes = prefixes;
        Ok(id)
    }

    fn ensure_local(&mut self, dir: &Path) -> Result<String> {
        let canonical = fs::canonicalize(dir).map_err(|e| Error::io(dir, e))?;
        if let Some(id) = self.local_ids.get(&canonical) {
            return Ok(id.clone());
        }
        // Stored relative to the project root when the package lives
        // inside it.
        let stored_path = canonical
            .strip_prefix(self.project_root)
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|_| canonical.display().to_string());
        let id = stored_path.clone();
        self.local_ids.insert(canonical.clone(), id.clone());
        self.packages.insert(
            id.clone(),
            PackageEntry {
                url: None,
                version: None,
                hash: None,
                path: Some(stored_path),
                prefixes: BTreeMap::new(),
            },
        );

        let spec_path = canonical.join(crate::constants::SPEC_FILE);
        let pkg_spec = if spec_path.is_file() {
            Spec::parse_file(&spec_path, self.ui)?
        } else {
            Spec::new(spec_path)
        };
        self.collect_sdk(&pkg_spec)?;
        let prefixes = self.process_spec_deps(&pkg_spec, Some(&canonical))?;
        self.packages
            .get_mut(&id)
            .expect("entry inserted above")
            .prefixes = prefixes;
        Ok(id)
    }

    /// Track the highest minimal SDK version any visited spec demands.
    fn collect_sdk(&mut self, spec: &Spec) -> Result<()> {
        let Some(sdk) = spec.environment.as_ref().and_then(|env| env.sdk.as_deref()) else {
            return Ok(());
        };
        let Some(rest) = sdk.strip_prefix('^') else {
            return Err(self.ui.report_error(&format!(
                "Unexpected sdk constraint '{}' in '{}': must start with '^'",
                sdk,
                spec.path.display()
            )));
        };
        let min = Version::parse(rest)?;
        match &self.sdk_min {
            Some(current) if *current >= min => {}
            _ => self.sdk_min = Some(min),
        }
        Ok(())
    }
}
