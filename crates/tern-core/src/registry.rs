//! Package registries: sources of description files.
//!
//! A registry is a directory tree of `desc.yaml` files. The local variant
//! reads a directory as-is; the git variant keeps a clone of a remote
//! repository under the registry cache and delegates to a local registry
//! after syncing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::cache::Cache;
use crate::cancel::CancellationToken;
use crate::constraint::Constraint;
use crate::desc::Desc;
use crate::error::{Error, Result};
use crate::ui::Ui;
use crate::version::Version;

/// A source of package descriptions.
///
/// The search methods operate on the loaded entries, so they share default
/// implementations; only loading differs between variants.
pub trait Registry {
    fn name(&self) -> &str;

    /// Human-readable identity, shown when listing where a description
    /// came from.
    fn describe(&self) -> String;

    /// Load the registry into memory. With `sync`, git-backed registries
    /// clone or pull first.
    fn load(
        &mut self,
        sync: bool,
        cache: &Cache,
        cancel: &CancellationToken,
        ui: &dyn Ui,
    ) -> Result<()>;

    /// All loaded entries; empty until [`Registry::load`] succeeds.
    fn entries(&self) -> &[Desc];

    /// Exact match on the package name.
    fn search_name(&self, name: &str) -> Vec<&Desc> {
        self.entries().iter().filter(|d| d.name == name).collect()
    }

    /// Substring match on name, description, or URL.
    fn search_all(&self, needle: &str) -> Vec<&Desc> {
        self.entries()
            .iter()
            .filter(|d| {
                d.name.contains(needle)
                    || d.description
                        .as_deref()
                        .is_some_and(|description| description.contains(needle))
                    || d.url.contains(needle)
            })
            .collect()
    }

    /// Exact match on URL and version.
    fn search_url(&self, url: &str, version: &str) -> Vec<&Desc> {
        self.entries()
            .iter()
            .filter(|d| d.url == url && d.version == version)
            .collect()
    }

    /// Match a shortened URL: either the full URL, or a `/`-separated
    /// suffix of it. `example/morse` matches `github.com/example/morse`
    /// but not `github.com/badexample-morse`.
    fn search_short_url(&self, shortened: &str) -> Vec<&Desc> {
        let with_slash = format!("/{shortened}");
        self.entries()
            .iter()
            .filter(|d| d.url == shortened || d.url.ends_with(&with_slash))
            .collect()
    }
}

/// A registry that reads descriptions from a local directory.
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    name: String,
    path: PathBuf,
    entries: Vec<Desc>,
}

impl LocalRegistry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> LocalRegistry {
        LocalRegistry {
            name: name.into(),
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Registry for LocalRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        if self.name.is_empty() {
            self.path.display().to_string()
        } else {
            format!("{}: {}", self.name, self.path.display())
        }
    }

    fn load(
        &mut self,
        _sync: bool,
        _cache: &Cache,
        _cancel: &CancellationToken,
        ui: &dyn Ui,
    ) -> Result<()> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                // Hidden files and directories (including .git) are not
                // part of the registry.
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_string_lossy()
                        .starts_with('.')
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.path).to_path_buf();
                match e.into_io_error() {
                    Some(io) => Error::io(path, io),
                    None => Error::NotFound(format!(
                        "registry path '{}' not readable",
                        path.display()
                    )),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.path().extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => {}
                _ => continue,
            }
            entries.push(Desc::parse_file(entry.path(), ui)?);
        }
        self.entries = entries;
        Ok(())
    }

    fn entries(&self) -> &[Desc] {
        &self.entries
    }
}

/// A registry backed by a git repository, cloned under the registry cache.
pub struct GitRegistry {
    name: String,
    url: String,
    /// The clone, once one exists on disk.
    local: Option<LocalRegistry>,
}

impl GitRegistry {
    /// Create the registry, picking up an existing clone from the cache
    /// when there is one.
    pub fn new(name: impl Into<String>, url: impl Into<String>, cache: &Cache) -> Result<GitRegistry> {
        let name = name.into();
        let url = url.into();
        let local = cache
            .find_registry(&url)?
            .map(|path| LocalRegistry::new(name.clone(), path));
        Ok(GitRegistry { name, url, local })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Branches tried, in order, when cloning a registry.
const FALLBACK_BRANCHES: &[&str] = &["master", "main", "trunk"];

fn clone_with_branch_fallback(dir: &Path, url: &str) -> Result<()> {
    let mut last_error = None;
    for branch in FALLBACK_BRANCHES {
        match tern_git::clone(dir, &tern_git::CloneOptions::branch(url, *branch)) {
            Ok(_) => return Ok(()),
            Err(e) => {
                tracing::debug!(url, branch, error = %e, "registry clone attempt failed");
                // A failed attempt leaves an initialised repository behind;
                // clear it before trying the next branch.
                let _ = fs::remove_dir_all(dir);
                last_error = Some(e);
            }
        }
    }
    Err(Error::Vcs(last_error.expect("at least one branch attempted")))
}

impl Registry for GitRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        format!("{}: {}", self.name, self.url)
    }

    fn load(
        &mut self,
        sync: bool,
        cache: &Cache,
        cancel: &CancellationToken,
        ui: &dyn Ui,
    ) -> Result<()> {
        if sync {
            match &self.local {
                None => {
                    let path = cache.preferred_registry_path(&self.url);
                    cancel.checkpoint()?;
                    clone_with_branch_fallback(&path, &self.url)?;
                    self.local = Some(LocalRegistry::new(self.name.clone(), path));
                }
                Some(local) => {
                    cancel.checkpoint()?;
                    tern_git::pull(local.path())?;
                }
            }
        }
        match &mut self.local {
            Some(local) => local.load(sync, cache, cancel, ui),
            // Never cloned; nothing to load yet.
            None => Ok(()),
        }
    }

    fn entries(&self) -> &[Desc] {
        self.local.as_ref().map(|l| l.entries()).unwrap_or(&[])
    }
}

/// How to load a configured registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Local,
    Git,
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryKind::Local => write!(f, "local"),
            RegistryKind::Git => write!(f, "git"),
        }
    }
}

/// A registry as stored in the user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub name: String,
    pub kind: RegistryKind,
    pub path: String,
}

impl RegistryConfig {
    pub fn load(
        &self,
        sync: bool,
        cache: &Cache,
        cancel: &CancellationToken,
        ui: &dyn Ui,
    ) -> Result<Box<dyn Registry>> {
        let mut registry: Box<dyn Registry> = match self.kind {
            RegistryKind::Local => Box::new(LocalRegistry::new(&self.name, &self.path)),
            RegistryKind::Git => Box::new(GitRegistry::new(&self.name, &self.path, cache)?),
        };
        registry.load(sync, cache, cancel, ui)?;
        Ok(registry)
    }
}

/// A description together with the registry it came from.
pub struct DescMatch<'a> {
    pub desc: &'a Desc,
    pub registry: &'a dyn Registry,
}

/// The loaded registries of one invocation.
#[derive(Default)]
pub struct Registries {
    registries: Vec<Box<dyn Registry>>,
}

impl Registries {
    pub fn new(registries: Vec<Box<dyn Registry>>) -> Registries {
        Registries { registries }
    }

    /// Load every configured registry.
    pub fn from_configs(
        configs: &[RegistryConfig],
        sync: bool,
        cache: &Cache,
        cancel: &CancellationToken,
        ui: &dyn Ui,
    ) -> Result<Registries> {
        let mut registries = Vec::with_capacity(configs.len());
        for config in configs {
            registries.push(config.load(sync, cache, cancel, ui)?);
        }
        Ok(Registries { registries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Registry> {
        self.registries.iter().map(|registry| &**registry)
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    /// Every entry of every registry.
    pub fn entries(&self) -> impl Iterator<Item = &Desc> {
        self.iter().flat_map(|r| r.entries().iter())
    }

    fn search_with<'a>(
        &'a self,
        search: impl Fn(&'a dyn Registry) -> Vec<&'a Desc>,
    ) -> Vec<DescMatch<'a>> {
        let mut matches = Vec::new();
        for registry in self.iter() {
            for desc in search(registry) {
                matches.push(DescMatch { desc, registry });
            }
        }
        matches
    }

    pub fn search_name(&self, name: &str) -> Vec<DescMatch<'_>> {
        self.search_with(|r| r.search_name(name))
    }

    pub fn search_all(&self, needle: &str) -> Vec<DescMatch<'_>> {
        self.search_with(|r| r.search_all(needle))
    }

    pub fn search_url(&self, url: &str, version: &str) -> Vec<DescMatch<'_>> {
        self.search_with(|r| r.search_url(url, version))
    }

    pub fn search_short_url(&self, shortened: &str) -> Vec<DescMatch<'_>> {
        self.search_with(|r| r.search_short_url(shortened))
    }

    /// The registry-declared content hash for (url, version), if any
    /// registry knows one.
    pub fn hash_for(&self, url: &str, version: &str) -> Option<String> {
        self.entries()
            .find(|d| d.url == url && d.version == version)
            .and_then(|d| d.hash.clone())
    }
}

/// Keep only the highest version of each URL, optionally filtering by a
/// constraint first. The relative order of distinct URLs follows
/// [`Desc::id_cmp`].
pub fn without_lower_versions<'a>(
    matches: Vec<DescMatch<'a>>,
    constraint: Option<&Constraint>,
) -> Result<Vec<DescMatch<'a>>> {
    let mut filtered = Vec::with_capacity(matches.len());
    for m in matches {
        if let Some(constraint) = constraint {
            let version = Version::parse(&m.desc.version)?;
            if !constraint.check(&version) {
                continue;
            }
        }
        filtered.push(m);
    }
    filtered.sort_by(|a, b| a.desc.id_cmp(b.desc));
    // Versions are ascending within a URL; keep each URL's last entry.
    let mut result: Vec<DescMatch<'a>> = Vec::with_capacity(filtered.len());
    for m in filtered {
        if let Some(last) = result.last_mut() {
            if last.desc.url == m.desc.url {
                *last = m;
                continue;
            }
        }
        result.push(m);
    }
    Ok(result)
}
