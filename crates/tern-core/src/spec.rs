//! Project and package specifications (`package.yaml`).
//!
//! The spec is the only file users edit by hand, so parsing is forgiving:
//! unknown keys warn, a dependency `version` without a `url` warns and is
//! dropped. A dependency that has neither `url` nor `path`, or a prefix
//! that is not an identifier, is an error.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::SPEC_FILE;
use crate::constraint::Constraint;
use crate::desc::Environment;
use crate::error::{Error, Result};
use crate::io;
use crate::lock::LockFile;
use crate::path::is_identifier;
use crate::solver::SolverDep;
use crate::ui::Ui;

const KNOWN_KEYS: &[&str] = &[
    "name",
    "description",
    "license",
    "environment",
    "dependencies",
];

/// One dependency entry in a spec: either a registry package (`url` plus
/// an optional constraint) or a local directory (`path`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecDep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SpecDep {
    pub fn remote(url: impl Into<String>, version: Option<String>) -> SpecDep {
        SpecDep {
            url: Some(url.into()),
            version,
            path: None,
        }
    }

    pub fn local(path: impl Into<String>) -> SpecDep {
        SpecDep {
            url: None,
            version: None,
            path: Some(path.into()),
        }
    }
}

/// A parsed `package.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(
        default,
        rename = "dependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub deps: BTreeMap<String, SpecDep>,
    /// Where this spec was read from and will be written to.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Spec {
    /// An empty spec that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Spec {
        Spec {
            path: path.into(),
            ..Spec::default()
        }
    }

    pub fn parse_file(path: &Path, ui: &dyn Ui) -> Result<Spec> {
        let content = io::read_to_string(path)?;
        Self::parse_str(&content, path, ui)
    }

    pub fn parse_str(content: &str, path: &Path, ui: &dyn Ui) -> Result<Spec> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::yaml(path, e.to_string()))?;
        // A file holding only comments parses as null; treat it as empty.
        if value.is_null() {
            return Ok(Spec::new(path));
        }
        io::warn_unknown_keys(&value, KNOWN_KEYS, &path.display().to_string(), ui);
        let mut spec: Spec =
            serde_yaml::from_value(value).map_err(|e| Error::yaml(path, e.to_string()))?;
        spec.path = path.to_path_buf();
        spec.validate(ui)?;
        Ok(spec)
    }

    fn validate(&mut self, ui: &dyn Ui) -> Result<()> {
        for (prefix, dep) in &mut self.deps {
            if !is_identifier(prefix) {
                return Err(ui.report_error(&format!(
                    "Invalid prefix '{}' in '{}'",
                    prefix,
                    self.path.display()
                )));
            }
            if dep.url.is_none() && dep.path.is_none() {
                return Err(ui.report_error(&format!(
                    "Dependency '{prefix}' has neither a 'url' nor a 'path'"
                )));
            }
            if dep.version.is_some() && dep.url.is_none() {
                ui.report_warning(&format!(
                    "Dependency '{prefix}' has a version but no url; ignoring the version"
                ));
                dep.version = None;
            }
        }
        Ok(())
    }

    /// Reconstruct a spec from a lock file, used when only the lock
    /// survived. Each locked prefix becomes a dependency accepting semver
    /// compatible versions of the locked one.
    pub fn from_lock_file(lock: &LockFile, spec_path: impl Into<PathBuf>) -> Result<Spec> {
        let mut spec = Spec::new(spec_path);
        for (prefix, pkg_id) in &lock.prefixes {
            let entry = lock.packages.get(pkg_id).ok_or_else(|| {
                Error::Internal(format!(
                    "lock file prefix '{prefix}' points to unknown package '{pkg_id}'"
                ))
            })?;
            let dep = if let Some(path) = &entry.path {
                SpecDep::local(path.clone())
            } else {
                SpecDep::remote(
                    entry.url.clone().unwrap_or_default(),
                    entry.version.as_ref().map(|v| format!("^{v}")),
                )
            };
            spec.deps.insert(prefix.clone(), dep);
        }
        Ok(spec)
    }

    /// Add or replace the dependency under `prefix`.
    pub fn add_dep(&mut self, prefix: &str, dep: SpecDep, ui: &dyn Ui) -> Result<()> {
        if !is_identifier(prefix) {
            return Err(ui.report_error(&format!("Invalid prefix '{prefix}'")));
        }
        if dep.url.is_none() && dep.path.is_none() {
            return Err(Error::Internal(format!(
                "dependency '{prefix}' needs a url or a path"
            )));
        }
        self.deps.insert(prefix.to_string(), dep);
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::yaml(&self.path, e.to_string()))
    }

    pub fn write_to_file(&self) -> Result<()> {
        io::write_atomic(&self.path, self.to_yaml()?.as_bytes())
    }

    /// Depth-first walk over the local `path:` dependency graph, starting
    /// with this spec. Cycles are broken by canonical absolute path. The
    /// callback receives a display path (relative to the project root when
    /// possible), the canonical directory, and the parsed spec.
    pub fn visit_local_deps<F>(
        &self,
        project_root: &Path,
        ui: &dyn Ui,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&str, &Path, &Spec) -> Result<()>,
    {
        let root = fs::canonicalize(project_root).map_err(|e| Error::io(project_root, e))?;
        let mut seen = HashSet::new();
        seen.insert(root.clone());
        visit(".", &root, self)?;
        visit_children(self, &root, &root, ui, &mut seen, visit)
    }

    /// Flatten the remote dependencies of this spec and of every local
    /// `path:` dependency reachable from it into one solver dep list.
    pub fn build_solver_deps(&self, project_root: &Path, ui: &dyn Ui) -> Result<Vec<SolverDep>> {
        let mut deps = Vec::new();
        self.visit_local_deps(project_root, ui, &mut |_, _, spec| {
            for (prefix, dep) in &spec.deps {
                let Some(url) = &dep.url else { continue };
                let constraint = match &dep.version {
                    None => Constraint::any(),
                    Some(v) => Constraint::parse(v).map_err(|e| {
                        ui.report_error(&format!(
                            "Invalid constraint for prefix '{prefix}': {e}"
                        ))
                    })?,
                };
                deps.push(SolverDep::new(url.clone(), constraint));
            }
            Ok(())
        })?;
        Ok(deps)
    }
}

fn visit_children<F>(
    spec: &Spec,
    base: &Path,
    project_root: &Path,
    ui: &dyn Ui,
    seen: &mut HashSet<PathBuf>,
    visit: &mut F,
) -> Result<()>
where
    F: FnMut(&str, &Path, &Spec) -> Result<()>,
{
    for (prefix, dep) in &spec.deps {
        let Some(path) = &dep.path else { continue };
        let joined = base.join(path);
        let canonical = match fs::canonicalize(&joined) {
            Ok(canonical) => canonical,
            Err(_) => {
                return Err(ui.report_error(&format!(
                    "Local dependency '{}' points to missing path '{}'",
                    prefix,
                    joined.display()
                )));
            }
        };
        if !seen.insert(canonical.clone()) {
            continue;
        }

        let spec_path = canonical.join(SPEC_FILE);
        let child = if spec_path.is_file() {
            Spec::parse_file(&spec_path, ui)?
        } else {
            // A local package without a spec has no dependencies.
            Spec::new(spec_path)
        };

        let display = canonical
            .strip_prefix(project_root)
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|_| canonical.display().to_string());

        visit(&display, &canonical, &child)?;
        visit_children(&child, &canonical, project_root, ui, seen, visit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingUi;

    fn parse(yaml: &str, ui: &RecordingUi) -> Result<Spec> {
        Spec::parse_str(yaml, Path::new("package.yaml"), ui)
    }

    #[test]
    fn parses_dependencies() {
        let ui = RecordingUi::new();
        let spec = parse(
            "name: app\ndependencies:\n  morse:\n    url: github.com/example/morse\n    version: ^1.0.6\n",
            &ui,
        )
        .unwrap();
        assert_eq!(spec.name.as_deref(), Some("app"));
        let dep = &spec.deps["morse"];
        assert_eq!(dep.url.as_deref(), Some("github.com/example/morse"));
        assert_eq!(dep.version.as_deref(), Some("^1.0.6"));
    }

    #[test]
    fn comment_only_file_is_empty_spec() {
        let ui = RecordingUi::new();
        let spec = parse("# Tern package file.\n", &ui).unwrap();
        assert!(spec.deps.is_empty());
    }

    #[test]
    fn version_without_url_warns_and_drops() {
        let ui = RecordingUi::new();
        let spec = parse(
            "dependencies:\n  lib:\n    path: ../lib\n    version: ^1.0.0\n",
            &ui,
        )
        .unwrap();
        assert_eq!(spec.deps["lib"].version, None);
        assert_eq!(ui.messages().len(), 1);
        assert!(ui.messages()[0].starts_with("Warning:"));
    }

    #[test]
    fn dep_without_url_or_path_errors() {
        let ui = RecordingUi::new();
        let err = parse("dependencies:\n  broken: {}\n", &ui).unwrap_err();
        assert!(err.is_already_reported());
        assert!(ui.messages()[0].contains("broken"));
    }

    #[test]
    fn invalid_prefix_errors() {
        let ui = RecordingUi::new();
        let err = parse(
            "dependencies:\n  1bad:\n    url: github.com/example/x\n",
            &ui,
        )
        .unwrap_err();
        assert!(err.is_already_reported());
    }

    #[test]
    fn canonical_write_order() {
        let mut spec = Spec::new("package.yaml");
        spec.name = Some("app".to_string());
        spec.license = Some("MIT".to_string());
        spec.deps.insert(
            "zlib".to_string(),
            SpecDep::remote("github.com/example/zlib", Some("^1.0.0".to_string())),
        );
        spec.deps
            .insert("alpha".to_string(), SpecDep::local("../alpha"));
        let yaml = spec.to_yaml().unwrap();
        let name_pos = yaml.find("name:").unwrap();
        let license_pos = yaml.find("license:").unwrap();
        let deps_pos = yaml.find("dependencies:").unwrap();
        assert!(name_pos < license_pos && license_pos < deps_pos);
        // BTreeMap keeps prefixes sorted.
        assert!(yaml.find("alpha:").unwrap() < yaml.find("zlib:").unwrap());
    }

    #[test]
    fn build_solver_deps_uses_any_for_missing_constraint() {
        let ui = RecordingUi::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = parse(
            "dependencies:\n  morse:\n    url: github.com/example/morse\n",
            &ui,
        )
        .unwrap();
        let deps = spec.build_solver_deps(dir.path(), &ui).unwrap();
        assert_eq!(deps.len(), 1);
        assert!(deps[0].constraint().is_any());
    }

    #[test]
    fn visit_local_deps_detects_cycles() {
        let ui = RecordingUi::new();
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(
            a.join("package.yaml"),
            "dependencies:\n  b:\n    path: ../b\n",
        )
        .unwrap();
        fs::write(
            b.join("package.yaml"),
            "dependencies:\n  a:\n    path: ../a\n",
        )
        .unwrap();

        let spec = Spec::parse_file(&a.join("package.yaml"), &ui).unwrap();
        let mut visited = Vec::new();
        spec.visit_local_deps(&a, &ui, &mut |display, _, _| {
            visited.push(display.to_string());
            Ok(())
        })
        .unwrap();
        // Root, then b, then back to a which is already visited.
        assert_eq!(visited.len(), 2);
        assert_eq!(visited[0], ".");
    }

    #[test]
    fn missing_local_dep_is_reported() {
        let ui = RecordingUi::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = parse(
            "dependencies:\n  ghost:\n    path: ./does-not-exist\n",
            &ui,
        )
        .unwrap();
        let err = spec
            .visit_local_deps(dir.path(), &ui, &mut |_, _, _| Ok(()))
            .unwrap_err();
        assert!(err.is_already_reported());
    }
}
