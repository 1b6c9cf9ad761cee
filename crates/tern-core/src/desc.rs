//! Package descriptions: the registry's record of one (package, version).

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DESCRIPTION_DIR, DESCRIPTION_FILE};
use crate::error::{Error, Result};
use crate::io;
use crate::path::escape_url;
use crate::ui::Ui;
use crate::version::Version;

const KNOWN_KEYS: &[&str] = &[
    "name",
    "description",
    "license",
    "url",
    "version",
    "hash",
    "environment",
    "dependencies",
];

/// Environment requirements shared by descriptions and specs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// SDK constraint, e.g. `^2.0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
}

/// One dependency of a described package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescDep {
    pub url: String,
    /// Constraint string, e.g. `^1.0.0`.
    pub version: String,
}

/// A registry entry: everything the package manager knows about one
/// version of one package without cloning it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Desc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub url: String,
    pub version: String,
    /// Content hash of the package tree, `sha256:<hex>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(
        default,
        rename = "dependencies",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub deps: Vec<DescDep>,
}

impl Desc {
    /// A minimal description; the remaining fields start empty.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        version: impl Into<String>,
    ) -> Desc {
        Desc {
            name: name.into(),
            url: url.into(),
            version: version.into(),
            ..Desc::default()
        }
    }

    /// Parse a description file. Unknown top-level keys warn through the
    /// UI but do not fail the parse.
    pub fn parse_file(path: &Path, ui: &dyn Ui) -> Result<Desc> {
        let content = io::read_to_string(path)?;
        Self::parse_str(&content, path, ui)
    }

    pub fn parse_str(content: &str, path: &Path, ui: &dyn Ui) -> Result<Desc> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::yaml(path, e.to_string()))?;
        io::warn_unknown_keys(&value, KNOWN_KEYS, &path.display().to_string(), ui);
        serde_yaml::from_value(value).map_err(|e| Error::yaml(path, e.to_string()))
    }

    /// Where this description lives inside a registry:
    /// `packages/<escaped-url>/<version>`.
    pub fn package_dir(&self) -> PathBuf {
        PathBuf::from(DESCRIPTION_DIR)
            .join(escape_url(&self.url))
            .join(&self.version)
    }

    /// Write `desc.yaml` under `root` in the canonical registry layout.
    /// Returns the path of the written file.
    pub fn write_in_dir(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(self.package_dir());
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let path = dir.join(DESCRIPTION_FILE);
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::yaml(&path, e.to_string()))?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Order by url, then by version ascending. Unparsable versions fall
    /// back to string order so sorting never fails.
    pub fn id_cmp(&self, other: &Desc) -> Ordering {
        match self.url.cmp(&other.url) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (
            Version::parse(&self.version),
            Version::parse(&other.version),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => self.version.cmp(&other.version),
        }
    }
}
