//! Version constraints.
//!
//! A constraint is a conjunction of comparison atoms. The textual forms:
//!
//! | Input | Meaning |
//! |-------|---------|
//! | `>=1.0.0,<2.0.0` | comma-separated atoms, all must hold |
//! | `^1.2.3` | `>=1.2.3,<2.0.0` |
//! | `1.2.3` | exactly `1.2.3` |
//!
//! [`Constraint::parse_install`] additionally accepts the abbreviations
//! used on the `install` command line: `1` means `>=1,<2.0.0` and `1.5`
//! means `>=1.5,<1.6.0`, while a full `1.5.3` stays exact.

use std::fmt;

use crate::error::{Error, Result};
use crate::version::Version;

/// Comparison operator of a single atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
        }
    }
}

/// One comparison against a version.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    op: Op,
    version: Version,
}

impl Atom {
    fn check(&self, candidate: &Version) -> bool {
        match self.op {
            Op::Eq => candidate == &self.version,
            Op::Gt => candidate > &self.version,
            Op::Ge => candidate >= &self.version,
            Op::Lt => candidate < &self.version,
            Op::Le => candidate <= &self.version,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// An ordered conjunction of atoms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraint {
    atoms: Vec<Atom>,
}

impl Constraint {
    /// A constraint satisfied by every version.
    pub fn any() -> Constraint {
        Constraint { atoms: Vec::new() }
    }

    /// A constraint satisfied only by `version`.
    pub fn exact(version: Version) -> Constraint {
        Constraint {
            atoms: vec![Atom {
                op: Op::Eq,
                version,
            }],
        }
    }

    /// Parse comma-separated atoms, including the `^` shorthand. `*`
    /// parses as the constraint that accepts everything.
    pub fn parse(input: &str) -> Result<Constraint> {
        let s = input.trim();
        if s.is_empty() {
            return Err(invalid(input, "empty constraint"));
        }
        if s == "*" {
            return Ok(Constraint::any());
        }
        let mut atoms = Vec::new();
        for part in s.split(',') {
            parse_part(part.trim(), input, &mut atoms)?;
        }
        Ok(Constraint { atoms })
    }

    /// Parse a constraint as written on an install command line.
    ///
    /// Everything [`Constraint::parse`] accepts is accepted; in addition a
    /// bare version with fewer than three segments expands to a range:
    /// `X` becomes `>=X,<(X+1).0.0` and `X.Y` becomes `>=X.Y,<X.(Y+1).0`.
    pub fn parse_install(input: &str) -> Result<Constraint> {
        let s = input.trim();
        if s.contains(',') || s.starts_with(['^', '>', '<', '=']) {
            return Self::parse(input);
        }
        let version = Version::parse(s)
            .map_err(|e| invalid(input, &e.to_string()))?;
        if version.is_pre_release() || version.segments().len() >= 3 {
            return Ok(Constraint::exact(version));
        }
        let upper = bump_last_segment(&version);
        Ok(Constraint {
            atoms: vec![
                Atom {
                    op: Op::Ge,
                    version,
                },
                Atom {
                    op: Op::Lt,
                    version: upper,
                },
            ],
        })
    }

    /// Whether `version` satisfies every atom.
    pub fn check(&self, version: &Version) -> bool {
        self.atoms.iter().all(|atom| atom.check(version))
    }

    pub fn is_any(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.atoms.is_empty() {
            return write!(f, "*");
        }
        let mut first = true;
        for atom in &self.atoms {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{atom}")?;
            first = false;
        }
        Ok(())
    }
}

fn invalid(input: &str, reason: &str) -> Error {
    Error::InvalidConstraint {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_part(part: &str, original: &str, atoms: &mut Vec<Atom>) -> Result<()> {
    if part.is_empty() {
        return Err(invalid(original, "empty atom"));
    }

    if let Some(rest) = part.strip_prefix('^') {
        let version = Version::parse(rest.trim())
            .map_err(|e| invalid(original, &e.to_string()))?;
        // `^1` means `>=1.0.0,<2.0.0`: the lower bound reads naturally when
        // padded out to three segments.
        let lower = version.padded(3);
        let upper = Version::new(vec![version.major() + 1, 0, 0]);
        atoms.push(Atom {
            op: Op::Ge,
            version: lower,
        });
        atoms.push(Atom {
            op: Op::Lt,
            version: upper,
        });
        return Ok(());
    }

    // Two-character operators must be tried before their one-character
    // prefixes.
    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ] {
        if let Some(rest) = part.strip_prefix(prefix) {
            let version = Version::parse(rest.trim())
                .map_err(|e| invalid(original, &e.to_string()))?;
            atoms.push(Atom { op, version });
            return Ok(());
        }
    }

    // A bare version is an exact match.
    let version = Version::parse(part).map_err(|e| invalid(original, &e.to_string()))?;
    atoms.push(Atom {
        op: Op::Eq,
        version,
    });
    Ok(())
}

/// `1` -> `2.0.0`, `1.5` -> `1.6.0`: increment the last written segment
/// and pad to three segments.
fn bump_last_segment(version: &Version) -> Version {
    let mut segments = version.segments().to_vec();
    *segments.last_mut().expect("versions have segments") += 1;
    while segments.len() < 3 {
        segments.push(0);
    }
    Version::new(segments)
}
