//! Package versions.
//!
//! A version is an ordered sequence of numeric segments with an optional
//! pre-release tag: `N(.N)*(-PRE)?`. Unlike strict semver there can be any
//! number of segments; comparison zero-pads the shorter side, so `1.0`
//! and `1.0.0` compare equal while `1.0-rc1` orders below both.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed version. Display preserves the segment count it was written
/// with; comparison treats missing trailing segments as zero.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    /// Parse `N(.N)*(-PRE)?`.
    pub fn parse(input: &str) -> Result<Version> {
        input.parse()
    }

    /// A release version from plain segments.
    pub fn new(segments: Vec<u64>) -> Version {
        assert!(!segments.is_empty(), "a version needs at least one segment");
        Version {
            segments,
            pre: None,
        }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// The first segment.
    pub fn major(&self) -> u64 {
        self.segments[0]
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre.is_some()
    }

    /// A copy padded with zero segments to at least `len` segments.
    pub(crate) fn padded(&self, len: usize) -> Version {
        let mut segments = self.segments.clone();
        while segments.len() < len {
            segments.push(0);
        }
        Version {
            segments,
            pre: self.pre.clone(),
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(input: &str) -> Result<Version> {
        let s = input.trim();
        let invalid = |reason: &str| Error::InvalidVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("empty version string"));
        }

        let (numeric, pre) = match s.split_once('-') {
            Some((numeric, pre)) => {
                if pre.is_empty() {
                    return Err(invalid("empty pre-release tag"));
                }
                (numeric, Some(pre.to_string()))
            }
            None => (s, None),
        };

        let mut segments = Vec::new();
        for part in numeric.split('.') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let n: u64 = part
                .parse()
                .map_err(|_| invalid(&format!("'{part}' is not a number")))?;
            segments.push(n);
        }

        Ok(Version { segments, pre })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        // A release outranks any pre-release of the same base.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Trailing zeros are insignificant for equality, so they must be
        // insignificant for hashing too.
        let mut end = self.segments.len();
        while end > 0 && self.segments[end - 1] == 0 {
            end -= 1;
        }
        self.segments[..end].hash(state);
        self.pre.hash(state);
    }
}
