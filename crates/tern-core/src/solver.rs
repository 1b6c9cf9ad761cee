//! Backtracking dependency solver.
//!
//! The solver works on a database mapping package URLs to their known
//! candidates (version plus dependencies), sorted highest-version first.
//! Resolution walks a FIFO working queue of dependencies, trying candidates
//! in order; accepting a candidate appends its dependencies to the queue.
//! When a dependency has no acceptable candidate the solver backtracks
//! chronologically: the previous slot resumes at its next candidate.
//!
//! Within one URL, versions coalesce per major: once a version is chosen
//! for (url, major), any later dependency that admits it must reuse it.
//! Dependencies that only admit a *different* major may pick a second
//! version, so a solution can hold several versions of one URL, one per
//! major.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::constraint::Constraint;
use crate::desc::Desc;
use crate::error::{Error, Result};
use crate::registry::Registries;
use crate::ui::Ui;
use crate::version::Version;

/// A dependency the solver must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverDep {
    url: String,
    constraint: Constraint,
}

impl SolverDep {
    pub fn new(url: impl Into<String>, constraint: Constraint) -> SolverDep {
        SolverDep {
            url: url.into(),
            constraint,
        }
    }

    /// Parse the constraint string of a description dependency.
    pub fn parse(url: impl Into<String>, constraint: &str) -> Result<SolverDep> {
        Ok(SolverDep {
            url: url.into(),
            constraint: Constraint::parse(constraint)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }
}

/// One candidate in the database.
#[derive(Debug, Clone)]
struct SolverPkg {
    version: Version,
    deps: Vec<SolverDep>,
}

/// The resolved set: for every URL the chosen versions, ascending, at most
/// one per major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    versions: BTreeMap<String, Vec<Version>>,
}

impl Solution {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn versions_for(&self, url: &str) -> &[Version] {
        self.versions.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Version])> {
        self.versions
            .iter()
            .map(|(url, versions)| (url.as_str(), versions.as_slice()))
    }

    /// The smallest chosen version of `url` that satisfies `constraint`.
    pub fn version_for(&self, url: &str, constraint: &Constraint) -> Option<&Version> {
        self.versions_for(url).iter().find(|v| constraint.check(v))
    }
}

/// Per-slot backtracking information: how to undo an accepted candidate.
#[derive(Debug)]
struct UndoFrame {
    /// Queue length before the candidate's deps were appended.
    working_len: usize,
    /// The (url, major) this acceptance inserted, if it was the first
    /// choice for that pair.
    inserted: Option<(String, u64)>,
}

#[derive(Debug, Default)]
struct State {
    /// Partial solution keyed by (url, major).
    pkgs: HashMap<(String, u64), Version>,
    /// FIFO queue of dependencies to satisfy.
    working: Vec<SolverDep>,
    /// Per accepted slot: the next candidate index to try on re-entry.
    continuations: Vec<usize>,
    /// One frame per accepted slot.
    undo: Vec<UndoFrame>,
}

impl State {
    fn into_solution(self) -> Solution {
        let mut versions: BTreeMap<String, Vec<Version>> = BTreeMap::new();
        for ((url, _major), version) in self.pkgs {
            versions.entry(url).or_default().push(version);
        }
        for list in versions.values_mut() {
            list.sort();
        }
        Solution { versions }
    }
}

/// The solver. Build one per solve from the loaded registries, optionally
/// bias it with [`Solver::set_preferred`], then call [`Solver::solve`].
pub struct Solver<'a> {
    db: HashMap<String, Vec<SolverPkg>>,
    ui: &'a dyn Ui,
    reported: HashSet<String>,
}

impl<'a> Solver<'a> {
    /// Build the candidate database from every loaded registry entry.
    pub fn new(registries: &Registries, ui: &'a dyn Ui) -> Result<Solver<'a>> {
        Self::from_descs(registries.entries(), ui)
    }

    /// Build the candidate database from raw descriptions.
    pub fn from_descs<'d>(
        descs: impl IntoIterator<Item = &'d Desc>,
        ui: &'a dyn Ui,
    ) -> Result<Solver<'a>> {
        let mut db: HashMap<String, Vec<SolverPkg>> = HashMap::new();
        for desc in descs {
            let version = Version::parse(&desc.version)?;
            let deps = desc
                .deps
                .iter()
                .map(|dep| SolverDep::parse(dep.url.clone(), &dep.version))
                .collect::<Result<Vec<_>>>()?;
            db.entry(desc.url.clone())
                .or_default()
                .push(SolverPkg { version, deps });
        }
        // Highest versions first, so the first satisfying candidate is the
        // best one.
        for candidates in db.values_mut() {
            candidates.sort_by(|a, b| b.version.cmp(&a.version));
        }
        Ok(Solver {
            db,
            ui,
            reported: HashSet::new(),
        })
    }

    /// Rotate the given (url, version) pairs to the front of their
    /// candidate lists. Iterates back to front so that earlier pairs end
    /// up first and win ties. Unknown URLs and unparsable versions are
    /// skipped.
    pub fn set_preferred(&mut self, preferred: &[(String, String)]) {
        for (url, version) in preferred.iter().rev() {
            let Ok(version) = Version::parse(version) else {
                continue;
            };
            let Some(candidates) = self.db.get_mut(url) else {
                continue;
            };
            if let Some(pos) = candidates.iter().position(|c| c.version == version) {
                let candidate = candidates.remove(pos);
                candidates.insert(0, candidate);
            }
        }
    }

    /// Resolve the given root dependencies. On failure every distinct
    /// diagnostic has been reported exactly once and the already-reported
    /// sentinel is returned.
    pub fn solve(&mut self, root_deps: Vec<SolverDep>) -> Result<Solution> {
        let mut state = State {
            working: root_deps,
            ..State::default()
        };

        let mut i: isize = 0;
        loop {
            if i >= 0 && i as usize >= state.working.len() {
                // Every queue entry is satisfied.
                return Ok(state.into_solution());
            }
            if i < 0 {
                return Err(Error::AlreadyReported);
            }
            let slot = i as usize;

            let start = if state.continuations.len() > slot {
                let saved = state.continuations[slot];
                state.continuations.truncate(slot);
                saved
            } else {
                0
            };

            let dep = state.working[slot].clone();
            match self.solve_entry(&dep, start, &mut state) {
                Some((next_index, undo)) => {
                    state.continuations.push(next_index);
                    state.undo.push(undo);
                    i += 1;
                }
                None => {
                    i -= 1;
                    if let Some(frame) = state.undo.pop() {
                        state.working.truncate(frame.working_len);
                        if let Some(key) = frame.inserted {
                            state.pkgs.remove(&key);
                        }
                    }
                }
            }
        }
    }

    /// Try candidates for `dep` starting at index `start`. On success
    /// returns the continuation index and the undo frame for the accepted
    /// candidate.
    fn solve_entry(
        &mut self,
        dep: &SolverDep,
        start: usize,
        state: &mut State,
    ) -> Option<(usize, UndoFrame)> {
        let Some(candidates) = self.db.get(dep.url()) else {
            self.report_once(format!("Package '{}' not found", dep.url()));
            return None;
        };

        // When resuming, an earlier pass already found a satisfying
        // candidate; don't re-diagnose on exhaustion.
        let mut found_satisfying = start != 0;
        let mut index = start;
        while index < candidates.len() {
            let candidate = &candidates[index];
            index += 1;
            if !dep.constraint().check(&candidate.version) {
                continue;
            }
            found_satisfying = true;

            let key = (dep.url().to_string(), candidate.version.major());
            if let Some(existing) = state.pkgs.get(&key) {
                if existing != &candidate.version {
                    // This major is pinned to a different version.
                    continue;
                }
                return Some((
                    index,
                    UndoFrame {
                        working_len: state.working.len(),
                        inserted: None,
                    },
                ));
            }

            let undo = UndoFrame {
                working_len: state.working.len(),
                inserted: Some(key.clone()),
            };
            state.pkgs.insert(key, candidate.version.clone());
            state.working.extend(candidate.deps.iter().cloned());
            return Some((index, undo));
        }

        if !found_satisfying {
            self.report_once(format!(
                "No version of '{}' satisfies '{}'",
                dep.url(),
                dep.constraint()
            ));
        }
        None
    }

    fn report_once(&mut self, message: String) {
        if self.reported.insert(message.clone()) {
            let _ = self.ui.report_error(&message);
        }
    }
}
