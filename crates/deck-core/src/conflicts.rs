//! Conflict analysis across instances.
//!
//! Two independent checks: the pairwise file-overlap scan is a heuristic
//! warning surfaced on the dashboard; the merge probe against the base
//! branch is the authoritative gate that blocks publication.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use deck_repo::GitRepo;
use deck_state::{Instance, Store};

use crate::error::Result;
use crate::manager::Manager;

/// Read-only analysis over the instance set with targeted git calls.
pub struct ConflictDetector<'a> {
    repo: &'a GitRepo,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(repo: &'a GitRepo) -> Self {
        Self { repo }
    }

    /// Pairwise file-overlap scan. For each pair of distinct-branch
    /// instances, intersect the files each branch changed relative to its
    /// base; a non-empty intersection records a conflict on both endpoints.
    /// Quadratic in instance count, which is capped by configuration.
    pub fn detect_conflicts(&self, instances: &[Instance]) -> HashMap<String, Vec<String>> {
        let mut changed: HashMap<&str, HashSet<String>> = HashMap::new();
        for inst in instances {
            match self.repo.diff_name_only(&inst.base_branch, &inst.branch) {
                Ok(files) => {
                    changed.insert(&inst.id, files.into_iter().collect());
                }
                Err(e) => {
                    warn!(target: "deck::core", id = %inst.id, error = %e, "skipping instance in conflict scan");
                }
            }
        }

        let mut conflicts: HashMap<String, Vec<String>> = HashMap::new();
        for (i, a) in instances.iter().enumerate() {
            for b in &instances[i + 1..] {
                if a.branch == b.branch {
                    continue;
                }
                let (Some(files_a), Some(files_b)) =
                    (changed.get(a.id.as_str()), changed.get(b.id.as_str()))
                else {
                    continue;
                };
                if files_a.intersection(files_b).next().is_some() {
                    conflicts.entry(a.id.clone()).or_default().push(b.id.clone());
                    conflicts.entry(b.id.clone()).or_default().push(a.id.clone());
                }
            }
        }

        conflicts
    }

    /// Run the scan and persist its results. Every instance's
    /// `conflicts_with` is rewritten, both endpoints of each conflict
    /// included, so symmetry holds at every quiescent point.
    pub fn update_instance_conflicts(
        &self,
        store: &Store,
        instances: &[Instance],
    ) -> Result<HashMap<String, Vec<String>>> {
        let conflicts = self.detect_conflicts(instances);
        for inst in instances {
            let ids = conflicts.get(&inst.id).cloned().unwrap_or_default();
            store.update_instance(&inst.id, move |i| i.conflicts_with = ids)?;
        }
        Ok(conflicts)
    }

    /// The authoritative merge gate: probe the instance's branch against
    /// its base with the merge base pinned. Returns
    /// `(has_conflicts, conflict_files)`.
    pub fn check_merge_conflicts(&self, instance: &Instance) -> Result<(bool, Vec<String>)> {
        Ok(self
            .repo
            .has_conflicts(&instance.branch, &instance.base_branch)?)
    }
}

impl Manager {
    /// Run the file-overlap scan over all instances and persist the result.
    pub fn detect_conflicts(&self) -> Result<HashMap<String, Vec<String>>> {
        let instances = self.list_instances()?;
        ConflictDetector::new(self.repo()).update_instance_conflicts(self.store(), &instances)
    }

    /// Merge probe for one instance against its base branch.
    pub fn probe_merge(&self, id: &str) -> Result<(bool, Vec<String>)> {
        let instance = self.get_instance(id)?;
        ConflictDetector::new(self.repo()).check_merge_conflicts(&instance)
    }
}
