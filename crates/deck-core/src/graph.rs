//! The dependency graph over instances.
//!
//! Edges are stored by id reference only, so there is never an owned cycle;
//! acyclicity is enforced at insert time and a rejected edge is never
//! persisted.

use std::collections::HashMap;

use deck_state::Instance;

use crate::error::{Error, Result};
use crate::manager::Manager;

impl Manager {
    /// Record that `id` depends on `depends_on`. Self-edges, duplicate
    /// edges, and edges that would introduce a cycle are rejected before
    /// anything is written.
    pub fn add_dependency(&self, id: &str, depends_on: &str) -> Result<()> {
        if id == depends_on {
            return Err(Error::PreconditionFailed(
                "an instance cannot depend on itself".into(),
            ));
        }

        let mut root = self.store().load()?;
        if root.instance(depends_on).is_none() {
            return Err(Error::NotFound(depends_on.to_string()));
        }
        let instance = root
            .instance_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if instance.depends_on.iter().any(|d| d == depends_on) {
            return Err(Error::AlreadyExists(format!(
                "{id} already depends on {depends_on}"
            )));
        }

        instance.depends_on.push(depends_on.to_string());
        if has_cycle(&root.instances) {
            return Err(Error::PreconditionFailed(format!(
                "dependency {id} -> {depends_on} would create a cycle"
            )));
        }

        self.store().save(&root)?;
        Ok(())
    }

    /// Drop the edge `id -> depends_on`; absent edges are a no-op.
    pub fn remove_dependency(&self, id: &str, depends_on: &str) -> Result<()> {
        let depends_on = depends_on.to_string();
        self.store().update_instance(id, move |inst| {
            inst.depends_on.retain(|d| d != &depends_on);
        })?;
        Ok(())
    }

    /// Prerequisite ids of `id` whose status is not yet merged or done.
    /// A non-empty result blocks the publish verb. Edges pointing at
    /// deleted instances are ignored.
    pub fn check_dependencies_merged(&self, id: &str) -> Result<Vec<String>> {
        let root = self.store().load()?;
        let instance = root
            .instance(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let by_id: HashMap<&str, &Instance> =
            root.instances.iter().map(|i| (i.id.as_str(), i)).collect();

        Ok(instance
            .depends_on
            .iter()
            .filter(|dep| {
                by_id
                    .get(dep.as_str())
                    .map(|d| !d.status.is_complete())
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

/// Detect a cycle in `depends_on` edges with three-colour depth-first
/// marking: unvisited, on the current stack, finalised. Reaching an
/// on-stack vertex again means a cycle. Edges to unknown ids are skipped.
pub fn has_cycle(instances: &[Instance]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    let deps: HashMap<&str, &[String]> = instances
        .iter()
        .map(|i| (i.id.as_str(), i.depends_on.as_slice()))
        .collect();
    let mut colour: HashMap<&str, Colour> =
        instances.iter().map(|i| (i.id.as_str(), Colour::White)).collect();

    fn visit<'a>(
        id: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        colour: &mut HashMap<&'a str, Colour>,
    ) -> bool {
        colour.insert(id, Colour::Grey);
        if let Some(edges) = deps.get(id) {
            for dep in edges.iter() {
                match colour.get(dep.as_str()) {
                    Some(Colour::Grey) => return true,
                    Some(Colour::White) => {
                        if visit(dep.as_str(), deps, colour) {
                            return true;
                        }
                    }
                    _ => {}
                }
            }
        }
        colour.insert(id, Colour::Black);
        false
    }

    let ids: Vec<&str> = instances.iter().map(|i| i.id.as_str()).collect();
    for id in ids {
        if colour[id] == Colour::White && visit(id, &deps, &mut colour) {
            return true;
        }
    }
    false
}

/// Topological order over the instances (dependencies first) via Kahn's
/// algorithm, deterministic by store order. Read-only, for presentation.
pub fn topological_sort(instances: &[Instance]) -> Result<Vec<Instance>> {
    if has_cycle(instances) {
        return Err(Error::PreconditionFailed(
            "dependency graph contains a cycle".into(),
        ));
    }

    let known: HashMap<&str, usize> = instances
        .iter()
        .enumerate()
        .map(|(idx, i)| (i.id.as_str(), idx))
        .collect();

    let mut in_degree = vec![0usize; instances.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); instances.len()];
    for (idx, inst) in instances.iter().enumerate() {
        for dep in &inst.depends_on {
            if let Some(&dep_idx) = known.get(dep.as_str()) {
                in_degree[idx] += 1;
                dependents[dep_idx].push(idx);
            }
        }
    }

    let mut queue: std::collections::VecDeque<usize> = (0..instances.len())
        .filter(|&idx| in_degree[idx] == 0)
        .collect();

    let mut sorted = Vec::with_capacity(instances.len());
    while let Some(idx) = queue.pop_front() {
        sorted.push(instances[idx].clone());
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    Ok(sorted)
}
