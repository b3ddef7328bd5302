//! DependencyGraph: topological ordering over worker dependencies within a single
//! phase, plus the blocked-set/integration-ready-set queries CzarLoop needs
//! (spec.md §4.4).
//!
//! Cycle detection follows Kahn's algorithm, the same approach
//! `dag::builder::DagBuilder::validate_no_cycles` uses for phase dependencies,
//! generalized here from phase numbers to worker ids and specialized to report the
//! cyclic subset rather than just fail.

use crate::config::WorkerConfig;
use crate::errors::DependencyError;
use std::collections::{HashMap, HashSet};

/// A dependency graph restricted to the workers of a single phase.
pub struct DependencyGraph {
    ids: Vec<String>,
    index_of: HashMap<String, usize>,
    /// `dependencies[i]` = indices of workers that `i` depends on.
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]` = indices of workers that depend on `i`.
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build a graph from a phase's workers. Fails with `UnknownDependency` if a
    /// worker names a dependency id that isn't in the same worker set (config
    /// validation already rejects this at the whole-config level, but a phase
    /// blueprint or a hand-edited `workers/` tier could still produce a partial
    /// set, so this is checked again here).
    pub fn build(workers: &[WorkerConfig]) -> Result<Self, DependencyError> {
        let ids: Vec<String> = workers.iter().map(|w| w.id.clone()).collect();
        let index_of: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut dependencies = vec![Vec::new(); ids.len()];
        let mut dependents = vec![Vec::new(); ids.len()];
        for (i, worker) in workers.iter().enumerate() {
            for dep in &worker.dependencies {
                let Some(&j) = index_of.get(dep) else {
                    return Err(DependencyError::UnknownDependency(
                        worker.id.clone(),
                        dep.clone(),
                    ));
                };
                dependencies[i].push(j);
                dependents[j].push(i);
            }
        }

        Ok(Self {
            ids,
            index_of,
            dependencies,
            dependents,
        })
    }

    pub fn worker_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn dependencies_of<'a>(&'a self, worker_id: &str) -> Vec<&'a str> {
        match self.index_of.get(worker_id) {
            Some(&i) => self.dependencies[i]
                .iter()
                .map(|&j| self.ids[j].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Kahn's algorithm: process nodes with in-degree 0, decrementing dependents'
    /// in-degree as we go. Ties are broken alphabetically by worker id (spec.md §8
    /// property 3, §4.4 "ties broken alphabetically"), so the queue is a sorted
    /// vec rather than an arbitrary-order structure.
    ///
    /// Returns the stable topological order on success, or the set of worker ids
    /// still unprocessed (necessarily involved in a cycle) on failure.
    pub fn topological_order(&self) -> Result<Vec<String>, DependencyError> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        ready.sort_by(|&a, &b| self.ids[a].cmp(&self.ids[b]));

        let mut order = Vec::with_capacity(self.ids.len());
        let mut processed = HashSet::new();

        while !ready.is_empty() {
            ready.sort_by(|&a, &b| self.ids[a].cmp(&self.ids[b]));
            let node = ready.remove(0);
            processed.insert(node);
            order.push(self.ids[node].clone());

            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != self.ids.len() {
            let cyclic: Vec<String> = (0..self.ids.len())
                .filter(|i| !processed.contains(i))
                .map(|i| self.ids[i].clone())
                .collect();
            return Err(DependencyError::DependencyCycle(cyclic));
        }

        Ok(order)
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }
}

/// A dependency is "met" when the dependency worker's status is `working` or
/// `idle`/`complete` — `pending` and any status not seen at all (`unknown`) do not
/// satisfy it (spec.md §4.4).
pub fn dependency_met(status: Option<crate::worker::WorkerStatusKind>) -> bool {
    use crate::worker::WorkerStatusKind::*;
    matches!(status, Some(Working) | Some(Idle) | Some(Complete))
}

/// All dependencies of `worker_id` are met, per `status_of`.
pub fn all_dependencies_met(
    graph: &DependencyGraph,
    worker_id: &str,
    status_of: impl Fn(&str) -> Option<crate::worker::WorkerStatusKind>,
) -> bool {
    graph
        .dependencies_of(worker_id)
        .into_iter()
        .all(|dep| dependency_met(status_of(dep)))
}
