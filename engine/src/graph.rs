//! Per-project dependency graph store.
//!
//! Edges live in adjacency maps keyed by task ID, incoming and outgoing kept
//! in sync, so predecessor and successor queries are O(1) amortized. No edge
//! is admitted without passing the self-loop, duplicate-pair, and cycle
//! checks, which keeps every stored graph a DAG.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::models::{Dependency, DependencyKind, EdgeId, ProjectId, TaskId};

/// Rejection reasons for graph mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),
    #[error("dependency from task {predecessor} to task {successor} already exists")]
    DuplicateDependency {
        predecessor: TaskId,
        successor: TaskId,
    },
    #[error("dependency from task {predecessor} to task {successor} would create a cycle")]
    CycleDetected {
        predecessor: TaskId,
        successor: TaskId,
    },
    #[error("dependency {0} not found")]
    EdgeNotFound(EdgeId),
}

/// Dependency edges of one project.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    project_id: ProjectId,
    edges: FxHashMap<EdgeId, Dependency>,
    outgoing: FxHashMap<TaskId, Vec<EdgeId>>,
    incoming: FxHashMap<TaskId, Vec<EdgeId>>,
    pairs: FxHashMap<(TaskId, TaskId), EdgeId>,
}

impl DependencyGraph {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            edges: FxHashMap::default(),
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
            pairs: FxHashMap::default(),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges, in unspecified order.
    pub fn edges(&self) -> impl Iterator<Item = &Dependency> {
        self.edges.values()
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&Dependency> {
        self.edges.get(&edge_id)
    }

    /// The edge from `predecessor` to `successor`, if one exists.
    pub fn edge_between(&self, predecessor: TaskId, successor: TaskId) -> Option<&Dependency> {
        self.pairs
            .get(&(predecessor, successor))
            .and_then(|edge_id| self.edges.get(edge_id))
    }

    pub fn contains_pair(&self, predecessor: TaskId, successor: TaskId) -> bool {
        self.pairs.contains_key(&(predecessor, successor))
    }

    /// Edges whose successor is `task_id` (its direct predecessors).
    pub fn incoming(&self, task_id: TaskId) -> impl Iterator<Item = &Dependency> {
        self.incoming
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    /// Edges whose predecessor is `task_id` (its direct successors).
    pub fn outgoing(&self, task_id: TaskId) -> impl Iterator<Item = &Dependency> {
        self.outgoing
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    /// True iff a path from `successor` back to `predecessor` already exists,
    /// i.e. adding the edge would close a directed cycle. A self-loop counts
    /// as a cycle.
    pub fn would_create_cycle(&self, predecessor: TaskId, successor: TaskId) -> bool {
        if predecessor == successor {
            return true;
        }
        let mut visited: FxHashSet<TaskId> = FxHashSet::default();
        let mut stack: Vec<TaskId> = vec![successor];
        while let Some(task_id) = stack.pop() {
            if task_id == predecessor {
                return true;
            }
            if !visited.insert(task_id) {
                continue;
            }
            for edge in self.outgoing(task_id) {
                if !visited.contains(&edge.successor_id) {
                    stack.push(edge.successor_id);
                }
            }
        }
        false
    }

    /// Insert a new edge once the admission checks pass. Returns the stored
    /// edge; on rejection nothing is written.
    pub fn add_edge(
        &mut self,
        edge_id: EdgeId,
        predecessor: TaskId,
        successor: TaskId,
        kind: DependencyKind,
        lag_days: i64,
        note: Option<String>,
    ) -> Result<Dependency, GraphError> {
        if predecessor == successor {
            return Err(GraphError::SelfDependency(predecessor));
        }
        if self.contains_pair(predecessor, successor) {
            return Err(GraphError::DuplicateDependency {
                predecessor,
                successor,
            });
        }
        if self.would_create_cycle(predecessor, successor) {
            return Err(GraphError::CycleDetected {
                predecessor,
                successor,
            });
        }

        let edge = Dependency {
            id: edge_id,
            project_id: self.project_id,
            predecessor_id: predecessor,
            successor_id: successor,
            kind,
            lag_days,
            note,
        };
        self.edges.insert(edge_id, edge.clone());
        self.outgoing.entry(predecessor).or_default().push(edge_id);
        self.incoming.entry(successor).or_default().push(edge_id);
        self.pairs.insert((predecessor, successor), edge_id);
        Ok(edge)
    }

    /// Update the kind and lag of an existing edge. Endpoints are fixed, so
    /// no cycle re-check is needed.
    pub fn update_edge(
        &mut self,
        edge_id: EdgeId,
        kind: DependencyKind,
        lag_days: i64,
    ) -> Result<Dependency, GraphError> {
        let edge = self
            .edges
            .get_mut(&edge_id)
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        edge.kind = kind;
        edge.lag_days = lag_days;
        Ok(edge.clone())
    }

    /// Remove one edge, returning it.
    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Result<Dependency, GraphError> {
        let edge = self
            .edges
            .remove(&edge_id)
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        self.unlink(&edge);
        Ok(edge)
    }

    /// Remove every edge referencing `task_id`, in either direction.
    /// Returns the removed edges.
    pub fn remove_edges_for_task(&mut self, task_id: TaskId) -> Vec<Dependency> {
        let mut edge_ids: Vec<EdgeId> = Vec::new();
        if let Some(ids) = self.outgoing.get(&task_id) {
            edge_ids.extend(ids.iter().copied());
        }
        if let Some(ids) = self.incoming.get(&task_id) {
            edge_ids.extend(ids.iter().copied());
        }

        let mut removed = Vec::with_capacity(edge_ids.len());
        for edge_id in edge_ids {
            if let Some(edge) = self.edges.remove(&edge_id) {
                self.unlink(&edge);
                removed.push(edge);
            }
        }
        removed
    }

    fn unlink(&mut self, edge: &Dependency) {
        if let Some(ids) = self.outgoing.get_mut(&edge.predecessor_id) {
            ids.retain(|edge_id| *edge_id != edge.id);
            if ids.is_empty() {
                self.outgoing.remove(&edge.predecessor_id);
            }
        }
        if let Some(ids) = self.incoming.get_mut(&edge.successor_id) {
            ids.retain(|edge_id| *edge_id != edge.id);
            if ids.is_empty() {
                self.incoming.remove(&edge.successor_id);
            }
        }
        self.pairs.remove(&(edge.predecessor_id, edge.successor_id));
    }

    /// Insert without admission checks, for exercising the failure paths
    /// that assume a corrupt graph.
    #[cfg(test)]
    pub(crate) fn insert_edge_unchecked(
        &mut self,
        edge_id: EdgeId,
        predecessor: TaskId,
        successor: TaskId,
        kind: DependencyKind,
        lag_days: i64,
    ) {
        let edge = Dependency {
            id: edge_id,
            project_id: self.project_id,
            predecessor_id: predecessor,
            successor_id: successor,
            kind,
            lag_days,
            note: None,
        };
        self.edges.insert(edge_id, edge);
        self.outgoing.entry(predecessor).or_default().push(edge_id);
        self.incoming.entry(successor).or_default().push(edge_id);
        self.pairs.insert((predecessor, successor), edge_id);
    }
}
