//! Task readiness checks against incoming dependency edges.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::graph::DependencyGraph;
use crate::models::{TaskId, TaskSource};

/// Predecessors currently preventing `task_id` from starting: a
/// finish-to-start predecessor that has not completed, or a start-to-start
/// predecessor that has not started. Sorted.
pub fn blocking_start<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
) -> Vec<TaskId> {
    blocking(graph, source, task_id, true)
}

/// Predecessors currently preventing `task_id` from completing: a
/// finish-to-finish predecessor that has not completed, or a start-to-finish
/// predecessor that has not started. Sorted.
pub fn blocking_completion<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
) -> Vec<TaskId> {
    blocking(graph, source, task_id, false)
}

pub fn can_start<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
) -> bool {
    blocking_start(graph, source, task_id).is_empty()
}

pub fn can_complete<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
) -> bool {
    blocking_completion(graph, source, task_id).is_empty()
}

/// Edges binding the successor's start gate starting; edges binding its end
/// gate completion. Either way the predecessor must have completed
/// (finish-anchored kinds) or started (start-anchored kinds). Cancelled
/// predecessors never block: they will never start or finish.
fn blocking<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
    for_start: bool,
) -> Vec<TaskId> {
    let mut blockers: Vec<TaskId> = Vec::new();
    for edge in graph.incoming(task_id) {
        if edge.kind.binds_start() != for_start {
            continue;
        }
        let Some(predecessor) = source.task(edge.predecessor_id) else {
            continue;
        };
        if predecessor.status.is_cancelled() {
            continue;
        }
        let satisfied = if edge.kind.anchors_on_finish() {
            predecessor.status.is_completed()
        } else {
            predecessor.status.is_started()
        };
        if !satisfied {
            blockers.push(predecessor.id);
        }
    }
    blockers.sort_unstable();
    blockers.dedup();
    blockers
}

/// Every task transitively upstream of `task_id`, sorted, never including
/// `task_id` itself.
pub fn all_predecessor_ids(graph: &DependencyGraph, task_id: TaskId) -> Vec<TaskId> {
    closure(graph, task_id, true)
}

/// Every task transitively downstream of `task_id`, sorted, never including
/// `task_id` itself.
pub fn all_successor_ids(graph: &DependencyGraph, task_id: TaskId) -> Vec<TaskId> {
    closure(graph, task_id, false)
}

fn closure(graph: &DependencyGraph, task_id: TaskId, upstream: bool) -> Vec<TaskId> {
    let mut visited: FxHashSet<TaskId> = FxHashSet::default();
    let mut queue: VecDeque<TaskId> = VecDeque::new();
    queue.push_back(task_id);
    while let Some(current) = queue.pop_front() {
        let neighbors: Vec<TaskId> = if upstream {
            graph
                .incoming(current)
                .map(|edge| edge.predecessor_id)
                .collect()
        } else {
            graph
                .outgoing(current)
                .map(|edge| edge.successor_id)
                .collect()
        };
        for neighbor in neighbors {
            if neighbor != task_id && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    let mut ids: Vec<TaskId> = visited.into_iter().collect();
    ids.sort_unstable();
    ids
}
