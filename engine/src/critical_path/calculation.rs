//! Critical path calculation using forward and backward passes.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::models::{EdgeId, EngineConfig, TaskId, TaskSnapshot};

use super::types::{CriticalPathDetail, TaskSchedule, TaskTiming};

/// Error types for critical path calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriticalPathError {
    /// The stored graph no longer admits a topological order. Admission
    /// checks keep graphs acyclic, so hitting this means corrupted state.
    GraphIntegrity { unsorted_tasks: Vec<TaskId> },
}

impl std::fmt::Display for CriticalPathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CriticalPathError::GraphIntegrity { unsorted_tasks } => {
                write!(
                    f,
                    "dependency graph contains a cycle involving {} task(s)",
                    unsorted_tasks.len()
                )
            }
        }
    }
}

impl std::error::Error for CriticalPathError {}

/// Compute the full CPM schedule for one project.
///
/// `tasks` is every task of the project, with or without edges; edges whose
/// endpoints are missing from `tasks` are ignored. The forward pass honors
/// each edge's kind and lag on the computed early times, the backward pass
/// mirrors them against the project end, and slack is the gap between the
/// two. Zero-slack tasks form the critical path.
pub fn calculate_critical_path(
    tasks: &[TaskSnapshot],
    graph: &DependencyGraph,
    config: &EngineConfig,
) -> Result<CriticalPathDetail, CriticalPathError> {
    debug!(
        "critical path: project {}, {} tasks, {} edges",
        graph.project_id(),
        tasks.len(),
        graph.len()
    );

    if tasks.is_empty() {
        return Ok(CriticalPathDetail::default());
    }

    let mut durations: FxHashMap<TaskId, i64> =
        FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default());
    for task in tasks {
        durations.insert(task.id, task.duration(config));
    }

    let topo_order = topological_sort(&durations, graph)?;

    // Forward pass: earliest start is the max kind-adjusted bound over
    // incoming edges, never before day 0.
    let mut timings: FxHashMap<TaskId, TaskTiming> =
        FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default());
    for &task_id in &topo_order {
        let duration = durations[&task_id];
        let mut earliest_start = 0;
        for edge in graph.incoming(task_id) {
            let Some(pred_timing) = timings.get(&edge.predecessor_id) else {
                continue;
            };
            let bound = edge.kind.early_start_bound(
                pred_timing.earliest_start,
                pred_timing.earliest_finish,
                edge.lag_days,
                duration,
            );
            if bound > earliest_start {
                earliest_start = bound;
            }
        }
        timings.insert(
            task_id,
            TaskTiming {
                earliest_start,
                earliest_finish: earliest_start + duration,
                latest_start: 0,  // Filled in by the backward pass
                latest_finish: 0, // Filled in by the backward pass
                slack: 0,
            },
        );
    }

    // Project makespan = max earliest finish.
    let mut duration_days = 0;
    for timing in timings.values() {
        if timing.earliest_finish > duration_days {
            duration_days = timing.earliest_finish;
        }
    }

    // Backward pass in reverse topological order: latest finish starts at
    // the project end (no task may finish later) and each kind-adjusted
    // bound over outgoing edges can only pull it earlier.
    for &task_id in topo_order.iter().rev() {
        let duration = durations[&task_id];
        let mut latest_finish = duration_days;
        for edge in graph.outgoing(task_id) {
            let Some(succ_timing) = timings.get(&edge.successor_id) else {
                continue;
            };
            let bound = edge.kind.late_finish_bound(
                succ_timing.latest_start,
                succ_timing.latest_finish,
                edge.lag_days,
                duration,
            );
            if bound < latest_finish {
                latest_finish = bound;
            }
        }
        if let Some(timing) = timings.get_mut(&task_id) {
            timing.latest_finish = latest_finish;
            timing.latest_start = latest_finish - duration;
            timing.slack = timing.latest_start - timing.earliest_start;
        }
    }

    // A critical edge joins two zero-slack tasks and actually determines the
    // successor's earliest start.
    let mut critical_edge_ids: Vec<EdgeId> = Vec::new();
    for edge in graph.edges() {
        let (Some(pred_timing), Some(succ_timing)) = (
            timings.get(&edge.predecessor_id),
            timings.get(&edge.successor_id),
        ) else {
            continue;
        };
        if !pred_timing.is_critical() || !succ_timing.is_critical() {
            continue;
        }
        let bound = edge.kind.early_start_bound(
            pred_timing.earliest_start,
            pred_timing.earliest_finish,
            edge.lag_days,
            durations[&edge.successor_id],
        );
        if bound == succ_timing.earliest_start {
            critical_edge_ids.push(edge.id);
        }
    }
    critical_edge_ids.sort_unstable();

    let mut rows: Vec<TaskSchedule> = timings
        .iter()
        .map(|(task_id, timing)| TaskSchedule {
            task_id: *task_id,
            duration_days: durations[task_id],
            timing: *timing,
            critical: timing.is_critical(),
        })
        .collect();
    rows.sort_by_key(|row| (row.timing.earliest_start, row.task_id));

    let critical_task_ids: Vec<TaskId> = rows
        .iter()
        .filter(|row| row.critical)
        .map(|row| row.task_id)
        .collect();

    let critical_chains =
        group_critical_chains(&critical_task_ids, &critical_edge_ids, graph, &timings);

    // Calendar span of the project as currently committed.
    let mut project_start: Option<NaiveDate> = None;
    let mut project_end: Option<NaiveDate> = None;
    for task in tasks {
        if let Some(start) = task.committed_start() {
            if project_start.map_or(true, |current| start < current) {
                project_start = Some(start);
            }
        }
        if let Some(end) = task.committed_end() {
            if project_end.map_or(true, |current| end > current) {
                project_end = Some(end);
            }
        }
    }

    debug!(
        "critical path: {} day makespan, {} critical of {} tasks",
        duration_days,
        critical_task_ids.len(),
        rows.len()
    );

    Ok(CriticalPathDetail {
        tasks: rows,
        critical_task_ids,
        critical_chains,
        critical_edge_ids,
        duration_days,
        project_start,
        project_end,
    })
}

/// Kahn's algorithm over the project's tasks. Edges touching tasks outside
/// `durations` are ignored.
fn topological_sort(
    durations: &FxHashMap<TaskId, i64>,
    graph: &DependencyGraph,
) -> Result<Vec<TaskId>, CriticalPathError> {
    let mut in_degree: FxHashMap<TaskId, usize> = durations.keys().map(|&id| (id, 0)).collect();

    for edge in graph.edges() {
        if !durations.contains_key(&edge.predecessor_id) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(&edge.successor_id) {
            *degree += 1;
        }
    }

    // Seed with independent tasks, lowest ID first for deterministic output.
    let mut roots: Vec<TaskId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    roots.sort_unstable();
    let mut queue: VecDeque<TaskId> = roots.into();

    let mut result: Vec<TaskId> = Vec::with_capacity(in_degree.len());
    while let Some(task_id) = queue.pop_front() {
        result.push(task_id);
        for edge in graph.outgoing(task_id) {
            if let Some(degree) = in_degree.get_mut(&edge.successor_id) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(edge.successor_id);
                }
            }
        }
    }

    if result.len() != in_degree.len() {
        let mut unsorted_tasks: Vec<TaskId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree > 0)
            .map(|(&id, _)| id)
            .collect();
        unsorted_tasks.sort_unstable();
        return Err(CriticalPathError::GraphIntegrity { unsorted_tasks });
    }

    Ok(result)
}

/// Group the zero-slack tasks into connected chains, following the binding
/// edges in both directions. Isolated critical tasks form single-task chains.
fn group_critical_chains(
    critical_task_ids: &[TaskId],
    critical_edge_ids: &[EdgeId],
    graph: &DependencyGraph,
    timings: &FxHashMap<TaskId, TaskTiming>,
) -> Vec<Vec<TaskId>> {
    let mut adjacency: FxHashMap<TaskId, Vec<TaskId>> = FxHashMap::default();
    for edge_id in critical_edge_ids {
        let Some(edge) = graph.edge(*edge_id) else {
            continue;
        };
        adjacency
            .entry(edge.predecessor_id)
            .or_default()
            .push(edge.successor_id);
        adjacency
            .entry(edge.successor_id)
            .or_default()
            .push(edge.predecessor_id);
    }

    let mut chains: Vec<Vec<TaskId>> = Vec::new();
    let mut visited: FxHashSet<TaskId> = FxHashSet::default();
    for &start in critical_task_ids {
        if visited.contains(&start) {
            continue;
        }
        let mut chain: Vec<TaskId> = Vec::new();
        let mut queue: VecDeque<TaskId> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(task_id) = queue.pop_front() {
            chain.push(task_id);
            if let Some(neighbors) = adjacency.get(&task_id) {
                for &neighbor in neighbors {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        chain.sort_by_key(|task_id| (timings[task_id].earliest_start, *task_id));
        chains.push(chain);
    }
    chains
}
