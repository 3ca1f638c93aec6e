//! Suggested start dates propagated through predecessor commitments.
//!
//! Works on real calendar dates rather than CPM day offsets: each incoming
//! edge is resolved against the predecessor's committed dates (actual when
//! set, else planned, else recursively suggested), and the latest resulting
//! bound wins.

use chrono::{Duration, NaiveDate};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::models::{EngineConfig, TaskId, TaskSnapshot, TaskSource};

/// Earliest feasible start date for `task_id` given its predecessors.
///
/// Tasks with no resolvable predecessor bound fall back to their own planned
/// start; a task nothing constrains yields no suggestion. Cancelled
/// predecessors impose nothing.
pub fn suggested_start_date<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    config: &EngineConfig,
    task_id: TaskId,
) -> Option<NaiveDate> {
    let mut memo: FxHashMap<TaskId, Option<NaiveDate>> = FxHashMap::default();
    let suggestion = resolve_start(graph, source, config, task_id, &mut memo);
    debug!(
        "suggest start: project {}, task {} -> {:?}",
        graph.project_id(),
        task_id,
        suggestion
    );
    suggestion
}

/// Max per-kind bound over the incoming edges, else the task's own planned
/// start. Memoized per top-level call so diamond fan-in resolves each
/// predecessor once; the pre-inserted `None` also stops the recursion should
/// the stored graph ever contain a cycle.
fn resolve_start<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    config: &EngineConfig,
    task_id: TaskId,
    memo: &mut FxHashMap<TaskId, Option<NaiveDate>>,
) -> Option<NaiveDate> {
    if let Some(resolved) = memo.get(&task_id) {
        return *resolved;
    }
    memo.insert(task_id, None);

    let task = source.task(task_id)?;

    let mut suggested: Option<NaiveDate> = None;
    for edge in graph.incoming(task_id) {
        let Some(predecessor) = source.task(edge.predecessor_id) else {
            continue;
        };
        if predecessor.status.is_cancelled() {
            continue;
        }
        let anchor = if edge.kind.anchors_on_finish() {
            predecessor_end(graph, source, config, &predecessor, memo)
        } else {
            predecessor_start(graph, source, config, &predecessor, memo)
        };
        let Some(anchor) = anchor else {
            continue;
        };
        let required = anchor + Duration::days(edge.lag_days);
        let bound = if edge.kind.binds_start() {
            required
        } else {
            // The edge constrains the finish; pull the bound back to a start.
            required - span_to_end(task.duration(config))
        };
        if suggested.map_or(true, |current| bound > current) {
            suggested = Some(bound);
        }
    }

    let resolved = suggested.or(task.planned_start);
    memo.insert(task_id, resolved);
    resolved
}

fn predecessor_start<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    config: &EngineConfig,
    predecessor: &TaskSnapshot,
    memo: &mut FxHashMap<TaskId, Option<NaiveDate>>,
) -> Option<NaiveDate> {
    predecessor
        .committed_start()
        .or_else(|| resolve_start(graph, source, config, predecessor.id, memo))
}

fn predecessor_end<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    config: &EngineConfig,
    predecessor: &TaskSnapshot,
    memo: &mut FxHashMap<TaskId, Option<NaiveDate>>,
) -> Option<NaiveDate> {
    predecessor.committed_end().or_else(|| {
        predecessor_start(graph, source, config, predecessor, memo)
            .map(|start| start + span_to_end(predecessor.duration(config)))
    })
}

/// Inclusive span from a task's start date to its end date: a one-day task
/// ends the day it starts.
fn span_to_end(duration: i64) -> Duration {
    Duration::days((duration - 1).max(0))
}
