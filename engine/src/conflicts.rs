//! Dependency conflict detection against committed dates and statuses.
//!
//! A conflict is data, never an error: plans drift through violated states
//! while they are edited, and the reports exist to surface that, not to
//! reject it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::models::{Dependency, DependencyKind, EdgeId, TaskId, TaskSnapshot, TaskSource};

/// What a violated edge violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The successor's committed date falls before the date the edge requires.
    DateOrder,
    /// The successor's status has progressed past a point the predecessor has
    /// not reached.
    StatusOrder,
}

/// Outcome of checking one edge against the committed schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Edge identity when the check ran against a stored edge; `None` for a
    /// proposed edge that does not exist yet.
    pub edge_id: Option<EdgeId>,
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub kind: DependencyKind,
    pub lag_days: i64,
    pub violated: bool,
    pub violation: Option<ViolationKind>,
    /// Earliest date the edge allows for the successor date it binds.
    pub expected_date: Option<NaiveDate>,
    /// The successor's committed date the edge binds.
    pub actual_date: Option<NaiveDate>,
    /// True when no date check applies: an endpoint lacks the committed date
    /// the edge needs, or the predecessor is cancelled.
    pub unconstrained: bool,
}

/// Check one dependency, stored or proposed, against its endpoint snapshots.
///
/// The date check compares the successor's bound date (start for FS/SS, end
/// for FF/SF) against the predecessor's anchor date (end for FS/FF, start for
/// SS/SF) shifted by the lag. Committed dates are actual when set, else
/// planned. When the dates hold, statuses are checked instead: a successor
/// that has progressed past the bound while the predecessor has not reached
/// the anchor is reported as a status-order violation. A cancelled
/// predecessor imposes nothing.
pub fn evaluate(
    kind: DependencyKind,
    lag_days: i64,
    predecessor: &TaskSnapshot,
    successor: &TaskSnapshot,
) -> ConflictReport {
    let mut report = ConflictReport {
        edge_id: None,
        predecessor_id: predecessor.id,
        successor_id: successor.id,
        kind,
        lag_days,
        violated: false,
        violation: None,
        expected_date: None,
        actual_date: None,
        unconstrained: false,
    };

    if predecessor.status.is_cancelled() {
        report.unconstrained = true;
        return report;
    }

    let anchor = if kind.anchors_on_finish() {
        predecessor.committed_end()
    } else {
        predecessor.committed_start()
    };
    let bound = if kind.binds_start() {
        successor.committed_start()
    } else {
        successor.committed_end()
    };

    match (anchor, bound) {
        (Some(anchor), Some(bound)) => {
            let expected = anchor + Duration::days(lag_days);
            report.expected_date = Some(expected);
            report.actual_date = Some(bound);
            if bound < expected {
                report.violated = true;
                report.violation = Some(ViolationKind::DateOrder);
            }
        }
        _ => report.unconstrained = true,
    }

    if !report.violated && status_order_violated(kind, predecessor, successor) {
        report.violated = true;
        report.violation = Some(ViolationKind::StatusOrder);
    }

    report
}

/// Check a stored edge with its own kind and lag.
pub fn evaluate_edge(
    edge: &Dependency,
    predecessor: &TaskSnapshot,
    successor: &TaskSnapshot,
) -> ConflictReport {
    let mut report = evaluate(edge.kind, edge.lag_days, predecessor, successor);
    report.edge_id = Some(edge.id);
    report
}

/// Reports for every edge touching `task_id`, violated or not, ordered by
/// edge ID. Edges whose endpoints cannot be resolved are skipped.
pub fn detect_for_task<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
    task_id: TaskId,
) -> Vec<ConflictReport> {
    let mut reports: Vec<ConflictReport> = graph
        .incoming(task_id)
        .chain(graph.outgoing(task_id))
        .filter_map(|edge| report_for_edge(source, edge))
        .collect();
    reports.sort_by_key(|report| report.edge_id);
    reports
}

/// Violated edges across the whole project, ordered by edge ID.
pub fn detect_for_project<S: TaskSource + ?Sized>(
    graph: &DependencyGraph,
    source: &S,
) -> Vec<ConflictReport> {
    let mut reports: Vec<ConflictReport> = graph
        .edges()
        .filter_map(|edge| report_for_edge(source, edge))
        .filter(|report| report.violated)
        .collect();
    reports.sort_by_key(|report| report.edge_id);
    debug!(
        "conflict scan: project {}, {} of {} edges violated",
        graph.project_id(),
        reports.len(),
        graph.len()
    );
    reports
}

fn report_for_edge<S: TaskSource + ?Sized>(
    source: &S,
    edge: &Dependency,
) -> Option<ConflictReport> {
    let predecessor = source.task(edge.predecessor_id)?;
    let successor = source.task(edge.successor_id)?;
    Some(evaluate_edge(edge, &predecessor, &successor))
}

/// The successor has progressed past the point the edge binds while the
/// predecessor has not reached the point the edge anchors. Start-binding
/// kinds trip once the successor starts; end-binding kinds once it completes.
fn status_order_violated(
    kind: DependencyKind,
    predecessor: &TaskSnapshot,
    successor: &TaskSnapshot,
) -> bool {
    let successor_progressed = if kind.binds_start() {
        successor.status.is_started()
    } else {
        successor.status.is_completed()
    };
    let predecessor_reached = if kind.anchors_on_finish() {
        predecessor.status.is_completed()
    } else {
        predecessor.status.is_started()
    };
    successor_progressed && !predecessor_reached
}
