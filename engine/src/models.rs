//! Core data model: task snapshots, dependency edges, and engine configuration.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Task identifier, assigned by the surrounding task subsystem.
pub type TaskId = u64;
/// Project identifier.
pub type ProjectId = u64;
/// Dependency edge identifier, minted by the engine.
pub type EdgeId = u64;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Work on the task has begun or finished.
    pub fn is_started(self) -> bool {
        matches!(self, TaskStatus::InProgress | TaskStatus::Completed)
    }

    pub fn is_completed(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn is_cancelled(self) -> bool {
        matches!(self, TaskStatus::Cancelled)
    }
}

/// Precedence relation between two tasks.
///
/// Each kind constrains one date of the successor against one date of the
/// predecessor, shifted by the edge lag:
///
/// - `FinishToStart`: successor start >= predecessor end + lag
/// - `StartToStart`: successor start >= predecessor start + lag
/// - `FinishToFinish`: successor end >= predecessor end + lag
/// - `StartToFinish`: successor end >= predecessor start + lag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyKind {
    /// The constraint is anchored on the predecessor's finish (FS, FF) rather
    /// than its start (SS, SF).
    pub fn anchors_on_finish(self) -> bool {
        matches!(
            self,
            DependencyKind::FinishToStart | DependencyKind::FinishToFinish
        )
    }

    /// The constraint binds the successor's start (FS, SS) rather than its
    /// end (FF, SF).
    pub fn binds_start(self) -> bool {
        matches!(
            self,
            DependencyKind::FinishToStart | DependencyKind::StartToStart
        )
    }

    /// Earliest-start bound this edge imposes on the successor during the
    /// forward pass, given the predecessor's computed early times. Kinds that
    /// bind the successor's finish are converted to a start bound by
    /// subtracting the successor's duration.
    pub fn early_start_bound(
        self,
        pred_earliest_start: i64,
        pred_earliest_finish: i64,
        lag_days: i64,
        successor_duration: i64,
    ) -> i64 {
        match self {
            DependencyKind::FinishToStart => pred_earliest_finish + lag_days,
            DependencyKind::StartToStart => pred_earliest_start + lag_days,
            DependencyKind::FinishToFinish => pred_earliest_finish + lag_days - successor_duration,
            DependencyKind::StartToFinish => pred_earliest_start + lag_days - successor_duration,
        }
    }

    /// Latest-finish bound this edge imposes on the predecessor during the
    /// backward pass, given the successor's computed late times. Kinds
    /// anchored on the predecessor's start bound its latest start, so the
    /// predecessor's duration is added back to express a finish bound.
    pub fn late_finish_bound(
        self,
        succ_latest_start: i64,
        succ_latest_finish: i64,
        lag_days: i64,
        predecessor_duration: i64,
    ) -> i64 {
        match self {
            DependencyKind::FinishToStart => succ_latest_start - lag_days,
            DependencyKind::StartToStart => succ_latest_start - lag_days + predecessor_duration,
            DependencyKind::FinishToFinish => succ_latest_finish - lag_days,
            DependencyKind::StartToFinish => succ_latest_finish - lag_days + predecessor_duration,
        }
    }
}

/// A dependency edge between two tasks of the same project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: EdgeId,
    pub project_id: ProjectId,
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub kind: DependencyKind,
    /// Signed day offset applied to the constraint; negative lag overlaps.
    pub lag_days: i64,
    pub note: Option<String>,
}

/// Request to create one dependency edge. `kind` and `lag_days` fall back to
/// the engine defaults when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub kind: Option<DependencyKind>,
    pub lag_days: Option<i64>,
    pub note: Option<String>,
}

impl DependencySpec {
    pub fn new(predecessor_id: TaskId, successor_id: TaskId) -> Self {
        Self {
            predecessor_id,
            successor_id,
            kind: None,
            lag_days: None,
            note: None,
        }
    }
}

/// Read-only projection of a task as the engine sees it. The full task record
/// is owned by the surrounding task subsystem and fetched through
/// [`TaskSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
    /// Explicit working duration in days; derived from the planned span when
    /// absent.
    pub duration_days: Option<i64>,
    pub status: TaskStatus,
}

impl TaskSnapshot {
    /// Start date the schedule currently commits to: actual when set, else
    /// planned.
    pub fn committed_start(&self) -> Option<NaiveDate> {
        self.actual_start.or(self.planned_start)
    }

    /// End date the schedule currently commits to: actual when set, else
    /// planned.
    pub fn committed_end(&self) -> Option<NaiveDate> {
        self.actual_end.or(self.planned_end)
    }

    /// Working duration in whole days, never negative. An explicit duration
    /// wins; otherwise the inclusive planned span; otherwise the configured
    /// fallback.
    pub fn duration(&self, config: &EngineConfig) -> i64 {
        if let Some(days) = self.duration_days {
            return days.max(0);
        }
        match (self.planned_start, self.planned_end) {
            (Some(start), Some(end)) => ((end - start).num_days() + 1).max(0),
            _ => config.fallback_duration_days,
        }
    }
}

/// Engine-wide defaults and fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Kind applied when a creation request does not name one.
    pub default_kind: DependencyKind,
    /// Lag applied when a creation request does not name one.
    pub default_lag_days: i64,
    /// Duration assumed for tasks with neither an explicit duration nor a
    /// planned date span.
    pub fallback_duration_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_kind: DependencyKind::FinishToStart,
            default_lag_days: 0,
            fallback_duration_days: 1,
        }
    }
}

/// Task lookup capability the engine consumes. Implementations typically wrap
/// the task store of the surrounding application.
pub trait TaskSource: Send + Sync {
    /// Fetch a single task by ID.
    fn task(&self, id: TaskId) -> Option<TaskSnapshot>;
    /// Fetch every task of a project.
    fn project_tasks(&self, project_id: ProjectId) -> Vec<TaskSnapshot>;
}

/// Map-backed [`TaskSource`] for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskSource {
    tasks: FxHashMap<TaskId, TaskSnapshot>,
}

impl InMemoryTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: TaskSnapshot) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove(&mut self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.remove(&id)
    }
}

impl TaskSource for InMemoryTaskSource {
    fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.get(&id).cloned()
    }

    fn project_tasks(&self, project_id: ProjectId) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<TaskSnapshot> = self
            .tasks
            .values()
            .filter(|task| task.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.id);
        tasks
    }
}
