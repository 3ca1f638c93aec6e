//! Result types for critical path analysis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{EdgeId, TaskId};

/// Computed schedule times for one task, in whole days from project start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub earliest_start: i64,
    pub earliest_finish: i64,
    pub latest_start: i64,
    pub latest_finish: i64,
    /// `latest_start - earliest_start`; zero on the critical path.
    pub slack: i64,
}

impl TaskTiming {
    pub fn is_critical(&self) -> bool {
        self.slack == 0
    }
}

/// One row of the computed schedule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub task_id: TaskId,
    pub duration_days: i64,
    pub timing: TaskTiming,
    pub critical: bool,
}

/// Full critical path analysis of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPathDetail {
    /// Every task of the project, ordered by earliest start then task ID.
    pub tasks: Vec<TaskSchedule>,
    /// Zero-slack task IDs, same ordering.
    pub critical_task_ids: Vec<TaskId>,
    /// Zero-slack tasks grouped into connected chains for visualization,
    /// each chain ordered by earliest start then task ID.
    pub critical_chains: Vec<Vec<TaskId>>,
    /// Edges that actually bind the schedule between two critical tasks.
    pub critical_edge_ids: Vec<EdgeId>,
    /// Project makespan in days (the maximum earliest finish).
    pub duration_days: i64,
    /// Earliest committed start date across the project's tasks.
    pub project_start: Option<NaiveDate>,
    /// Latest committed end date across the project's tasks.
    pub project_end: Option<NaiveDate>,
}
