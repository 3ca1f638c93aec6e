//! Critical path method (CPM) analysis over a project's dependency graph.
//!
//! Two passes over a topological order: the forward pass computes earliest
//! start and finish times honoring each edge's kind and lag, the backward
//! pass computes latest times against the project end, and slack is the
//! difference. Zero-slack tasks form the critical path.

mod calculation;
mod types;

pub use calculation::{calculate_critical_path, CriticalPathError};
pub use types::{CriticalPathDetail, TaskSchedule, TaskTiming};
