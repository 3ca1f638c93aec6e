//! Task dependency graph and critical path engine.
//!
//! Maintains one dependency graph per project, admits edges only after
//! cycle and validation checks, and computes CPM schedules, schedule
//! conflicts, readiness, and suggested start dates on demand from task
//! data supplied through a [`TaskSource`].

pub mod conflicts;
pub mod critical_path;
pub mod engine;
pub mod graph;
pub mod models;
pub mod propagation;
pub mod readiness;

pub use conflicts::{ConflictReport, ViolationKind};
pub use critical_path::{
    calculate_critical_path, CriticalPathDetail, CriticalPathError, TaskSchedule, TaskTiming,
};
pub use engine::{DependencyDetail, DependencyEngine, EngineError};
pub use graph::{DependencyGraph, GraphError};
pub use models::{
    Dependency, DependencyKind, DependencySpec, EdgeId, EngineConfig, InMemoryTaskSource,
    ProjectId, TaskId, TaskSnapshot, TaskSource, TaskStatus,
};
