//! Transport-independent dependency engine over per-project graphs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::conflicts::{self, ConflictReport};
use crate::critical_path::{self, CriticalPathDetail};
use crate::graph::{DependencyGraph, GraphError};
use crate::models::{
    Dependency, DependencyKind, DependencySpec, EdgeId, EngineConfig, ProjectId, TaskId,
    TaskSnapshot, TaskSource,
};
use crate::propagation;
use crate::readiness;

/// Rejection reasons for engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("tasks {predecessor} and {successor} belong to different projects")]
    CrossProjectDependency {
        predecessor: TaskId,
        successor: TaskId,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    CriticalPath(#[from] critical_path::CriticalPathError),
}

/// One edge joined with both endpoint snapshots and its current conflict
/// report, for listing views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDetail {
    pub dependency: Dependency,
    pub predecessor: TaskSnapshot,
    pub successor: TaskSnapshot,
    pub conflict: ConflictReport,
}

/// One engine instance serves every project, holding each project's
/// dependency graph behind its own lock.
///
/// Mutations serialize per project; read queries share the project lock and
/// observe a consistent snapshot. Task data is fetched through the supplied
/// [`TaskSource`] on every operation, never cached, so the engine tracks the
/// surrounding task subsystem without invalidation hooks.
pub struct DependencyEngine<S> {
    source: S,
    config: EngineConfig,
    graphs: RwLock<FxHashMap<ProjectId, Arc<RwLock<DependencyGraph>>>>,
    next_edge_id: AtomicU64,
}

impl<S: TaskSource> DependencyEngine<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            graphs: RwLock::new(FxHashMap::default()),
            next_edge_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Create one dependency edge, applying the configured defaults for an
    /// omitted kind or lag. Rejects unknown tasks, cross-project pairs,
    /// self-loops, duplicates, and cycle-closing edges without mutating.
    pub fn create_dependency(&self, spec: DependencySpec) -> Result<Dependency, EngineError> {
        let predecessor = self.require_task(spec.predecessor_id)?;
        let successor = self.require_task(spec.successor_id)?;
        if predecessor.project_id != successor.project_id {
            return Err(EngineError::CrossProjectDependency {
                predecessor: predecessor.id,
                successor: successor.id,
            });
        }

        let kind = spec.kind.unwrap_or(self.config.default_kind);
        let lag_days = spec.lag_days.unwrap_or(self.config.default_lag_days);
        let handle = self.project_graph(predecessor.project_id);
        let mut graph = handle.write();
        let edge_id = self.next_edge_id.fetch_add(1, Ordering::Relaxed);
        let edge = graph.add_edge(
            edge_id,
            spec.predecessor_id,
            spec.successor_id,
            kind,
            lag_days,
            spec.note,
        )?;
        debug!(
            "created dependency {}: {} -> {} ({:?}, lag {})",
            edge.id, edge.predecessor_id, edge.successor_id, edge.kind, edge.lag_days
        );
        Ok(edge)
    }

    /// Create several edges atomically. Every spec is admitted against staged
    /// copies of the involved project graphs and only a fully valid batch is
    /// swapped in; on error nothing changes.
    pub fn batch_create_dependencies(
        &self,
        specs: Vec<DependencySpec>,
    ) -> Result<Vec<Dependency>, EngineError> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        // Resolve endpoints up front so lookup errors precede staging.
        let mut resolved: Vec<(DependencySpec, ProjectId)> = Vec::with_capacity(specs.len());
        for spec in specs {
            let predecessor = self.require_task(spec.predecessor_id)?;
            let successor = self.require_task(spec.successor_id)?;
            if predecessor.project_id != successor.project_id {
                return Err(EngineError::CrossProjectDependency {
                    predecessor: predecessor.id,
                    successor: successor.id,
                });
            }
            resolved.push((spec, predecessor.project_id));
        }

        // Lock the involved projects in ID order so concurrent batches
        // cannot deadlock each other.
        let mut project_ids: Vec<ProjectId> = resolved.iter().map(|(_, id)| *id).collect();
        project_ids.sort_unstable();
        project_ids.dedup();
        let handles: Vec<Arc<RwLock<DependencyGraph>>> = project_ids
            .iter()
            .map(|&project_id| self.project_graph(project_id))
            .collect();
        let mut guards: Vec<_> = handles.iter().map(|handle| handle.write()).collect();
        let slot_of: FxHashMap<ProjectId, usize> = project_ids
            .iter()
            .enumerate()
            .map(|(slot, &project_id)| (project_id, slot))
            .collect();
        let mut staged: Vec<DependencyGraph> =
            guards.iter().map(|guard| (**guard).clone()).collect();

        let mut created: Vec<Dependency> = Vec::with_capacity(resolved.len());
        for (spec, project_id) in resolved {
            let kind = spec.kind.unwrap_or(self.config.default_kind);
            let lag_days = spec.lag_days.unwrap_or(self.config.default_lag_days);
            let edge_id = self.next_edge_id.fetch_add(1, Ordering::Relaxed);
            let edge = staged[slot_of[&project_id]].add_edge(
                edge_id,
                spec.predecessor_id,
                spec.successor_id,
                kind,
                lag_days,
                spec.note,
            )?;
            created.push(edge);
        }

        for (slot, graph) in staged.into_iter().enumerate() {
            *guards[slot] = graph;
        }
        debug!("created {} dependencies in one batch", created.len());
        Ok(created)
    }

    /// Change the kind and/or lag of an existing edge; `None` keeps the
    /// current value. Endpoints are fixed, so no cycle re-check is needed.
    pub fn update_dependency(
        &self,
        edge_id: EdgeId,
        kind: Option<DependencyKind>,
        lag_days: Option<i64>,
    ) -> Result<Dependency, EngineError> {
        let handle = self
            .graph_holding_edge(edge_id)
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        let mut graph = handle.write();
        let current = graph
            .edge(edge_id)
            .cloned()
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        let edge = graph.update_edge(
            edge_id,
            kind.unwrap_or(current.kind),
            lag_days.unwrap_or(current.lag_days),
        )?;
        debug!(
            "updated dependency {}: {:?}, lag {}",
            edge.id, edge.kind, edge.lag_days
        );
        Ok(edge)
    }

    /// Remove one edge, returning it.
    pub fn delete_dependency(&self, edge_id: EdgeId) -> Result<Dependency, EngineError> {
        let handle = self
            .graph_holding_edge(edge_id)
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        let mut graph = handle.write();
        let edge = graph.remove_edge(edge_id)?;
        debug!(
            "deleted dependency {}: {} -> {}",
            edge.id, edge.predecessor_id, edge.successor_id
        );
        Ok(edge)
    }

    /// Remove every edge touching `task_id`, returning the removed edges.
    /// The task may already be gone from the task source (deletion cascade),
    /// so every loaded graph is scanned instead of resolving its project.
    pub fn delete_dependencies_for_task(&self, task_id: TaskId) -> Vec<Dependency> {
        let handles: Vec<Arc<RwLock<DependencyGraph>>> =
            self.graphs.read().values().cloned().collect();
        let mut removed: Vec<Dependency> = Vec::new();
        for handle in handles {
            removed.extend(handle.write().remove_edges_for_task(task_id));
        }
        if !removed.is_empty() {
            debug!(
                "deleted {} dependencies touching task {}",
                removed.len(),
                task_id
            );
        }
        removed
    }

    pub fn get_dependency(&self, edge_id: EdgeId) -> Result<Dependency, EngineError> {
        let handle = self
            .graph_holding_edge(edge_id)
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        let graph = handle.read();
        let edge = graph
            .edge(edge_id)
            .cloned()
            .ok_or(GraphError::EdgeNotFound(edge_id))?;
        Ok(edge)
    }

    /// Edges ending at `task_id`, ordered by edge ID.
    pub fn list_predecessors(&self, task_id: TaskId) -> Result<Vec<Dependency>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            let mut edges: Vec<Dependency> = graph.incoming(task_id).cloned().collect();
            edges.sort_by_key(|edge| edge.id);
            edges
        }))
    }

    /// Edges starting at `task_id`, ordered by edge ID.
    pub fn list_successors(&self, task_id: TaskId) -> Result<Vec<Dependency>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            let mut edges: Vec<Dependency> = graph.outgoing(task_id).cloned().collect();
            edges.sort_by_key(|edge| edge.id);
            edges
        }))
    }

    /// Every edge of the project, ordered by edge ID.
    pub fn list_for_project(&self, project_id: ProjectId) -> Vec<Dependency> {
        self.with_graph(project_id, |graph| {
            let mut edges: Vec<Dependency> = graph.edges().cloned().collect();
            edges.sort_by_key(|edge| edge.id);
            edges
        })
    }

    pub fn exists_dependency(&self, predecessor: TaskId, successor: TaskId) -> bool {
        let handles: Vec<Arc<RwLock<DependencyGraph>>> =
            self.graphs.read().values().cloned().collect();
        handles
            .iter()
            .any(|handle| handle.read().contains_pair(predecessor, successor))
    }

    /// True iff creating `predecessor -> successor` would close a cycle.
    pub fn would_create_cycle(&self, predecessor: TaskId, successor: TaskId) -> bool {
        if predecessor == successor {
            return true;
        }
        let handles: Vec<Arc<RwLock<DependencyGraph>>> =
            self.graphs.read().values().cloned().collect();
        handles
            .iter()
            .any(|handle| handle.read().would_create_cycle(predecessor, successor))
    }

    /// Zero-slack task IDs of the project, ordered by earliest start then ID.
    pub fn calculate_critical_path(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<TaskId>, EngineError> {
        Ok(self
            .calculate_critical_path_detail(project_id)?
            .critical_task_ids)
    }

    /// Full CPM schedule for the project.
    pub fn calculate_critical_path_detail(
        &self,
        project_id: ProjectId,
    ) -> Result<CriticalPathDetail, EngineError> {
        let tasks = self.source.project_tasks(project_id);
        let detail = self.with_graph(project_id, |graph| {
            critical_path::calculate_critical_path(&tasks, graph, &self.config)
        })?;
        Ok(detail)
    }

    /// Conflict-check a proposed dependency without creating it. The report
    /// carries no edge ID.
    pub fn validate_dependency(
        &self,
        spec: &DependencySpec,
    ) -> Result<ConflictReport, EngineError> {
        let predecessor = self.require_task(spec.predecessor_id)?;
        let successor = self.require_task(spec.successor_id)?;
        let kind = spec.kind.unwrap_or(self.config.default_kind);
        let lag_days = spec.lag_days.unwrap_or(self.config.default_lag_days);
        Ok(conflicts::evaluate(kind, lag_days, &predecessor, &successor))
    }

    /// Conflict-check a stored edge with its own kind and lag.
    pub fn validate_edge(&self, edge_id: EdgeId) -> Result<ConflictReport, EngineError> {
        let edge = self.get_dependency(edge_id)?;
        let predecessor = self.require_task(edge.predecessor_id)?;
        let successor = self.require_task(edge.successor_id)?;
        Ok(conflicts::evaluate_edge(&edge, &predecessor, &successor))
    }

    /// Reports for every edge touching `task_id`, violated or not.
    pub fn detect_conflicts(&self, task_id: TaskId) -> Result<Vec<ConflictReport>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            conflicts::detect_for_task(graph, &self.source, task_id)
        }))
    }

    /// Violated edges across the whole project.
    pub fn detect_project_conflicts(&self, project_id: ProjectId) -> Vec<ConflictReport> {
        self.with_graph(project_id, |graph| {
            conflicts::detect_for_project(graph, &self.source)
        })
    }

    pub fn can_task_start(&self, task_id: TaskId) -> Result<bool, EngineError> {
        Ok(self.blocking_predecessors(task_id)?.is_empty())
    }

    pub fn can_task_complete(&self, task_id: TaskId) -> Result<bool, EngineError> {
        Ok(self.blocking_for_completion(task_id)?.is_empty())
    }

    /// Predecessors currently preventing `task_id` from starting.
    pub fn blocking_predecessors(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            readiness::blocking_start(graph, &self.source, task_id)
        }))
    }

    /// Predecessors currently preventing `task_id` from completing.
    pub fn blocking_for_completion(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            readiness::blocking_completion(graph, &self.source, task_id)
        }))
    }

    /// Earliest feasible start date for `task_id` given its predecessors'
    /// committed dates, or `None` when nothing constrains it.
    pub fn suggested_start_date(&self, task_id: TaskId) -> Result<Option<NaiveDate>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            propagation::suggested_start_date(graph, &self.source, &self.config, task_id)
        }))
    }

    /// Every task transitively upstream of `task_id`, sorted.
    pub fn all_predecessor_ids(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            readiness::all_predecessor_ids(graph, task_id)
        }))
    }

    /// Every task transitively downstream of `task_id`, sorted.
    pub fn all_successor_ids(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let task = self.require_task(task_id)?;
        Ok(self.with_graph(task.project_id, |graph| {
            readiness::all_successor_ids(graph, task_id)
        }))
    }

    /// Per-edge joined rows for a project: the edge, both endpoint snapshots,
    /// and the current conflict report. Ordered by edge ID; edges whose
    /// endpoints cannot be resolved are skipped.
    pub fn list_dependency_details(&self, project_id: ProjectId) -> Vec<DependencyDetail> {
        self.with_graph(project_id, |graph| {
            let mut details: Vec<DependencyDetail> = graph
                .edges()
                .filter_map(|edge| {
                    let predecessor = self.source.task(edge.predecessor_id)?;
                    let successor = self.source.task(edge.successor_id)?;
                    let conflict = conflicts::evaluate_edge(edge, &predecessor, &successor);
                    Some(DependencyDetail {
                        dependency: edge.clone(),
                        predecessor,
                        successor,
                        conflict,
                    })
                })
                .collect();
            details.sort_by_key(|detail| detail.dependency.id);
            details
        })
    }

    fn require_task(&self, task_id: TaskId) -> Result<TaskSnapshot, EngineError> {
        self.source
            .task(task_id)
            .ok_or(EngineError::TaskNotFound(task_id))
    }

    /// The graph of `project_id`, created empty on first mutation.
    fn project_graph(&self, project_id: ProjectId) -> Arc<RwLock<DependencyGraph>> {
        let mut graphs = self.graphs.write();
        graphs
            .entry(project_id)
            .or_insert_with(|| Arc::new(RwLock::new(DependencyGraph::new(project_id))))
            .clone()
    }

    /// Run a read-only query against the project's graph; projects without
    /// edges see an empty graph rather than materializing one.
    fn with_graph<T>(&self, project_id: ProjectId, f: impl FnOnce(&DependencyGraph) -> T) -> T {
        let handle = self.graphs.read().get(&project_id).cloned();
        match handle {
            Some(handle) => f(&handle.read()),
            None => f(&DependencyGraph::new(project_id)),
        }
    }

    fn graph_holding_edge(&self, edge_id: EdgeId) -> Option<Arc<RwLock<DependencyGraph>>> {
        let graphs = self.graphs.read();
        for handle in graphs.values() {
            if handle.read().edge(edge_id).is_some() {
                return Some(handle.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflicts::ViolationKind;
    use crate::models::{InMemoryTaskSource, TaskStatus};
    use parking_lot::Mutex;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn make_task(id: TaskId, project_id: ProjectId) -> TaskSnapshot {
        TaskSnapshot {
            id,
            project_id,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            duration_days: None,
            status: TaskStatus::NotStarted,
        }
    }

    fn make_engine(tasks: Vec<TaskSnapshot>) -> DependencyEngine<InMemoryTaskSource> {
        let mut source = InMemoryTaskSource::new();
        for task in tasks {
            source.insert(task);
        }
        DependencyEngine::new(source)
    }

    /// Shared mutable source, as an embedding application would wire in.
    #[derive(Clone, Default)]
    struct SharedSource(Arc<Mutex<InMemoryTaskSource>>);

    impl TaskSource for SharedSource {
        fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
            self.0.lock().task(id)
        }

        fn project_tasks(&self, project_id: ProjectId) -> Vec<TaskSnapshot> {
            self.0.lock().project_tasks(project_id)
        }
    }

    #[test]
    fn test_create_applies_defaults() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        let edge = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        assert_eq!(edge.id, 1);
        assert_eq!(edge.kind, DependencyKind::FinishToStart);
        assert_eq!(edge.lag_days, 0);
        assert_eq!(engine.get_dependency(1).unwrap(), edge);
    }

    #[test]
    fn test_create_with_explicit_kind_and_lag() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        let mut spec = DependencySpec::new(1, 2);
        spec.kind = Some(DependencyKind::StartToStart);
        spec.lag_days = Some(-3);
        spec.note = Some("overlapped ramp-up".to_string());

        let edge = engine.create_dependency(spec).unwrap();
        assert_eq!(edge.kind, DependencyKind::StartToStart);
        assert_eq!(edge.lag_days, -3);
        assert_eq!(edge.note.as_deref(), Some("overlapped ramp-up"));
    }

    #[test]
    fn test_custom_config_defaults() {
        let mut source = InMemoryTaskSource::new();
        source.insert(make_task(1, 1));
        source.insert(make_task(2, 1));
        let config = EngineConfig {
            default_kind: DependencyKind::StartToStart,
            default_lag_days: 2,
            fallback_duration_days: 3,
        };
        let engine = DependencyEngine::with_config(source, config);

        let edge = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        assert_eq!(edge.kind, DependencyKind::StartToStart);
        assert_eq!(edge.lag_days, 2);

        // The fallback duration feeds the schedule of undated tasks.
        let detail = engine.calculate_critical_path_detail(1).unwrap();
        assert_eq!(detail.duration_days, 5);
    }

    #[test]
    fn test_create_rejects_unknown_task() {
        let engine = make_engine(vec![make_task(1, 1)]);
        assert_eq!(
            engine.create_dependency(DependencySpec::new(1, 99)),
            Err(EngineError::TaskNotFound(99))
        );
        assert_eq!(
            engine.create_dependency(DependencySpec::new(99, 1)),
            Err(EngineError::TaskNotFound(99))
        );
    }

    #[test]
    fn test_create_rejects_cross_project() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 2)]);
        assert_eq!(
            engine.create_dependency(DependencySpec::new(1, 2)),
            Err(EngineError::CrossProjectDependency {
                predecessor: 1,
                successor: 2
            })
        );
        assert!(engine.list_for_project(1).is_empty());
        assert!(engine.list_for_project(2).is_empty());
    }

    #[test]
    fn test_create_rejects_self_loop_and_duplicate() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        assert_eq!(
            engine.create_dependency(DependencySpec::new(1, 1)),
            Err(EngineError::Graph(GraphError::SelfDependency(1)))
        );

        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        let mut retyped = DependencySpec::new(1, 2);
        retyped.kind = Some(DependencyKind::FinishToFinish);
        assert_eq!(
            engine.create_dependency(retyped),
            Err(EngineError::Graph(GraphError::DuplicateDependency {
                predecessor: 1,
                successor: 2
            }))
        );
    }

    #[test]
    fn test_cycle_rejected_and_graph_unchanged() {
        // The reverse edge must fail and leave only the first edge stored.
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        let first = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        assert_eq!(
            engine.create_dependency(DependencySpec::new(2, 1)),
            Err(EngineError::Graph(GraphError::CycleDetected {
                predecessor: 2,
                successor: 1
            }))
        );

        let edges = engine.list_for_project(1);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], first);
    }

    #[test]
    fn test_would_create_cycle_and_exists() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1), make_task(3, 1)]);
        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(2, 3))
            .unwrap();

        assert!(engine.would_create_cycle(3, 1));
        assert!(engine.would_create_cycle(7, 7));
        assert!(!engine.would_create_cycle(1, 3));

        assert!(engine.exists_dependency(1, 2));
        assert!(!engine.exists_dependency(2, 1));
        assert!(!engine.exists_dependency(1, 3));
    }

    #[test]
    fn test_batch_create_is_atomic() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1), make_task(3, 1)]);

        // The closing edge poisons the whole batch.
        let err = engine
            .batch_create_dependencies(vec![
                DependencySpec::new(1, 2),
                DependencySpec::new(2, 3),
                DependencySpec::new(3, 1),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graph(GraphError::CycleDetected { .. })
        ));
        assert!(engine.list_for_project(1).is_empty());

        let created = engine
            .batch_create_dependencies(vec![
                DependencySpec::new(1, 2),
                DependencySpec::new(2, 3),
            ])
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(engine.list_for_project(1).len(), 2);
    }

    #[test]
    fn test_batch_spanning_projects_is_atomic() {
        let engine = make_engine(vec![
            make_task(1, 1),
            make_task(2, 1),
            make_task(11, 2),
            make_task(12, 2),
        ]);

        let err = engine
            .batch_create_dependencies(vec![
                DependencySpec::new(1, 2),
                DependencySpec::new(11, 12),
                DependencySpec::new(12, 11),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graph(GraphError::CycleDetected { .. })
        ));
        assert!(engine.list_for_project(1).is_empty());
        assert!(engine.list_for_project(2).is_empty());

        engine
            .batch_create_dependencies(vec![
                DependencySpec::new(1, 2),
                DependencySpec::new(11, 12),
            ])
            .unwrap();
        assert_eq!(engine.list_for_project(1).len(), 1);
        assert_eq!(engine.list_for_project(2).len(), 1);
    }

    #[test]
    fn test_batch_rejects_cross_project_pair() {
        let engine = make_engine(vec![make_task(1, 1), make_task(11, 2)]);
        let err = engine
            .batch_create_dependencies(vec![DependencySpec::new(1, 11)])
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::CrossProjectDependency {
                predecessor: 1,
                successor: 11
            }
        );
    }

    #[test]
    fn test_update_dependency() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        let edge = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        let updated = engine
            .update_dependency(edge.id, Some(DependencyKind::FinishToFinish), Some(4))
            .unwrap();
        assert_eq!(updated.kind, DependencyKind::FinishToFinish);
        assert_eq!(updated.lag_days, 4);

        // None keeps the current values.
        let unchanged = engine.update_dependency(edge.id, None, None).unwrap();
        assert_eq!(unchanged.kind, DependencyKind::FinishToFinish);
        assert_eq!(unchanged.lag_days, 4);

        assert_eq!(
            engine.update_dependency(99, None, None),
            Err(EngineError::Graph(GraphError::EdgeNotFound(99)))
        );
    }

    #[test]
    fn test_delete_dependency() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1)]);
        let edge = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        let removed = engine.delete_dependency(edge.id).unwrap();
        assert_eq!(removed, edge);
        assert!(!engine.exists_dependency(1, 2));
        assert_eq!(
            engine.delete_dependency(edge.id),
            Err(EngineError::Graph(GraphError::EdgeNotFound(edge.id)))
        );
    }

    #[test]
    fn test_delete_dependencies_for_task_after_task_removal() {
        // The cascade runs after the task record is gone from the source.
        let source = SharedSource::default();
        source.0.lock().insert(make_task(1, 1));
        source.0.lock().insert(make_task(2, 1));
        source.0.lock().insert(make_task(3, 1));
        let engine = DependencyEngine::new(source.clone());

        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(2, 3))
            .unwrap();

        source.0.lock().remove(2);
        let removed = engine.delete_dependencies_for_task(2);
        assert_eq!(removed.len(), 2);
        assert!(engine.list_for_project(1).is_empty());
        assert!(engine.delete_dependencies_for_task(2).is_empty());
    }

    #[test]
    fn test_list_queries() {
        let engine = make_engine(vec![make_task(1, 1), make_task(2, 1), make_task(3, 1)]);
        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(3, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(2, 3))
            .unwrap_err(); // cycle via 3 -> 2

        let incoming = engine.list_predecessors(2).unwrap();
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].predecessor_id, 1);
        assert_eq!(incoming[1].predecessor_id, 3);

        let outgoing = engine.list_successors(1).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].successor_id, 2);

        assert_eq!(engine.list_for_project(1).len(), 2);
        assert_eq!(
            engine.list_predecessors(99),
            Err(EngineError::TaskNotFound(99))
        );
    }

    #[test]
    fn test_edge_ids_unique_across_projects() {
        let engine = make_engine(vec![
            make_task(1, 1),
            make_task(2, 1),
            make_task(11, 2),
            make_task(12, 2),
        ]);
        let first = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        let second = engine
            .create_dependency(DependencySpec::new(11, 12))
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(engine.get_dependency(second.id).unwrap().project_id, 2);
    }

    #[test]
    fn test_critical_path_through_engine() {
        // 1 (5d) -> 2 (3d) plus an independent 3 (4d).
        let mut first = make_task(1, 1);
        first.duration_days = Some(5);
        let mut second = make_task(2, 1);
        second.duration_days = Some(3);
        let mut third = make_task(3, 1);
        third.duration_days = Some(4);
        let engine = make_engine(vec![first, second, third]);
        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        assert_eq!(engine.calculate_critical_path(1).unwrap(), vec![1, 2]);

        let detail = engine.calculate_critical_path_detail(1).unwrap();
        assert_eq!(detail.duration_days, 8);
        assert_eq!(detail.critical_chains, vec![vec![1, 2]]);
        assert_eq!(detail.tasks.len(), 3);

        // A project with no tasks yields an empty schedule.
        assert!(engine.calculate_critical_path(9).unwrap().is_empty());
    }

    #[test]
    fn test_validate_proposed_dependency() {
        // Successor starts day 8 although its predecessor runs to day 10.
        let mut predecessor = make_task(1, 1);
        predecessor.planned_end = Some(day(10));
        let mut successor = make_task(2, 1);
        successor.planned_start = Some(day(8));
        let engine = make_engine(vec![predecessor, successor]);

        let report = engine
            .validate_dependency(&DependencySpec::new(1, 2))
            .unwrap();
        assert_eq!(report.edge_id, None);
        assert!(report.violated);
        assert_eq!(report.violation, Some(ViolationKind::DateOrder));
        assert_eq!(report.expected_date, Some(day(10)));
        assert_eq!(report.actual_date, Some(day(8)));
    }

    #[test]
    fn test_validate_stored_edge() {
        let mut predecessor = make_task(1, 1);
        predecessor.planned_end = Some(day(10));
        let mut successor = make_task(2, 1);
        successor.planned_start = Some(day(12));
        let engine = make_engine(vec![predecessor, successor]);

        let mut spec = DependencySpec::new(1, 2);
        spec.lag_days = Some(3);
        let edge = engine.create_dependency(spec).unwrap();

        let report = engine.validate_edge(edge.id).unwrap();
        assert_eq!(report.edge_id, Some(edge.id));
        assert!(report.violated);
        assert_eq!(report.expected_date, Some(day(13)));
    }

    #[test]
    fn test_detect_conflicts_through_engine() {
        let mut first = make_task(1, 1);
        first.planned_end = Some(day(10));
        let mut second = make_task(2, 1);
        second.planned_start = Some(day(8));
        let mut third = make_task(3, 1);
        third.planned_start = Some(day(12));
        let engine = make_engine(vec![first, second, third]);

        let bad = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(1, 3))
            .unwrap();

        let reports = engine.detect_conflicts(1).unwrap();
        assert_eq!(reports.len(), 2);

        let violated = engine.detect_project_conflicts(1);
        assert_eq!(violated.len(), 1);
        assert_eq!(violated[0].edge_id, Some(bad.id));
    }

    #[test]
    fn test_readiness_through_engine() {
        let mut blocker = make_task(1, 1);
        blocker.status = TaskStatus::InProgress;
        let engine = make_engine(vec![blocker, make_task(2, 1)]);
        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();

        assert!(!engine.can_task_start(2).unwrap());
        assert_eq!(engine.blocking_predecessors(2).unwrap(), vec![1]);

        // No finish-binding edges, so completion is not gated.
        assert!(engine.can_task_complete(2).unwrap());
        assert!(engine.blocking_for_completion(2).unwrap().is_empty());

        assert_eq!(
            engine.can_task_start(99),
            Err(EngineError::TaskNotFound(99))
        );
    }

    #[test]
    fn test_suggested_start_through_engine() {
        let mut predecessor = make_task(1, 1);
        predecessor.planned_end = Some(day(10));
        let engine = make_engine(vec![predecessor, make_task(2, 1)]);
        let mut spec = DependencySpec::new(1, 2);
        spec.lag_days = Some(2);
        engine.create_dependency(spec).unwrap();

        assert_eq!(engine.suggested_start_date(2).unwrap(), Some(day(12)));
    }

    #[test]
    fn test_closures_through_engine() {
        let engine = make_engine(vec![
            make_task(1, 1),
            make_task(2, 1),
            make_task(3, 1),
            make_task(4, 1),
        ]);
        engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(1, 3))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(2, 4))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(3, 4))
            .unwrap();

        assert_eq!(engine.all_predecessor_ids(4).unwrap(), vec![1, 2, 3]);
        assert_eq!(engine.all_successor_ids(1).unwrap(), vec![2, 3, 4]);
        assert!(engine.all_predecessor_ids(1).unwrap().is_empty());
    }

    #[test]
    fn test_list_dependency_details() {
        let mut first = make_task(1, 1);
        first.planned_end = Some(day(10));
        first.status = TaskStatus::InProgress;
        let mut second = make_task(2, 1);
        second.planned_start = Some(day(8));
        let engine = make_engine(vec![first, second, make_task(3, 1)]);

        let edge = engine
            .create_dependency(DependencySpec::new(1, 2))
            .unwrap();
        engine
            .create_dependency(DependencySpec::new(1, 3))
            .unwrap();

        let details = engine.list_dependency_details(1);
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].dependency, edge);
        assert_eq!(details[0].predecessor.id, 1);
        assert_eq!(details[0].successor.id, 2);
        assert!(details[0].conflict.violated);
        assert!(!details[1].conflict.violated);
    }
}
