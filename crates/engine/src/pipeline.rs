use std::collections::HashSet;
use std::sync::Arc;

use drover_store::AuditStore;
use serde::Serialize;
use tracing::{debug, info};

use crate::audit::{AuditWriter, ExecutionContext};
use crate::context::Dependencies;
use crate::error::EngineError;
use crate::lock::{AlwaysHeldLock, LockGuard, LockProvider};
use crate::navigator::ChangeNavigator;
use crate::recovery::{resolve_action, ChangeAction, ManualInterventionError, RecoveryIssue};
use crate::snapshot::{build_snapshot, AuditSnapshot};
use crate::target::{TargetSystem, TargetSystemRegistry};
use crate::task::Task;

/// What happened to one task during a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskOutcome {
    Applied,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: String,
    pub outcome: TaskOutcome,
}

/// Per-task outcomes of a successful run, in pipeline order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub tasks: Vec<TaskReport>,
}

impl PipelineSummary {
    pub fn applied(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.outcome == TaskOutcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.outcome == TaskOutcome::Skipped)
            .count()
    }

    fn push(&mut self, task: &Task, outcome: TaskOutcome) {
        self.tasks.push(TaskReport {
            task_id: task.id.clone(),
            outcome,
        });
    }
}

/// Decision carried from the pre-flight gate into the execution loop.
enum PlannedAction {
    Run,
    Skip,
}

/// An ordered change pipeline bound to an audit store, target systems,
/// and a lock provider.
///
/// `run` is restartable: every run rebuilds the snapshot from the audit
/// log and classifies each task before anything executes.
pub struct Pipeline {
    tasks: Vec<Task>,
    store: Arc<dyn AuditStore>,
    targets: TargetSystemRegistry,
    lock: Arc<dyn LockProvider>,
    dependencies: Dependencies,
    stage_id: String,
    hostname: String,
    metadata: serde_json::Value,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stage_id", &self.stage_id)
            .field("hostname", &self.hostname)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Execute the pipeline once.
    ///
    /// Validation and the manual-intervention gate run before any task
    /// body; tasks then execute strictly in ascending order, and the
    /// first task-level failure stops the run after its audit trail is
    /// written.
    pub async fn run(&self) -> Result<PipelineSummary, EngineError> {
        self.validate()?;

        let history = self.store.read_all().await?;
        let snapshot = build_snapshot(&history);
        let planned = self.plan(&snapshot)?;

        let guard = LockGuard::new(Arc::clone(&self.lock));
        let context = ExecutionContext::new(
            self.stage_id.clone(),
            self.hostname.clone(),
            self.metadata.clone(),
        );
        info!(
            execution_id = %context.execution_id,
            stage_id = %self.stage_id,
            tasks = self.tasks.len(),
            "starting pipeline run"
        );
        let writer = AuditWriter::new(Arc::clone(&self.store), context);
        let navigator = ChangeNavigator::new(&writer, &guard, &self.dependencies);

        let mut summary = PipelineSummary::default();
        for (task, action) in self.tasks.iter().zip(planned) {
            match action {
                PlannedAction::Skip => {
                    debug!(task_id = %task.id, "change already applied, skipping");
                    summary.push(task, TaskOutcome::Skipped);
                }
                PlannedAction::Run => {
                    let target = self.targets.get(&task.target_system_id)?;
                    navigator.apply_change(task, target).await?;
                    summary.push(task, TaskOutcome::Applied);
                }
            }
        }

        info!(
            applied = summary.applied(),
            skipped = summary.skipped(),
            "pipeline run complete"
        );
        Ok(summary)
    }

    /// Structural checks on the loaded task list: unique ids, strictly
    /// increasing order, known target systems. Always fatal, never
    /// partial -- nothing executes when validation fails.
    fn validate(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        let mut prev: Option<&Task> = None;
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(EngineError::Validation(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
            if let Some(previous) = prev {
                if task.order <= previous.order {
                    return Err(EngineError::Validation(format!(
                        "task '{}' (order {}) does not follow '{}' (order {}): \
                         orders must be strictly increasing",
                        task.id, task.order, previous.id, previous.order
                    )));
                }
            }
            self.targets.get(&task.target_system_id)?;
            prev = Some(task);
        }
        Ok(())
    }

    /// Pre-flight gate: classify every task against the snapshot and
    /// collect every manual-intervention outcome before anything runs.
    fn plan(&self, snapshot: &AuditSnapshot) -> Result<Vec<PlannedAction>, EngineError> {
        let mut planned = Vec::with_capacity(self.tasks.len());
        let mut issues = Vec::new();
        for task in &self.tasks {
            let last = snapshot.get(&task.id);
            match resolve_action(task, last) {
                ChangeAction::Run => planned.push(PlannedAction::Run),
                ChangeAction::Skip => planned.push(PlannedAction::Skip),
                ChangeAction::ManualIntervention => {
                    // The classifier only demands a human when history
                    // exists for the task.
                    if let Some(entry) = last {
                        issues.push(RecoveryIssue::from_entry(entry));
                    }
                }
            }
        }
        if issues.is_empty() {
            Ok(planned)
        } else {
            Err(ManualInterventionError::new(self.stage_id.clone(), issues).into())
        }
    }
}

/// Assembles a [`Pipeline`] from loader output: tasks, the audit store,
/// target systems, the lock provider, and run-scoped dependencies.
pub struct PipelineBuilder {
    tasks: Vec<Task>,
    store: Option<Arc<dyn AuditStore>>,
    targets: TargetSystemRegistry,
    lock: Arc<dyn LockProvider>,
    dependencies: Dependencies,
    stage_id: String,
    hostname: String,
    metadata: serde_json::Value,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            tasks: Vec::new(),
            store: None,
            targets: TargetSystemRegistry::new(),
            lock: Arc::new(AlwaysHeldLock),
            dependencies: Dependencies::new(),
            stage_id: "main".to_string(),
            hostname: "localhost".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn target_system(mut self, system: Arc<dyn TargetSystem>) -> Self {
        self.targets.register(system);
        self
    }

    pub fn lock_provider(mut self, lock: Arc<dyn LockProvider>) -> Self {
        self.lock = lock;
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Register a run-scoped dependency change bodies can look up by
    /// type through their context.
    pub fn dependency<T: Send + Sync + 'static>(mut self, dependency: T) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    pub fn stage_id(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = stage_id.into();
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Opaque metadata stamped on every audit entry this pipeline writes.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> Result<Pipeline, EngineError> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("an audit store is required".to_string()))?;
        Ok(Pipeline {
            tasks: self.tasks,
            store,
            targets: self.targets,
            lock: self.lock,
            dependencies: self.dependencies,
            stage_id: self.stage_id,
            hostname: self.hostname,
            metadata: self.metadata,
        })
    }
}
