use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ChangeContext;
use crate::error::DynError;

/// What the engine may do on its own when a task's previous attempt left
/// an ambiguous audit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Halt and require a human to verify the target system.
    ManualIntervention,
    /// The change is safe to re-apply regardless of what the previous
    /// attempt did; retry instead of halting.
    AlwaysRetry,
}

impl RecoveryStrategy {
    pub fn is_always_retry(self) -> bool {
        matches!(self, RecoveryStrategy::AlwaysRetry)
    }
}

/// One registered change body.
///
/// A change is a value implementing `apply` and optionally `rollback`,
/// registered by the external loader before a run begins. Bodies obtain
/// their collaborators through the [`ChangeContext`], whose accessors are
/// gated by the lock guard.
#[async_trait]
pub trait ChangeUnit: Send + Sync {
    /// Short name recorded as `change_name` in the audit trail.
    fn name(&self) -> &str;

    /// Apply the change. Must be idempotent.
    async fn apply(&self, ctx: &ChangeContext<'_>) -> Result<(), DynError>;

    /// Whether [`ChangeUnit::rollback`] is a real inverse operation.
    /// When false, a failed apply is terminal without a rollback attempt.
    fn provides_rollback(&self) -> bool {
        false
    }

    /// Undo the change after a failed apply.
    async fn rollback(&self, _ctx: &ChangeContext<'_>) -> Result<(), DynError> {
        Ok(())
    }
}

/// A loaded change: descriptor plus body.
///
/// Constructed once by the external loader, immutable thereafter, and
/// consumed by the navigator strictly in ascending `order`.
#[derive(Clone)]
pub struct Task {
    pub id: String,
    /// Total ordering key across the whole pipeline.
    pub order: u32,
    pub author: String,
    /// Execute inside the target system's transaction when it offers one.
    pub transactional: bool,
    /// Re-execute even when the last audit state is EXECUTED.
    pub run_always: bool,
    /// Marks framework-internal changes in the audit trail.
    pub system: bool,
    pub target_system_id: String,
    pub recovery: RecoveryStrategy,
    pub change: Arc<dyn ChangeUnit>,
}

impl Task {
    /// A task with the default flags: transactional, not run-always, not
    /// a system change, manual-intervention recovery.
    pub fn new(
        id: impl Into<String>,
        order: u32,
        author: impl Into<String>,
        target_system_id: impl Into<String>,
        change: Arc<dyn ChangeUnit>,
    ) -> Self {
        Self {
            id: id.into(),
            order,
            author: author.into(),
            transactional: true,
            run_always: false,
            system: false,
            target_system_id: target_system_id.into(),
            recovery: RecoveryStrategy::ManualIntervention,
            change,
        }
    }

    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    pub fn run_always(mut self) -> Self {
        self.run_always = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryStrategy) -> Self {
        self.recovery = recovery;
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("author", &self.author)
            .field("transactional", &self.transactional)
            .field("run_always", &self.run_always)
            .field("system", &self.system)
            .field("target_system_id", &self.target_system_id)
            .field("recovery", &self.recovery)
            .field("change", &self.change.name())
            .finish()
    }
}
