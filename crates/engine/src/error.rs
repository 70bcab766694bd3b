use crate::recovery::ManualInterventionError;
use drover_store::StoreError;

/// Error type returned by change bodies. Anything that implements
/// `std::error::Error` converts into it with `?`.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`EngineError`], so callers can branch
/// without matching variants or strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural problem in the task list; nothing was executed.
    Validation,
    /// One or more tasks need a human before any execution can proceed.
    ManualIntervention,
    /// A change body failed during apply; the audit trail records it.
    Execution,
    /// A rollback body failed; the task needs a human on the next run.
    Rollback,
    /// The distributed execution lock was lost mid-run.
    LockLost,
    /// The audit store itself failed.
    Store,
}

/// Errors surfaced by the pipeline and its components.
///
/// Task-level execution failures are partially recovered locally (a
/// rollback attempt) but their net outcome always surfaces here; no task
/// failure is ever swallowed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    ManualIntervention(#[from] ManualInterventionError),

    #[error("change '{task_id}' failed during apply: {source}")]
    Execution {
        task_id: String,
        #[source]
        source: DynError,
    },

    #[error("change '{task_id}' rollback failed: {source}")]
    Rollback {
        task_id: String,
        #[source]
        source: DynError,
    },

    #[error("execution lock no longer held (task '{task_id}')")]
    LockLost { task_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::ManualIntervention(_) => ErrorKind::ManualIntervention,
            EngineError::Execution { .. } => ErrorKind::Execution,
            EngineError::Rollback { .. } => ErrorKind::Rollback,
            EngineError::LockLost { .. } => ErrorKind::LockLost,
            EngineError::Store(_) => ErrorKind::Store,
        }
    }
}
