//! Drover change execution engine -- applies an ordered sequence of
//! idempotent changes against pluggable target systems, recording every
//! attempt in an append-only audit log.
//!
//! The audit log is the sole source of truth: a process that crashes,
//! restarts, or races another instance rebuilds a per-task snapshot from
//! the log and asks the recovery classifier what must happen next --
//! skip, re-execute, or halt for human intervention. A change whose
//! effect cannot be proven safe to repeat is never silently re-applied.
//!
//! The external loader registers changes as [`ChangeUnit`] values inside
//! [`Task`] descriptors, wires target systems and an audit store into a
//! [`Pipeline`], and calls [`Pipeline::run`].

mod audit;
mod context;
mod error;
mod lock;
mod navigator;
mod pipeline;
mod recovery;
mod snapshot;
mod target;
mod task;

pub use context::{ChangeContext, Dependencies};
pub use error::{DynError, EngineError, ErrorKind};
pub use lock::{AlwaysHeldLock, LockGuard, LockProvider};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineSummary, TaskOutcome, TaskReport};
pub use recovery::{resolve_action, ChangeAction, ManualInterventionError, RecoveryIssue};
pub use snapshot::{build_snapshot, AuditSnapshot};
pub use target::{
    resolve_tx_type, BoxFuture, TargetSystem, TargetSystemRegistry, Transactional, TxOutcome,
    TxVerdict,
};
pub use task::{ChangeUnit, RecoveryStrategy, Task};
