use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use drover_store::AuditTxType;

use crate::error::{DynError, EngineError};
use crate::task::Task;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the composed body asks the transaction boundary to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxVerdict {
    Commit,
    Rollback,
}

/// What the transaction boundary actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    /// The boundary discarded all effects; nothing the body did is
    /// visible in the target system.
    RolledBack,
}

/// An external system a task mutates. Implemented by connector crates.
pub trait TargetSystem: Send + Sync {
    fn id(&self) -> &str;

    /// The system's transactional capability, if it has one.
    fn transactional(&self) -> Option<&dyn Transactional> {
        None
    }
}

impl std::fmt::Debug for dyn TargetSystem + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSystem").field("id", &self.id()).finish()
    }
}

/// Transactional capability of a target system.
///
/// `wrap_in_transaction` opens a transaction, drives `body` to its
/// verdict, then commits or rolls back accordingly. The engine composes
/// body-execution and the post-execution audit write into `body`, so for
/// a system that shares storage with the audit store the audit write
/// lands inside the same transaction.
#[async_trait]
pub trait Transactional: Send + Sync {
    /// True when the audit store writes through this system's
    /// transaction (same database, same session).
    fn shares_audit_store(&self) -> bool {
        false
    }

    /// True when the system keeps execution markers
    /// (`register_as_executing` / `clean`) in its own storage.
    fn supports_markers(&self) -> bool {
        false
    }

    async fn wrap_in_transaction(
        &self,
        task_id: &str,
        body: BoxFuture<'_, TxVerdict>,
    ) -> Result<TxOutcome, DynError>;

    /// Record that `task_id` is currently executing. The marker lets a
    /// later run distinguish "failed mid-flight with no visible trace"
    /// from "failed after partial, possibly-visible effects".
    async fn register_as_executing(&self, _task_id: &str) -> Result<(), DynError> {
        Ok(())
    }

    /// Remove the execution marker once the task completed.
    async fn clean(&self, _task_id: &str) -> Result<(), DynError> {
        Ok(())
    }
}

/// The target systems known to one pipeline, keyed by id.
///
/// Discovery is the embedder's problem: connectors are registered
/// explicitly before the run starts.
#[derive(Default)]
pub struct TargetSystemRegistry {
    systems: HashMap<String, Arc<dyn TargetSystem>>,
}

impl TargetSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, system: Arc<dyn TargetSystem>) {
        self.systems.insert(system.id().to_string(), system);
    }

    pub fn get(&self, id: &str) -> Result<&Arc<dyn TargetSystem>, EngineError> {
        self.systems
            .get(id)
            .ok_or_else(|| EngineError::Validation(format!("unknown target system '{id}'")))
    }
}

/// Resolve the transaction type stamped on every audit entry written for
/// `task` this run.
///
/// Transactional execution requires both a transactional target system
/// and a task marked transactional; everything else is `NonTx`. For
/// transactional execution the type records how the audit store relates
/// to the target's transaction, which is exactly what the recovery
/// classifier needs on the next run.
pub fn resolve_tx_type(task: &Task, target: &dyn TargetSystem) -> AuditTxType {
    match target.transactional() {
        Some(tx) if task.transactional => {
            if tx.shares_audit_store() {
                AuditTxType::TxShared
            } else if tx.supports_markers() {
                AuditTxType::TxSeparateWithMarker
            } else {
                AuditTxType::TxSeparateNoMarker
            }
        }
        _ => AuditTxType::NonTx,
    }
}
