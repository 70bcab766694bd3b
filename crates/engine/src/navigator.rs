use std::sync::Arc;
use std::time::Instant;

use drover_store::{AuditStatus, AuditTxType, StoreError};
use tracing::{info, warn};

use crate::audit::AuditWriter;
use crate::context::{ChangeContext, Dependencies};
use crate::error::{DynError, EngineError};
use crate::lock::LockGuard;
use crate::target::{resolve_tx_type, BoxFuture, TargetSystem, Transactional, TxOutcome, TxVerdict};
use crate::task::Task;

/// Drives one task through its lifecycle: STARTED audit, body execution
/// (inside the target's transaction when both sides are transactional),
/// post-execution audit, and the rollback path on failure.
///
/// Every transition is audited before the engine moves on, so a crash at
/// any point leaves a log the recovery classifier can act on.
pub(crate) struct ChangeNavigator<'run> {
    writer: &'run AuditWriter,
    guard: &'run LockGuard,
    dependencies: &'run Dependencies,
}

impl<'run> ChangeNavigator<'run> {
    pub(crate) fn new(
        writer: &'run AuditWriter,
        guard: &'run LockGuard,
        dependencies: &'run Dependencies,
    ) -> Self {
        Self {
            writer,
            guard,
            dependencies,
        }
    }

    pub(crate) async fn apply_change(
        &self,
        task: &Task,
        target: &Arc<dyn TargetSystem>,
    ) -> Result<(), EngineError> {
        let tx_type = resolve_tx_type(task, target.as_ref());
        info!(task_id = %task.id, %tx_type, "executing change");

        self.writer
            .write(task, AuditStatus::Started, tx_type, 0, None)
            .await?;

        match target.transactional() {
            Some(tx) if task.transactional => {
                self.apply_transactional(task, target, tx, tx_type).await
            }
            _ => self.apply_direct(task, target, tx_type).await,
        }
    }

    /// Non-transactional path: run the body against a fresh context, then
    /// audit the outcome; a failure falls through to the manual rollback.
    async fn apply_direct(
        &self,
        task: &Task,
        target: &Arc<dyn TargetSystem>,
        tx_type: AuditTxType,
    ) -> Result<(), EngineError> {
        let ctx = self.change_context(task, target);
        let started = Instant::now();
        let result = task.change.apply(&ctx).await;
        let elapsed = started.elapsed().as_millis() as i64;

        match result {
            Ok(()) => {
                self.writer
                    .write(task, AuditStatus::Executed, tx_type, elapsed, None)
                    .await?;
                info!(task_id = %task.id, elapsed_millis = elapsed, "change applied");
                Ok(())
            }
            Err(apply_err) => {
                warn!(task_id = %task.id, error = %apply_err, "change apply failed");
                self.writer
                    .write(
                        task,
                        AuditStatus::ExecutionFailed,
                        tx_type,
                        elapsed,
                        Some(apply_err.to_string()),
                    )
                    .await?;
                self.rollback_manual(task, target, tx_type, apply_err).await
            }
        }
    }

    /// Transactional path: the body and the post-execution audit write
    /// are composed inside the target's transaction. A non-success
    /// composed result makes the boundary discard all effects, which is
    /// recorded as an automatic rollback -- no manual rollback runs.
    async fn apply_transactional(
        &self,
        task: &Task,
        target: &Arc<dyn TargetSystem>,
        tx: &dyn Transactional,
        tx_type: AuditTxType,
    ) -> Result<(), EngineError> {
        tx.register_as_executing(&task.id)
            .await
            .map_err(|e| EngineError::Execution {
                task_id: task.id.clone(),
                source: e,
            })?;

        let mut body_failure: Option<DynError> = None;
        let mut audit_failure: Option<StoreError> = None;

        let outcome = {
            let body_failure = &mut body_failure;
            let audit_failure = &mut audit_failure;
            let writer = self.writer;
            let ctx = self.change_context(task, target);

            let body: BoxFuture<'_, TxVerdict> = Box::pin(async move {
                let started = Instant::now();
                match task.change.apply(&ctx).await {
                    Ok(()) => {
                        let elapsed = started.elapsed().as_millis() as i64;
                        match writer
                            .write(task, AuditStatus::Executed, tx_type, elapsed, None)
                            .await
                        {
                            Ok(()) => {
                                if let Err(e) = tx.clean(&task.id).await {
                                    warn!(task_id = %task.id, error = %e, "failed to clear execution marker");
                                }
                                TxVerdict::Commit
                            }
                            Err(e) => {
                                *audit_failure = Some(e);
                                TxVerdict::Rollback
                            }
                        }
                    }
                    Err(apply_err) => {
                        let elapsed = started.elapsed().as_millis() as i64;
                        warn!(task_id = %task.id, error = %apply_err, "change apply failed");
                        // Under TxShared this write is discarded with the
                        // rollback; a separate audit store keeps it ahead
                        // of the ROLLED_BACK entry.
                        if let Err(e) = writer
                            .write(
                                task,
                                AuditStatus::ExecutionFailed,
                                tx_type,
                                elapsed,
                                Some(apply_err.to_string()),
                            )
                            .await
                        {
                            warn!(task_id = %task.id, error = %e, "failed to audit execution failure");
                        }
                        *body_failure = Some(apply_err);
                        TxVerdict::Rollback
                    }
                }
            });

            tx.wrap_in_transaction(&task.id, body)
                .await
                .map_err(|e| EngineError::Execution {
                    task_id: task.id.clone(),
                    source: e,
                })?
        };

        match outcome {
            TxOutcome::Committed => {
                if let Some(e) = audit_failure {
                    return Err(e.into());
                }
                if let Some(e) = body_failure {
                    return Err(EngineError::Execution {
                        task_id: task.id.clone(),
                        source: e,
                    });
                }
                info!(task_id = %task.id, "change applied transactionally");
                Ok(())
            }
            TxOutcome::RolledBack => {
                // The boundary itself undid the effects.
                self.writer
                    .write(task, AuditStatus::RolledBack, tx_type, 0, None)
                    .await?;
                info!(task_id = %task.id, "transaction rolled back");
                if let Some(e) = audit_failure {
                    return Err(e.into());
                }
                let source = body_failure
                    .unwrap_or_else(|| "target system rolled the transaction back".into());
                Err(EngineError::Execution {
                    task_id: task.id.clone(),
                    source,
                })
            }
        }
    }

    /// After a failed non-transactional apply: run the task-defined
    /// inverse operation if one exists. With no rollback defined,
    /// EXECUTION_FAILED stays the terminal entry.
    async fn rollback_manual(
        &self,
        task: &Task,
        target: &Arc<dyn TargetSystem>,
        tx_type: AuditTxType,
        apply_err: DynError,
    ) -> Result<(), EngineError> {
        if !task.change.provides_rollback() {
            return Err(EngineError::Execution {
                task_id: task.id.clone(),
                source: apply_err,
            });
        }

        let ctx = self.change_context(task, target);
        let started = Instant::now();
        let result = task.change.rollback(&ctx).await;
        let elapsed = started.elapsed().as_millis() as i64;

        match result {
            Ok(()) => {
                self.writer
                    .write(task, AuditStatus::RolledBack, tx_type, elapsed, None)
                    .await?;
                info!(task_id = %task.id, "change rolled back");
                Err(EngineError::Execution {
                    task_id: task.id.clone(),
                    source: apply_err,
                })
            }
            Err(rollback_err) => {
                warn!(task_id = %task.id, error = %rollback_err, "rollback failed");
                self.writer
                    .write(
                        task,
                        AuditStatus::RollbackFailed,
                        tx_type,
                        elapsed,
                        Some(rollback_err.to_string()),
                    )
                    .await?;
                Err(EngineError::Rollback {
                    task_id: task.id.clone(),
                    source: rollback_err,
                })
            }
        }
    }

    /// Fresh, isolated context for one body invocation.
    fn change_context<'a>(
        &'a self,
        task: &Task,
        target: &'a Arc<dyn TargetSystem>,
    ) -> ChangeContext<'a> {
        ChangeContext::new(
            &task.id,
            self.writer.execution_id(),
            self.guard,
            self.dependencies,
            target,
        )
    }
}
