use std::fmt;

use drover_store::{AuditEntry, AuditStatus, AuditTxType};
use tracing::debug;

use crate::task::Task;

/// Decision for one task given its last known audit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Run,
    Skip,
    ManualIntervention,
}

/// Map a task's last known audit entry (or absence) to an execution
/// decision.
///
/// The matrix by (last state, recorded transaction type):
///
/// | last state       | NonTx               | TxShared / TxSeparate*  |
/// |------------------|---------------------|-------------------------|
/// | absent           | Run                 | Run                     |
/// | STARTED          | ManualIntervention  | Run                     |
/// | EXECUTED         | Skip                | Skip                    |
/// | EXECUTION_FAILED | ManualIntervention  | Run                     |
/// | ROLLED_BACK      | Run                 | Run                     |
/// | ROLLBACK_FAILED  | ManualIntervention  | ManualIntervention      |
///
/// Without a transaction boundary the engine cannot know whether an
/// interrupted or failed change partially mutated the target system, so
/// it refuses to guess; a transactional boundary is assumed to have
/// undone any partial effect, so automatic retry is safe. ROLLBACK_FAILED
/// always requires a human: both forward and backward paths are
/// unverifiable at that point.
///
/// Two task-level knobs refine the matrix: `run_always` re-runs an
/// EXECUTED task, and an `AlwaysRetry` recovery strategy declares the
/// change safe to re-apply, turning the STARTED and EXECUTION_FAILED
/// manual cells into Run. Neither touches ROLLBACK_FAILED.
pub fn resolve_action(task: &Task, last: Option<&AuditEntry>) -> ChangeAction {
    let Some(entry) = last else {
        debug!(task_id = %task.id, "no audit history, change will run");
        return ChangeAction::Run;
    };

    let action = match entry.state {
        AuditStatus::Executed => {
            if task.run_always {
                ChangeAction::Run
            } else {
                ChangeAction::Skip
            }
        }
        AuditStatus::Started | AuditStatus::ExecutionFailed => match entry.tx_type {
            AuditTxType::NonTx => {
                if task.recovery.is_always_retry() {
                    ChangeAction::Run
                } else {
                    ChangeAction::ManualIntervention
                }
            }
            AuditTxType::TxShared
            | AuditTxType::TxSeparateWithMarker
            | AuditTxType::TxSeparateNoMarker => ChangeAction::Run,
        },
        AuditStatus::RolledBack => ChangeAction::Run,
        AuditStatus::RollbackFailed => ChangeAction::ManualIntervention,
    };

    debug!(
        task_id = %task.id,
        state = %entry.state,
        tx_type = %entry.tx_type,
        ?action,
        "recovery decision"
    );
    action
}

/// Why a task needs a human before the engine can continue.
#[derive(Debug, Clone)]
pub struct RecoveryIssue {
    pub task_id: String,
    pub reason: String,
}

impl RecoveryIssue {
    pub fn from_entry(entry: &AuditEntry) -> Self {
        let reason = match entry.state {
            AuditStatus::Started => format!(
                "interrupted while running ({} under {}); the engine cannot prove \
                 whether its effects were applied",
                entry.state, entry.tx_type
            ),
            AuditStatus::ExecutionFailed => format!(
                "failed without a transaction boundary ({}); partial effects may be \
                 visible in the target system",
                entry.tx_type
            ),
            AuditStatus::RollbackFailed => {
                "both apply and rollback failed; neither path can be verified".to_string()
            }
            other => format!("unexpected audit state {other}"),
        };
        Self {
            task_id: entry.task_id.clone(),
            reason,
        }
    }
}

/// Aggregated pre-flight failure: every task that needs a human, with
/// remediation guidance, raised before any task executes.
#[derive(Debug, Clone)]
pub struct ManualInterventionError {
    pub stage_id: String,
    pub issues: Vec<RecoveryIssue>,
}

impl ManualInterventionError {
    pub fn new(stage_id: impl Into<String>, issues: Vec<RecoveryIssue>) -> Self {
        Self {
            stage_id: stage_id.into(),
            issues,
        }
    }

    /// Task ids of every conflicting change, in pipeline order.
    pub fn task_ids(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.task_id.as_str()).collect()
    }
}

impl fmt::Display for ManualInterventionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} change(s) in stage '{}' require manual intervention before execution can continue:",
            self.issues.len(),
            self.stage_id
        )?;
        for issue in &self.issues {
            writeln!(f, "  - {}: {}", issue.task_id, issue.reason)?;
        }
        write!(
            f,
            "Verify each change directly against its target system, then mark it as \
             applied or rolled back out-of-band before re-running."
        )
    }
}

impl std::error::Error for ManualInterventionError {}
