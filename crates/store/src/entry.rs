use serde::{Deserialize, Serialize};
use std::fmt;

/// The audit state recorded for one task transition.
///
/// Entries for a task form a walk of the task state machine:
/// `Started -> {Executed | ExecutionFailed}`, and after a failure
/// `{RolledBack | RollbackFailed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Started,
    Executed,
    ExecutionFailed,
    RolledBack,
    RollbackFailed,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditStatus::Started => "STARTED",
            AuditStatus::Executed => "EXECUTED",
            AuditStatus::ExecutionFailed => "EXECUTION_FAILED",
            AuditStatus::RolledBack => "ROLLED_BACK",
            AuditStatus::RollbackFailed => "ROLLBACK_FAILED",
        };
        f.write_str(s)
    }
}

/// Transactional relationship between a task's target system and the
/// audit store at the time an entry was written.
///
/// This is what makes an interrupted execution classifiable on the next
/// run: a transactional boundary guarantees no partial visible effect,
/// while `NonTx` leaves the engine unable to prove anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditTxType {
    /// Executed without a transaction boundary.
    NonTx,
    /// Target system and audit store share one transaction.
    TxShared,
    /// Separate transactions; the target system keeps execution markers.
    TxSeparateWithMarker,
    /// Separate transactions; no markers available.
    TxSeparateNoMarker,
}

impl fmt::Display for AuditTxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditTxType::NonTx => "NON_TX",
            AuditTxType::TxShared => "TX_SHARED",
            AuditTxType::TxSeparateWithMarker => "TX_SEPARATE_WITH_MARKER",
            AuditTxType::TxSeparateNoMarker => "TX_SEPARATE_NO_MARKER",
        };
        f.write_str(s)
    }
}

/// What kind of body produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    Execution,
    BeforeExecution,
}

/// One immutable audit record for one task state transition.
///
/// The store never mutates or deletes an entry — only appends. Timestamps
/// are RFC 3339 strings; within one process run the writer stamps them
/// with sub-second precision so they sort in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub execution_id: String,
    pub stage_id: String,
    pub task_id: String,
    pub author: String,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    pub state: AuditStatus,
    pub execution_type: ExecutionType,
    /// Name of the registered change unit that produced the entry.
    pub change_name: String,
    pub method_name: String,
    pub execution_millis: i64,
    pub execution_hostname: String,
    /// Opaque caller-supplied metadata, carried verbatim.
    pub metadata: serde_json::Value,
    pub system_change: bool,
    pub error_trace: Option<String>,
    pub tx_type: AuditTxType,
    pub target_system_id: String,
}
