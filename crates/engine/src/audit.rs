use std::sync::Arc;

use drover_store::{AuditEntry, AuditStatus, AuditStore, AuditTxType, ExecutionType, StoreError};
use tracing::debug;

use crate::task::Task;

/// Identity and environment shared by every audit entry one run writes.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionContext {
    pub execution_id: String,
    pub stage_id: String,
    pub hostname: String,
    pub metadata: serde_json::Value,
}

impl ExecutionContext {
    pub(crate) fn new(
        stage_id: impl Into<String>,
        hostname: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            stage_id: stage_id.into(),
            hostname: hostname.into(),
            metadata,
        }
    }
}

/// Builds and appends one audit entry per task state transition.
pub(crate) struct AuditWriter {
    store: Arc<dyn AuditStore>,
    context: ExecutionContext,
}

impl AuditWriter {
    pub(crate) fn new(store: Arc<dyn AuditStore>, context: ExecutionContext) -> Self {
        Self { store, context }
    }

    pub(crate) fn execution_id(&self) -> &str {
        &self.context.execution_id
    }

    pub(crate) async fn write(
        &self,
        task: &Task,
        state: AuditStatus,
        tx_type: AuditTxType,
        execution_millis: i64,
        error_trace: Option<String>,
    ) -> Result<(), StoreError> {
        let method_name = match state {
            AuditStatus::RolledBack | AuditStatus::RollbackFailed => "rollback",
            _ => "apply",
        };
        debug!(task_id = %task.id, %state, %tx_type, "appending audit entry");
        self.store
            .append(AuditEntry {
                execution_id: self.context.execution_id.clone(),
                stage_id: self.context.stage_id.clone(),
                task_id: task.id.clone(),
                author: task.author.clone(),
                created_at: now_rfc3339(),
                state,
                execution_type: ExecutionType::Execution,
                change_name: task.change.name().to_string(),
                method_name: method_name.to_string(),
                execution_millis,
                execution_hostname: self.context.hostname.clone(),
                metadata: self.context.metadata.clone(),
                system_change: task.system,
                error_trace,
                tx_type,
                target_system_id: task.target_system_id.clone(),
            })
            .await
    }
}

/// RFC 3339 timestamp with microsecond precision, so entries written
/// within one run sort in creation order.
fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.microsecond()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_rfc3339_shaped() {
        let ts = now_rfc3339();
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }
}
