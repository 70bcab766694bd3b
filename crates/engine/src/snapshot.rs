use std::collections::HashMap;

use drover_store::AuditEntry;

/// Each task's last known audit entry, keyed by task id. Derived, never
/// persisted; rebuilt from the full log at the start of every run.
pub type AuditSnapshot = HashMap<String, AuditEntry>;

/// Fold the full audit history into a snapshot.
///
/// `entries` must be in creation order, which is what
/// `AuditStore::read_all` guarantees; the last entry per task id wins.
pub fn build_snapshot(entries: &[AuditEntry]) -> AuditSnapshot {
    let mut snapshot = AuditSnapshot::new();
    for entry in entries {
        snapshot.insert(entry.task_id.clone(), entry.clone());
    }
    snapshot
}
