use std::future::Future;

use super::{make_entry, TestResult};
use crate::entry::{AuditStatus, AuditTxType};
use crate::AuditStore;

pub(super) async fn run_append_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "append",
        "append_visible_in_read_all",
        append_visible_in_read_all(factory).await,
    ));
    results.push(TestResult::from_result(
        "append",
        "append_preserves_all_fields",
        append_preserves_all_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "append",
        "append_preserves_error_trace",
        append_preserves_error_trace(factory).await,
    ));
    results.push(TestResult::from_result(
        "append",
        "append_preserves_metadata_verbatim",
        append_preserves_metadata_verbatim(factory).await,
    ));
    results.push(TestResult::from_result(
        "append",
        "same_task_may_appear_many_times",
        same_task_may_appear_many_times(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A single appended entry must come back from read_all.
async fn append_visible_in_read_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_entry("t1", AuditStatus::Started, "2026-01-01T00:00:00.000000Z"))
        .await
        .map_err(|e| e.to_string())?;

    let all = s.read_all().await.map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 entry, got {}", all.len()));
    }
    if all[0].task_id != "t1" {
        return Err(format!("expected task_id \"t1\", got \"{}\"", all[0].task_id));
    }
    Ok(())
}

/// Every scalar field must round-trip through the backend unchanged.
async fn append_preserves_all_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = make_entry("t1", AuditStatus::Executed, "2026-01-01T00:00:01.000000Z");
    s.append(entry.clone()).await.map_err(|e| e.to_string())?;

    let all = s.read_all().await.map_err(|e| e.to_string())?;
    let got = all.first().ok_or("no entries returned")?;

    if got.execution_id != entry.execution_id {
        return Err(format!("execution_id mismatch: {}", got.execution_id));
    }
    if got.stage_id != entry.stage_id {
        return Err(format!("stage_id mismatch: {}", got.stage_id));
    }
    if got.author != entry.author {
        return Err(format!("author mismatch: {}", got.author));
    }
    if got.created_at != entry.created_at {
        return Err(format!("created_at mismatch: {}", got.created_at));
    }
    if got.state != AuditStatus::Executed {
        return Err(format!("state mismatch: {}", got.state));
    }
    if got.change_name != entry.change_name {
        return Err(format!("change_name mismatch: {}", got.change_name));
    }
    if got.method_name != entry.method_name {
        return Err(format!("method_name mismatch: {}", got.method_name));
    }
    if got.execution_millis != entry.execution_millis {
        return Err(format!("execution_millis mismatch: {}", got.execution_millis));
    }
    if got.execution_hostname != entry.execution_hostname {
        return Err(format!("execution_hostname mismatch: {}", got.execution_hostname));
    }
    if got.system_change != entry.system_change {
        return Err(format!("system_change mismatch: {}", got.system_change));
    }
    if got.tx_type != AuditTxType::TxShared {
        return Err(format!("tx_type mismatch: {}", got.tx_type));
    }
    if got.target_system_id != entry.target_system_id {
        return Err(format!("target_system_id mismatch: {}", got.target_system_id));
    }
    Ok(())
}

/// An error trace must survive the round trip; None must stay None.
async fn append_preserves_error_trace<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut failed = make_entry("t1", AuditStatus::ExecutionFailed, "2026-01-01T00:00:00.000000Z");
    failed.error_trace = Some("boom: collection missing".to_string());
    s.append(failed).await.map_err(|e| e.to_string())?;
    s.append(make_entry("t2", AuditStatus::Started, "2026-01-01T00:00:01.000000Z"))
        .await
        .map_err(|e| e.to_string())?;

    let all = s.read_all().await.map_err(|e| e.to_string())?;
    match all[0].error_trace.as_deref() {
        Some("boom: collection missing") => {}
        other => return Err(format!("expected error trace, got {other:?}")),
    }
    if all[1].error_trace.is_some() {
        return Err("expected second entry to carry no error trace".to_string());
    }
    Ok(())
}

/// Opaque metadata must not be normalized, reordered into loss, or dropped.
async fn append_preserves_metadata_verbatim<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut entry = make_entry("t1", AuditStatus::Started, "2026-01-01T00:00:00.000000Z");
    entry.metadata = serde_json::json!({"ticket": "OPS-17", "attempt": 3, "tags": ["a", "b"]});
    s.append(entry.clone()).await.map_err(|e| e.to_string())?;

    let all = s.read_all().await.map_err(|e| e.to_string())?;
    if all[0].metadata != entry.metadata {
        return Err(format!("metadata mismatch: {}", all[0].metadata));
    }
    Ok(())
}

/// The log is per-transition, not per-task: one task id may appear in
/// many entries and none of them may be coalesced.
async fn same_task_may_appear_many_times<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (state, ts) in [
        (AuditStatus::Started, "2026-01-01T00:00:00.000000Z"),
        (AuditStatus::ExecutionFailed, "2026-01-01T00:00:01.000000Z"),
        (AuditStatus::RolledBack, "2026-01-01T00:00:02.000000Z"),
        (AuditStatus::Started, "2026-01-01T00:00:03.000000Z"),
        (AuditStatus::Executed, "2026-01-01T00:00:04.000000Z"),
    ] {
        s.append(make_entry("t1", state, ts)).await.map_err(|e| e.to_string())?;
    }

    let all = s.read_all().await.map_err(|e| e.to_string())?;
    if all.len() != 5 {
        return Err(format!("expected 5 entries for one task, got {}", all.len()));
    }
    Ok(())
}
