use std::future::Future;

use super::{make_entry, TestResult};
use crate::entry::AuditStatus;
use crate::AuditStore;

pub(super) async fn run_order_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "order",
        "empty_store_reads_empty",
        empty_store_reads_empty(factory).await,
    ));
    results.push(TestResult::from_result(
        "order",
        "insertion_order_preserved",
        insertion_order_preserved(factory).await,
    ));
    results.push(TestResult::from_result(
        "order",
        "interleaved_tasks_keep_global_order",
        interleaved_tasks_keep_global_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "order",
        "read_all_is_repeatable",
        read_all_is_repeatable(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A fresh store must read as an empty log, not an error.
async fn empty_store_reads_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let all = s.read_all().await.map_err(|e| e.to_string())?;
    if !all.is_empty() {
        return Err(format!("expected empty log, got {} entries", all.len()));
    }
    Ok(())
}

/// Entries must come back in exactly the order they were appended.
async fn insertion_order_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for i in 0..10 {
        s.append(make_entry(
            &format!("t{i}"),
            AuditStatus::Started,
            &format!("2026-01-01T00:00:0{i}.000000Z"),
        ))
        .await
        .map_err(|e| e.to_string())?;
    }

    let ids: Vec<_> = s
        .read_all()
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| e.task_id)
        .collect();
    let expected: Vec<_> = (0..10).map(|i| format!("t{i}")).collect();
    if ids != expected {
        return Err(format!("order not preserved: {ids:?}"));
    }
    Ok(())
}

/// Interleaving two tasks must not group entries by task: the global
/// insertion order is the contract the snapshot fold depends on.
async fn interleaved_tasks_keep_global_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let sequence = [
        ("a", AuditStatus::Started, "2026-01-01T00:00:00.000000Z"),
        ("a", AuditStatus::Executed, "2026-01-01T00:00:01.000000Z"),
        ("b", AuditStatus::Started, "2026-01-01T00:00:02.000000Z"),
        ("b", AuditStatus::ExecutionFailed, "2026-01-01T00:00:03.000000Z"),
        ("b", AuditStatus::RolledBack, "2026-01-01T00:00:04.000000Z"),
    ];
    for (task, state, ts) in sequence {
        s.append(make_entry(task, state, ts)).await.map_err(|e| e.to_string())?;
    }

    let got: Vec<_> = s
        .read_all()
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| (e.task_id, e.state))
        .collect();
    let expected: Vec<_> = sequence
        .iter()
        .map(|(task, state, _)| (task.to_string(), *state))
        .collect();
    if got != expected {
        return Err(format!("interleaved order not preserved: {got:?}"));
    }
    Ok(())
}

/// Reading must not consume or reorder the log.
async fn read_all_is_repeatable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_entry("t1", AuditStatus::Started, "2026-01-01T00:00:00.000000Z"))
        .await
        .map_err(|e| e.to_string())?;
    s.append(make_entry("t1", AuditStatus::Executed, "2026-01-01T00:00:01.000000Z"))
        .await
        .map_err(|e| e.to_string())?;

    let first: Vec<_> = s
        .read_all()
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| (e.task_id, e.state))
        .collect();
    let second: Vec<_> = s
        .read_all()
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| (e.task_id, e.state))
        .collect();
    if first != second {
        return Err("two consecutive reads disagree".to_string());
    }
    if first.len() != 2 {
        return Err(format!("expected 2 entries, got {}", first.len()));
    }
    Ok(())
}
