//! End-to-end execution flow: audit sequences for fresh pipelines,
//! transactional and manual rollback paths, ordering, and lock loss.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use drover_engine::{ErrorKind, Pipeline, Task};
use drover_store::{AuditStatus, AuditStore, AuditTxType, InMemoryAuditStore};
use support::*;

#[tokio::test]
async fn strict_sequence_of_two_fresh_tasks() {
    let store = Arc::new(InMemoryAuditStore::new());
    let mongo = Arc::new(MockTxTarget::new("mongo", false, true));
    let effects = EffectLog::default();

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(mongo.clone() as Arc<dyn drover_engine::TargetSystem>)
        .dependency(effects.clone())
        .task(
            Task::new(
                "create-collection",
                1,
                "dev",
                "mongo",
                Arc::new(OkChange::new("create-collection")),
            )
            .non_transactional(),
        )
        .task(Task::new(
            "insert-doc",
            2,
            "dev",
            "mongo",
            Arc::new(OkChange::new("insert-doc")),
        ))
        .build()
        .unwrap();

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.applied(), 2);
    assert_eq!(summary.skipped(), 0);

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("create-collection".to_string(), AuditStatus::Started),
            ("create-collection".to_string(), AuditStatus::Executed),
            ("insert-doc".to_string(), AuditStatus::Started),
            ("insert-doc".to_string(), AuditStatus::Executed),
        ]
    );

    // txType reflects how each task actually ran.
    assert_eq!(log[0].tx_type, AuditTxType::NonTx);
    assert_eq!(log[1].tx_type, AuditTxType::NonTx);
    assert_eq!(log[2].tx_type, AuditTxType::TxSeparateWithMarker);
    assert_eq!(log[3].tx_type, AuditTxType::TxSeparateWithMarker);

    // The transactional task registered its marker and cleared it inside
    // the committed transaction.
    assert_eq!(mongo.probe.committed.load(Ordering::SeqCst), 1);
    assert_eq!(*mongo.probe.registered.lock().unwrap(), vec!["insert-doc"]);
    assert_eq!(*mongo.probe.cleaned.lock().unwrap(), vec!["insert-doc"]);

    assert_eq!(
        effects.entries(),
        vec!["create-collection:applied", "insert-doc:applied"]
    );
}

#[tokio::test]
async fn all_entries_of_an_earlier_task_precede_a_later_one() {
    let store = Arc::new(InMemoryAuditStore::new());
    let target = Arc::new(PlainTarget::new("db"));

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(target as Arc<dyn drover_engine::TargetSystem>)
        .dependency(EffectLog::default())
        .tasks((1..=3).map(|i| {
            Task::new(
                format!("t{i}"),
                i,
                "dev",
                "db",
                Arc::new(OkChange::new(&format!("t{i}"))),
            )
        }))
        .build()
        .unwrap();

    pipeline.run().await.unwrap();

    let log = store.read_all().await.unwrap();
    let position = |task: &str| {
        log.iter()
            .enumerate()
            .filter(|(_, e)| e.task_id == task)
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
    };
    let (t1, t2, t3) = (position("t1"), position("t2"), position("t3"));
    assert!(t1.iter().max() < t2.iter().min());
    assert!(t2.iter().max() < t3.iter().min());
}

#[tokio::test]
async fn failing_transactional_task_is_auto_rolled_back() {
    let store = Arc::new(InMemoryAuditStore::new());
    let target = Arc::new(MockTxTarget::new("mongo", false, true));

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(target.clone() as Arc<dyn drover_engine::TargetSystem>)
        .dependency(EffectLog::default())
        .task(Task::new(
            "bad-insert",
            1,
            "dev",
            "mongo",
            Arc::new(FailingChange::new("bad-insert")),
        ))
        .build()
        .unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("bad-insert"));

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("bad-insert".to_string(), AuditStatus::Started),
            ("bad-insert".to_string(), AuditStatus::ExecutionFailed),
            ("bad-insert".to_string(), AuditStatus::RolledBack),
        ]
    );
    assert_eq!(
        log[1].error_trace.as_deref(),
        Some("bad-insert: apply exploded")
    );

    // The boundary discarded the effects; no commit happened and the
    // marker was never cleared.
    assert_eq!(target.probe.committed.load(Ordering::SeqCst), 0);
    assert_eq!(target.probe.rolled_back.load(Ordering::SeqCst), 1);
    assert!(target.probe.cleaned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_non_tx_task_without_rollback_stops_at_execution_failed() {
    let store = Arc::new(InMemoryAuditStore::new());

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
        .dependency(EffectLog::default())
        .task(Task::new(
            "no-inverse",
            1,
            "dev",
            "db",
            Arc::new(FailingChange::new("no-inverse")),
        ))
        .build()
        .unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("no-inverse".to_string(), AuditStatus::Started),
            ("no-inverse".to_string(), AuditStatus::ExecutionFailed),
        ]
    );
}

#[tokio::test]
async fn failing_non_tx_task_with_rollback_is_rolled_back_manually() {
    let store = Arc::new(InMemoryAuditStore::new());
    let effects = EffectLog::default();

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
        .dependency(effects.clone())
        .task(Task::new(
            "undoable",
            1,
            "dev",
            "db",
            Arc::new(FailingChange::new("undoable").with_rollback()),
        ))
        .build()
        .unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("undoable".to_string(), AuditStatus::Started),
            ("undoable".to_string(), AuditStatus::ExecutionFailed),
            ("undoable".to_string(), AuditStatus::RolledBack),
        ]
    );
    assert_eq!(effects.entries(), vec!["undoable:rolled-back"]);
}

#[tokio::test]
async fn failing_rollback_is_audited_as_rollback_failed() {
    let store = Arc::new(InMemoryAuditStore::new());

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
        .dependency(EffectLog::default())
        .task(Task::new(
            "doubly-bad",
            1,
            "dev",
            "db",
            Arc::new(FailingChange::new("doubly-bad").rollback_fails()),
        ))
        .build()
        .unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rollback);

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("doubly-bad".to_string(), AuditStatus::Started),
            ("doubly-bad".to_string(), AuditStatus::ExecutionFailed),
            ("doubly-bad".to_string(), AuditStatus::RollbackFailed),
        ]
    );
    assert_eq!(
        log[2].error_trace.as_deref(),
        Some("doubly-bad: rollback exploded")
    );
}

#[tokio::test]
async fn lock_lost_mid_task_becomes_an_ordinary_execution_failure() {
    let store = Arc::new(InMemoryAuditStore::new());
    let held = Arc::new(AtomicBool::new(true));

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
        .lock_provider(Arc::new(FlagLock(held.clone())))
        .dependency(EffectLog::default())
        .task(Task::new(
            "greedy",
            1,
            "dev",
            "db",
            Arc::new(LockDropChange::new("greedy", held.clone())),
        ))
        .build()
        .unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let log = store.read_all().await.unwrap();
    assert_eq!(
        states(&log),
        vec![
            ("greedy".to_string(), AuditStatus::Started),
            ("greedy".to_string(), AuditStatus::ExecutionFailed),
        ]
    );
    assert!(log[1]
        .error_trace
        .as_deref()
        .unwrap()
        .contains("lock no longer held"));
}

#[tokio::test]
async fn first_failure_stops_the_run_before_later_tasks() {
    let store = Arc::new(InMemoryAuditStore::new());

    let pipeline = Pipeline::builder()
        .store(store.clone() as Arc<dyn AuditStore>)
        .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
        .dependency(EffectLog::default())
        .task(Task::new(
            "breaks",
            1,
            "dev",
            "db",
            Arc::new(FailingChange::new("breaks")),
        ))
        .task(Task::new(
            "never-runs",
            2,
            "dev",
            "db",
            Arc::new(OkChange::new("never-runs")),
        ))
        .build()
        .unwrap();

    pipeline.run().await.unwrap_err();

    let log = store.read_all().await.unwrap();
    assert!(log.iter().all(|e| e.task_id == "breaks"));
}

#[tokio::test]
async fn validation_rejects_duplicate_ids_orders_and_unknown_targets() {
    let base = || {
        Pipeline::builder()
            .store(Arc::new(InMemoryAuditStore::new()) as Arc<dyn AuditStore>)
            .target_system(Arc::new(PlainTarget::new("db")) as Arc<dyn drover_engine::TargetSystem>)
    };
    let ok = |id: &str, order: u32| Task::new(id, order, "dev", "db", Arc::new(OkChange::new(id)));

    let dup = base()
        .task(ok("t1", 1))
        .task(ok("t1", 2))
        .build()
        .unwrap();
    let err = dup.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("duplicate"));

    let unordered = base()
        .task(ok("t1", 2))
        .task(ok("t2", 2))
        .build()
        .unwrap();
    let err = unordered.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("strictly increasing"));

    let unknown = base()
        .task(Task::new("t1", 1, "dev", "elsewhere", Arc::new(OkChange::new("t1"))))
        .build()
        .unwrap();
    let err = unknown.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("unknown target system"));

    let err = Pipeline::builder().build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
