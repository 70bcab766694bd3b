//! Shared mocks for the pipeline integration tests: scripted change
//! bodies, a plain and a transactional mock target system, and audit
//! entry seeding for pre-existing history.

// Each integration test binary compiles this module separately and uses
// a different subset of it.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use drover_engine::{
    BoxFuture, ChangeContext, ChangeUnit, DynError, LockProvider, TargetSystem, Transactional,
    TxOutcome, TxVerdict,
};
use drover_store::{AuditEntry, AuditStatus, AuditTxType, ExecutionType};

// ── Dependencies ──────────────────────────────────────────────────────────────

/// Run-scoped effect sink change bodies append to; tests keep a clone.
#[derive(Clone, Default)]
pub struct EffectLog(pub Arc<Mutex<Vec<String>>>);

impl EffectLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ── Lock providers ────────────────────────────────────────────────────────────

pub struct FlagLock(pub Arc<AtomicBool>);

impl LockProvider for FlagLock {
    fn is_held(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Target systems ────────────────────────────────────────────────────────────

/// Non-transactional target system.
pub struct PlainTarget {
    id: String,
}

impl PlainTarget {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl TargetSystem for PlainTarget {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Counters and marker history recorded by [`MockTxTarget`].
#[derive(Default)]
pub struct TxProbe {
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
    pub registered: Mutex<Vec<String>>,
    pub cleaned: Mutex<Vec<String>>,
}

/// Transactional target system whose wrapper honors the body's verdict
/// and records what the boundary did.
pub struct MockTxTarget {
    id: String,
    shared: bool,
    markers: bool,
    pub probe: Arc<TxProbe>,
}

impl MockTxTarget {
    pub fn new(id: &str, shared: bool, markers: bool) -> Self {
        Self {
            id: id.to_string(),
            shared,
            markers,
            probe: Arc::new(TxProbe::default()),
        }
    }
}

impl TargetSystem for MockTxTarget {
    fn id(&self) -> &str {
        &self.id
    }

    fn transactional(&self) -> Option<&dyn Transactional> {
        Some(self)
    }
}

#[async_trait]
impl Transactional for MockTxTarget {
    fn shares_audit_store(&self) -> bool {
        self.shared
    }

    fn supports_markers(&self) -> bool {
        self.markers
    }

    async fn wrap_in_transaction(
        &self,
        _task_id: &str,
        body: BoxFuture<'_, TxVerdict>,
    ) -> Result<TxOutcome, DynError> {
        match body.await {
            TxVerdict::Commit => {
                self.probe.committed.fetch_add(1, Ordering::SeqCst);
                Ok(TxOutcome::Committed)
            }
            TxVerdict::Rollback => {
                self.probe.rolled_back.fetch_add(1, Ordering::SeqCst);
                Ok(TxOutcome::RolledBack)
            }
        }
    }

    async fn register_as_executing(&self, task_id: &str) -> Result<(), DynError> {
        self.probe.registered.lock().unwrap().push(task_id.to_string());
        Ok(())
    }

    async fn clean(&self, task_id: &str) -> Result<(), DynError> {
        self.probe.cleaned.lock().unwrap().push(task_id.to_string());
        Ok(())
    }
}

// ── Change bodies ─────────────────────────────────────────────────────────────

/// Change that succeeds and records its application in the effect log.
pub struct OkChange {
    name: String,
}

impl OkChange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ChangeUnit for OkChange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: &ChangeContext<'_>) -> Result<(), DynError> {
        let log = ctx.dependency::<EffectLog>()?;
        log.0.lock().unwrap().push(format!("{}:applied", self.name));
        Ok(())
    }
}

/// Change whose apply always fails; rollback behavior is scripted.
pub struct FailingChange {
    name: String,
    with_rollback: bool,
    rollback_fails: bool,
}

impl FailingChange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            with_rollback: false,
            rollback_fails: false,
        }
    }

    pub fn with_rollback(mut self) -> Self {
        self.with_rollback = true;
        self
    }

    pub fn rollback_fails(mut self) -> Self {
        self.with_rollback = true;
        self.rollback_fails = true;
        self
    }
}

#[async_trait]
impl ChangeUnit for FailingChange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, _ctx: &ChangeContext<'_>) -> Result<(), DynError> {
        Err(format!("{}: apply exploded", self.name).into())
    }

    fn provides_rollback(&self) -> bool {
        self.with_rollback
    }

    async fn rollback(&self, ctx: &ChangeContext<'_>) -> Result<(), DynError> {
        if self.rollback_fails {
            return Err(format!("{}: rollback exploded", self.name).into());
        }
        let log = ctx.dependency::<EffectLog>()?;
        log.0.lock().unwrap().push(format!("{}:rolled-back", self.name));
        Ok(())
    }
}

/// Change that loses the distributed lock mid-body: its next guarded
/// context access fails and the error propagates out of apply.
pub struct LockDropChange {
    name: String,
    flag: Arc<AtomicBool>,
}

impl LockDropChange {
    pub fn new(name: &str, flag: Arc<AtomicBool>) -> Self {
        Self {
            name: name.to_string(),
            flag,
        }
    }
}

#[async_trait]
impl ChangeUnit for LockDropChange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: &ChangeContext<'_>) -> Result<(), DynError> {
        self.flag.store(false, Ordering::SeqCst);
        ctx.dependency::<EffectLog>()?;
        Ok(())
    }
}

// ── Audit helpers ─────────────────────────────────────────────────────────────

/// A pre-existing entry from an earlier (interrupted) run.
pub fn seed_entry(task_id: &str, state: AuditStatus, tx_type: AuditTxType) -> AuditEntry {
    AuditEntry {
        execution_id: "previous-exec".to_string(),
        stage_id: "main".to_string(),
        task_id: task_id.to_string(),
        author: "tester".to_string(),
        created_at: "2025-12-31T23:59:59.000000Z".to_string(),
        state,
        execution_type: ExecutionType::Execution,
        change_name: format!("{task_id}-change"),
        method_name: "apply".to_string(),
        execution_millis: 5,
        execution_hostname: "previous-host".to_string(),
        metadata: serde_json::Value::Null,
        system_change: false,
        error_trace: None,
        tx_type,
        target_system_id: "mock".to_string(),
    }
}

/// Project the log to (task id, state) pairs for sequence assertions.
pub fn states(entries: &[AuditEntry]) -> Vec<(String, AuditStatus)> {
    entries
        .iter()
        .map(|e| (e.task_id.clone(), e.state))
        .collect()
}
