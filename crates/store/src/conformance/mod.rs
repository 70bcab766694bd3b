//! Conformance test suite for `AuditStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `AuditStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Append**: appended entries become visible, with every field
//!   preserved verbatim
//! - **Order**: `read_all` preserves insertion order, including
//!   interleaved tasks
//! - **Append-only**: reads are repeatable and entry counts only grow
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty store instance for each test:
//!
//! ```ignore
//! use drover_store::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod append;
mod order;

use std::fmt;
use std::future::Future;

use crate::entry::{AuditEntry, AuditStatus, AuditTxType, ExecutionType};
use crate::AuditStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "append", "order").
    pub category: String,
    /// Test name (e.g. "append_visible_in_read_all").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against an audit store backend.
///
/// The `factory` function is called once per test to create a fresh,
/// empty store instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: AuditStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(append::run_append_tests(&factory).await);
    results.extend(order::run_order_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: entry constructor with sensible defaults ────────────────────────

fn make_entry(task_id: &str, state: AuditStatus, created_at: &str) -> AuditEntry {
    AuditEntry {
        execution_id: "conf-exec".to_string(),
        stage_id: "conf-stage".to_string(),
        task_id: task_id.to_string(),
        author: "conformance".to_string(),
        created_at: created_at.to_string(),
        state,
        execution_type: ExecutionType::Execution,
        change_name: "conformance-change".to_string(),
        method_name: "apply".to_string(),
        execution_millis: 42,
        execution_hostname: "conf-host".to_string(),
        metadata: serde_json::json!({"suite": "conformance"}),
        system_change: false,
        error_trace: None,
        tx_type: AuditTxType::TxShared,
        target_system_id: "conf-target".to_string(),
    }
}
