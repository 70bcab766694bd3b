use async_trait::async_trait;

use crate::entry::AuditEntry;
use crate::error::StoreError;

/// The storage trait for drover audit backends.
///
/// An `AuditStore` implementation provides durable, append-only storage
/// for [`AuditEntry`] records. The log is the sole source of truth for
/// recovery: after a crash or restart the engine folds `read_all` into a
/// per-task snapshot and resumes from there.
///
/// ## Ordering
///
/// `read_all` MUST return entries in insertion order (or in an order
/// fully reconstructed from creation timestamps, which amounts to the
/// same contract). The engine's snapshot fold takes the last entry per
/// task id as that task's current state, so a backend that reorders
/// entries corrupts recovery.
///
/// ## Append-only
///
/// `append` never overwrites. Backends must not deduplicate, coalesce,
/// or garbage-collect entries.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` so a store can be
/// shared across the engine and embedding application.
#[async_trait]
pub trait AuditStore: Send + Sync + 'static {
    /// Append one entry to the log.
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Read the full log in insertion order.
    async fn read_all(&self) -> Result<Vec<AuditEntry>, StoreError>;
}
