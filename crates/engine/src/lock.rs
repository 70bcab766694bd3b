use std::sync::Arc;

use tracing::warn;

use crate::error::EngineError;

/// The distributed execution lock, consumed but not implemented here.
///
/// A provider answers whether this process still holds the lock it
/// acquired before the run started (lease not expired, not taken over by
/// another instance). The check must be cheap: it runs before every
/// guarded call a change body makes.
pub trait LockProvider: Send + Sync {
    fn is_held(&self) -> bool;
}

/// Provider for deployments without multi-process concurrency.
#[derive(Debug, Default)]
pub struct AlwaysHeldLock;

impl LockProvider for AlwaysHeldLock {
    fn is_held(&self) -> bool {
        true
    }
}

/// Gate in front of everything a change body can touch.
///
/// Once the lock is lost, the next guarded call fails immediately with a
/// lock-lost error instead of mutating a target system this process no
/// longer has authority over. The failure flows through the ordinary
/// EXECUTION_FAILED path of the task state machine.
pub struct LockGuard {
    provider: Arc<dyn LockProvider>,
}

impl LockGuard {
    pub fn new(provider: Arc<dyn LockProvider>) -> Self {
        Self { provider }
    }

    /// Verify the lock is still held before forwarding a guarded call.
    pub fn ensure(&self, task_id: &str) -> Result<(), EngineError> {
        if self.provider.is_held() {
            Ok(())
        } else {
            warn!(task_id, "execution lock lost, refusing further guarded calls");
            Err(EngineError::LockLost {
                task_id: task_id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlippableLock(AtomicBool);

    impl LockProvider for FlippableLock {
        fn is_held(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn ensure_passes_while_lock_held() {
        let guard = LockGuard::new(Arc::new(AlwaysHeldLock));
        assert!(guard.ensure("t1").is_ok());
    }

    #[test]
    fn ensure_fails_once_lock_lost() {
        let provider = Arc::new(FlippableLock(AtomicBool::new(true)));
        let guard = LockGuard::new(Arc::clone(&provider) as Arc<dyn LockProvider>);
        assert!(guard.ensure("t1").is_ok());

        provider.0.store(false, Ordering::SeqCst);
        let err = guard.ensure("t1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockLost);
        assert!(err.to_string().contains("t1"));
    }
}
