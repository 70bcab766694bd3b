use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::lock::LockGuard;
use crate::target::TargetSystem;

/// Explicit typed dependency registry.
///
/// The external loader inserts every collaborator a change body may need
/// (clients, configuration, clocks) before the run starts. Lookups are by
/// concrete type. The registry is read-only during a run, so no task can
/// leak injected state into another.
#[derive(Default)]
pub struct Dependencies {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, dependency: T) {
        self.map.insert(TypeId::of::<T>(), Box::new(dependency));
    }

    fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }
}

/// Everything a change body is handed: task identity, the registered
/// dependencies, and the task's target system.
///
/// A fresh context is constructed for every apply and every rollback
/// invocation. Every accessor verifies the distributed lock first, so a
/// body that keeps calling after the lock is lost fails on its next
/// access instead of silently mutating the target system.
pub struct ChangeContext<'run> {
    task_id: String,
    execution_id: String,
    guard: &'run LockGuard,
    dependencies: &'run Dependencies,
    target: &'run Arc<dyn TargetSystem>,
}

impl<'run> ChangeContext<'run> {
    pub(crate) fn new(
        task_id: &str,
        execution_id: &str,
        guard: &'run LockGuard,
        dependencies: &'run Dependencies,
        target: &'run Arc<dyn TargetSystem>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            execution_id: execution_id.to_string(),
            guard,
            dependencies,
            target,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Look up a registered dependency by type, lock-guarded.
    pub fn dependency<T: Send + Sync + 'static>(&self) -> Result<&T, EngineError> {
        self.guard.ensure(&self.task_id)?;
        self.dependencies.get::<T>().ok_or_else(|| {
            EngineError::Validation(format!(
                "no dependency of type {} registered",
                std::any::type_name::<T>()
            ))
        })
    }

    /// The task's target system, lock-guarded.
    pub fn target_system(&self) -> Result<&dyn TargetSystem, EngineError> {
        self.guard.ensure(&self.task_id)?;
        Ok(self.target.as_ref())
    }
}
