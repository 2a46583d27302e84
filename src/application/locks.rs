use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::scope::Scope;

/// One async mutex per scope currently being refreshed in this process.
#[derive(Clone, Default)]
pub struct ScopeLocks {
    scopes: Arc<DashMap<Scope, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `scope` remains.
    pub async fn acquire(&self, scope: &Scope) -> ScopeGuard {
        let lock = Arc::clone(self.scopes.entry(scope.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        ScopeGuard {
            scope: scope.clone(),
            scopes: Arc::clone(&self.scopes),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

pub struct ScopeGuard {
    scope: Scope,
    scopes: Arc<DashMap<Scope, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.guard.take();
        // only the map still holds the mutex: nobody is waiting
        self.scopes
            .remove_if(&self.scope, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_scope_is_serialized() {
        let locks = ScopeLocks::new();
        let scope = Scope::new("example", "hour");

        let first = locks.acquire(&scope).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&scope)).await;
        assert!(waiting.is_err(), "second holder must wait");

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&scope))
            .await
            .expect("lock released");
        drop(second);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_scopes_do_not_block() {
        let locks = ScopeLocks::new();
        let _hour = locks.acquire(&Scope::new("example", "hour")).await;
        let _quarter = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&Scope::new("example", "hour").with_channel("quarter")),
        )
        .await
        .expect("independent scope");

        assert_eq!(locks.len(), 2);
    }
}
