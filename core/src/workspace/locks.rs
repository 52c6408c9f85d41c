use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per file path. Holding the guard is the right to
/// read-correct-write that file.
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only the table still references are idle.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(path.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Paths with a holder or a waiter.
    pub fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}
