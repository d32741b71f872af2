use std::sync::Mutex;
use std::sync::MutexGuard;

/// Locks `lock`, taking the data back if a previous holder panicked.
pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(lock = "mutex", "recovering from poisoned lock");
        poisoned.into_inner()
    })
}
