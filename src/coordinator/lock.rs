use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Serializes backup and restore against each other and against cooperating
/// database writers.
///
/// Clones share the same underlying lock. The embedding application creates
/// one at startup, hands it to the coordinator and keeps a clone to hold
/// around its own database writes.
#[derive(Debug, Clone, Default)]
pub struct BackupLock {
    inner: Arc<Mutex<()>>,
}

/// Exclusive possession of a [`BackupLock`]. Released on drop.
#[derive(Debug)]
pub struct BackupGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl BackupLock {
    /// Creates a new, released lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is acquired.
    ///
    /// A holder that panicked leaves nothing inconsistent behind, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn acquire(&self) -> BackupGuard<'_> {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Backup lock was poisoned by a panicked holder, recovering");
                poisoned.into_inner()
            }
        };
        BackupGuard { _guard: guard }
    }

    /// Acquires the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<BackupGuard<'_>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(BackupGuard { _guard: guard }),
            Err(TryLockError::Poisoned(poisoned)) => Some(BackupGuard {
                _guard: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Returns true if `other` is a clone of this lock.
    pub fn same_lock(&self, other: &BackupLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Tests that a held lock cannot be acquired again until released.
    #[test]
    fn test_try_acquire_while_held() {
        let lock = BackupLock::new();
        let guard = lock.acquire();
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(lock.try_acquire().is_some());
    }

    /// Tests that clones share the lock and separate locks do not.
    #[test]
    fn test_clones_share_state() {
        let lock = BackupLock::new();
        let clone = lock.clone();
        let other = BackupLock::new();

        assert!(lock.same_lock(&clone));
        assert!(!lock.same_lock(&other));

        let _guard = clone.acquire();
        assert!(lock.try_acquire().is_none());
        assert!(other.try_acquire().is_some());
    }

    /// Tests that a second thread blocks until the holder releases.
    #[test]
    fn test_acquire_blocks_other_thread() {
        let lock = BackupLock::new();
        let released = Arc::new(AtomicBool::new(false));

        let guard = lock.acquire();
        let handle = {
            let lock = lock.clone();
            let released = released.clone();
            thread::spawn(move || {
                let _guard = lock.acquire();
                released.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(100));
        released.store(true, Ordering::SeqCst);
        drop(guard);

        assert!(
            handle.join().unwrap(),
            "Second holder acquired the lock before the first released it"
        );
    }

    /// Tests that a panicking holder does not make the lock unusable.
    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = BackupLock::new();
        let poisoner = lock.clone();

        let result = thread::spawn(move || {
            let _guard = poisoner.acquire();
            panic!("poison backup lock");
        })
        .join();
        assert!(result.is_err(), "Expected the holder to panic");

        assert!(lock.try_acquire().is_some());
        let _guard = lock.acquire();
    }
}
