//! Bounded working-directory slots
//!
//! The engine is a stateful external process reading and writing named
//! files; two invocations sharing a directory corrupt each other. The pool
//! hands out numbered directories with explicit checkout/release: checkout
//! blocks until a slot is free, and a [`Slot`] returns itself to the pool
//! when dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use hydrocal_core::EngineError;
use tracing::debug;

struct PoolInner {
    free: Mutex<Vec<usize>>,
    released: Condvar,
}

/// A bounded rotation of engine working directories under one base path.
///
/// Cloning shares the pool; the slot directories are `<base>/0`, `<base>/1`
/// and so on, created lazily on first checkout.
#[derive(Clone)]
pub struct SlotPool {
    base: PathBuf,
    inner: Arc<PoolInner>,
}

impl SlotPool {
    pub fn new(base: &Path, size: usize) -> Self {
        let size = size.max(1);
        Self {
            base: base.to_path_buf(),
            inner: Arc::new(PoolInner {
                free: Mutex::new((0..size).collect()),
                released: Condvar::new(),
            }),
        }
    }

    /// Check out a free slot, blocking until one is released.
    pub fn checkout(&self) -> Result<Slot, EngineError> {
        let index = {
            let mut free = self
                .inner
                .free
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            loop {
                if let Some(index) = free.pop() {
                    break index;
                }
                free = self
                    .inner
                    .released
                    .wait(free)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        let dir = self.base.join(index.to_string());
        if let Err(err) = fs::create_dir_all(&dir) {
            // hand the slot back before surfacing the error
            self.release(index);
            return Err(EngineError::Io(err));
        }
        debug!(slot = index, dir = %dir.display(), "slot checked out");
        Ok(Slot {
            index,
            dir,
            inner: Arc::clone(&self.inner),
        })
    }

    fn release(&self, index: usize) {
        release(&self.inner, index);
    }
}

fn release(inner: &PoolInner, index: usize) {
    inner
        .free
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(index);
    inner.released.notify_one();
}

/// An exclusively-held working directory, released on drop.
pub struct Slot {
    index: usize,
    dir: PathBuf,
    inner: Arc<PoolInner>,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        release(&self.inner, self.index);
        debug!(slot = self.index, "slot released");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;

    #[test]
    fn checkout_creates_the_slot_directory() {
        let base = tempfile::tempdir().unwrap();
        let pool = SlotPool::new(base.path(), 3);

        let slot = pool.checkout().unwrap();
        assert!(slot.dir().is_dir());
        assert!(slot.dir().ends_with(slot.index().to_string()));
    }

    #[test]
    fn no_two_live_checkouts_share_a_slot() {
        let base = tempfile::tempdir().unwrap();
        let pool = SlotPool::new(base.path(), 2);

        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        assert_ne!(a.index(), b.index());

        // the pool is exhausted; releasing one unblocks the next checkout
        drop(a);
        let c = pool.checkout().unwrap();
        assert_ne!(b.index(), c.index());
    }

    #[test]
    fn concurrent_checkouts_never_overlap() {
        let base = tempfile::tempdir().unwrap();
        let pool = SlotPool::new(base.path(), 2);
        let in_use = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let in_use = Arc::clone(&in_use);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let slot = pool.checkout().unwrap();
                        assert!(in_use.lock().unwrap().insert(slot.index()));
                        assert!(in_use.lock().unwrap().remove(&slot.index()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
