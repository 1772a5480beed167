//! Whole-value snapshot swapping for lock-free-in-practice reads.

use std::sync::{Arc, RwLock};

/// Holds the current in-memory snapshot.
///
/// Readers clone an `Arc` and never observe a partially built value; writers
/// replace the whole value. The inner lock is held only for the pointer
/// copy, never across I/O.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the snapshot, returning the previous one.
    pub fn store(&self, next: T) -> Arc<T> {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_keep_their_snapshot_across_store() {
        let cell = SnapshotCell::new(vec![1, 2, 3]);
        let before = cell.load();

        let previous = cell.store(vec![4]);

        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*previous, vec![1, 2, 3]);
        assert_eq!(*cell.load(), vec![4]);
    }

    #[test]
    fn test_default_starts_empty() {
        let cell: SnapshotCell<Vec<u8>> = SnapshotCell::default();
        assert!(cell.load().is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let cell = Arc::new(SnapshotCell::new(vec![0u32; 64]));

        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 1..200u32 {
                    cell.store(vec![i; 64]);
                }
            })
        };

        for _ in 0..200 {
            let snap = cell.load();
            let first = snap[0];
            assert!(snap.iter().all(|&v| v == first));
        }
        writer.join().unwrap();
    }
}
