// src/sync.rs
//
// Publish-once atomic cells backing the lazy resolution caches.
//
// Uses a compare-and-swap discipline instead of locks: racing writers may
// both compute a value, but exactly one publication wins and the loser's
// value is dropped without ever becoming observable. Readers either see
// "not yet resolved" or a fully-formed value, never a torn one.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A single-assignment cell.
///
/// `publish` installs a value with a compare-exchange; the first writer
/// wins and every later `get` observes that same value for the lifetime of
/// the cell. Duplicate computation between racing writers is an accepted
/// trade-off of the lock-free contract, duplicate *results* are not.
pub struct OnceSlot<T> {
    cell: AtomicPtr<T>,
}

// Safety: the cell owns at most one heap value, installed by a release CAS
// and read via acquire loads; it is never replaced or freed before drop.
unsafe impl<T: Send> Send for OnceSlot<T> {}
unsafe impl<T: Send + Sync> Sync for OnceSlot<T> {}

impl<T> OnceSlot<T> {
    pub const fn new() -> Self {
        Self {
            cell: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Returns the published value, or None if nothing has been published.
    pub fn get(&self) -> Option<&T> {
        let ptr = self.cell.load(Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }
        // Safety: non-null means a fully constructed value was installed by
        // `publish` and stays alive until the slot is dropped.
        Some(unsafe { &*ptr })
    }

    /// Publishes `value` if the slot is still empty and returns whichever
    /// value ended up installed. A losing racer's value is dropped here,
    /// unobserved.
    pub fn publish(&self, value: T) -> &T {
        let fresh = Box::into_raw(Box::new(value));
        match self.cell.compare_exchange(
            ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            // Safety: we just installed `fresh`; it is never removed before drop.
            Ok(_) => unsafe { &*fresh },
            Err(winner) => {
                // Lost the publication race. Reclaim our box and hand out
                // the winner's value.
                // Safety: `fresh` came from Box::into_raw above and was not
                // installed; `winner` is non-null and owned by the cell.
                unsafe {
                    drop(Box::from_raw(fresh));
                    &*winner
                }
            }
        }
    }

    /// Returns the published value, computing and publishing one if the slot
    /// is empty. The closure may run on several threads at once; only one
    /// result survives.
    pub fn get_or_publish(&self, init: impl FnOnce() -> T) -> &T {
        match self.get() {
            Some(value) => value,
            None => self.publish(init()),
        }
    }

    pub fn is_set(&self) -> bool {
        !self.cell.load(Ordering::Acquire).is_null()
    }
}

impl<T> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceSlot<T> {
    fn drop(&mut self) {
        let ptr = *self.cell.get_mut();
        if !ptr.is_null() {
            // Safety: exclusive access; the pointer was produced by
            // Box::into_raw in `publish`.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("OnceSlot").field(value).finish(),
            None => f.write_str("OnceSlot(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn empty_slot_reads_none() {
        let slot: OnceSlot<u32> = OnceSlot::new();
        assert_eq!(slot.get(), None);
        assert!(!slot.is_set());
    }

    #[test]
    fn first_publish_wins() {
        let slot = OnceSlot::new();
        assert_eq!(*slot.publish(1), 1);
        assert_eq!(*slot.publish(2), 1);
        assert_eq!(slot.get(), Some(&1));
    }

    #[test]
    fn losing_value_is_dropped() {
        let slot = OnceSlot::new();
        let winner = Arc::new(());
        let loser = Arc::new(());

        slot.publish(Arc::clone(&winner));
        slot.publish(Arc::clone(&loser));

        // The loser's clone must have been reclaimed by the losing publish.
        assert_eq!(Arc::strong_count(&loser), 1);
        assert_eq!(Arc::strong_count(&winner), 2);
    }

    #[test]
    fn get_or_publish_runs_init_once_sequentially() {
        let slot = OnceSlot::new();
        let mut calls = 0;
        slot.get_or_publish(|| {
            calls += 1;
            7u32
        });
        assert_eq!(*slot.get_or_publish(|| unreachable!()), 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn racing_publishers_agree_on_one_value() {
        let slot = Arc::new(OnceSlot::new());
        let mut handles = Vec::new();

        for value in 0..8u64 {
            let slot = Arc::clone(&slot);
            handles.push(thread::spawn(move || *slot.publish(value)));
        }

        let observed: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = *slot.get().unwrap();
        assert!(observed.iter().all(|&v| v == winner));
    }

    #[test]
    fn drop_reclaims_published_value() {
        let tracked = Arc::new(());
        {
            let slot = OnceSlot::new();
            slot.publish(Arc::clone(&tracked));
            assert_eq!(Arc::strong_count(&tracked), 2);
        }
        assert_eq!(Arc::strong_count(&tracked), 1);
    }
}
