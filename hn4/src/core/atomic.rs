//! Small atomic helpers shared by the region layer. Bitmap and Q-Mask
//! words are updated with compare-and-swap loops rather than a coarse
//! lock (§5); this module holds the one CAS-retry idiom they both use,
//! plus a relaxed monotonic counter wrapper for the volume's informational
//! statistics (used blocks, CRC failures, taint).

use core::sync::atomic::{AtomicU64, Ordering};

/// A spinlock-guarded value, re-exported from `spin` at the type level so
/// call sites don't need to depend on `spin` directly. Used for state that
/// genuinely needs mutual exclusion across a multi-step update (the epoch
/// ring advance is single-writer and serialized by the caller per §5, but
/// the in-memory nano-cortex eviction path still wants a lock around its
/// small hash map).
pub type SpinMutex<T> = spin::Mutex<T>;
pub type SpinRwLock<T> = spin::RwLock<T>;

/// A relaxed `u64` counter. Every field on [`crate::volume::VolumeStats`]
/// is one of these: independent, lock-free, read with a relaxed load as
/// the spec requires for test inspection (§5).
#[derive(Default)]
#[repr(transparent)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, v: u64) {
        self.0.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed)
    }

    #[inline]
    pub fn sub(&self, n: u64) -> u64 {
        self.0.fetch_sub(n, Ordering::Relaxed)
    }
}

/// Retry `f` against `cell` until it either succeeds or `f` itself decides
/// to give up (by returning `None`). `f` receives the last-observed value
/// and returns the value to attempt storing.
///
/// This is the one CAS-retry idiom the bitmap and Q-Mask words both need:
/// load, compute a new word, `compare_exchange_weak`, retry on conflict.
#[inline]
pub fn cas_retry(cell: &AtomicU64, mut f: impl FnMut(u64) -> Option<u64>) -> Option<u64> {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let desired = f(current)?;
        match cell.compare_exchange_weak(current, desired, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(prev) => return Some(prev),
            Err(observed) => current = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_basic_ops() {
        let c = Counter::new();
        assert_eq!(c.get(), 0);
        c.incr();
        c.add(5);
        assert_eq!(c.get(), 6);
        c.sub(2);
        assert_eq!(c.get(), 4);
    }

    #[test]
    fn cas_retry_applies_update_once() {
        let word = AtomicU64::new(0b0000);
        let prev = cas_retry(&word, |cur| Some(cur | 0b0010));
        assert_eq!(prev, Some(0b0000));
        assert_eq!(word.load(Ordering::Relaxed), 0b0010);
    }

    #[test]
    fn cas_retry_can_abstain() {
        let word = AtomicU64::new(0b1111);
        let prev = cas_retry(&word, |cur| if cur == 0 { Some(1) } else { None });
        assert_eq!(prev, None);
        assert_eq!(word.load(Ordering::Relaxed), 0b1111);
    }
}
