//! Allocation bitmap: one bit per physical block across the addressable
//! region (Flux + Horizon). Restyled from this lineage's bitmap
//! allocator — same "words of `AtomicUxx`, CAS to flip a bit, scan for
//! the first zero" shape — but a block is either free or occupied here;
//! there is no separate inode bitmap, since HN4 has no inodes.

use crate::core::atomic::cas_retry;
use crate::core::types::BlockIdx;
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

const BITS_PER_WORD: u64 = 64;

/// In-memory bitmap mirror, one bit per block starting at `base`. Bit
/// value `1` means occupied.
#[cfg(feature = "alloc")]
pub struct Bitmap {
    base: u64,
    bit_count: u64,
    words: Vec<AtomicU64>,
}

#[cfg(feature = "alloc")]
impl Bitmap {
    /// Build an all-clear bitmap covering `bit_count` blocks starting at
    /// physical block `base`.
    pub fn new(base: u64, bit_count: u64) -> Self {
        let word_count = bit_count.div_ceil(BITS_PER_WORD) as usize;
        let mut words = Vec::with_capacity(word_count);
        words.resize_with(word_count, || AtomicU64::new(0));
        Self { base, bit_count, words }
    }

    #[inline]
    fn split(&self, block: BlockIdx) -> Option<(usize, u32)> {
        let offset = block.get().checked_sub(self.base)?;
        if offset >= self.bit_count {
            return None;
        }
        Some((
            (offset / BITS_PER_WORD) as usize,
            (offset % BITS_PER_WORD) as u32,
        ))
    }

    pub fn is_set(&self, block: BlockIdx) -> bool {
        match self.split(block) {
            Some((w, b)) => self.words[w].load(Ordering::Acquire) & (1u64 << b) != 0,
            None => false,
        }
    }

    /// Atomically set the bit for `block`. Returns `true` if the block
    /// was free before this call (the caller won the race).
    pub fn try_set(&self, block: BlockIdx) -> bool {
        let Some((w, b)) = self.split(block) else {
            return false;
        };
        let mask = 1u64 << b;
        cas_retry(&self.words[w], |cur| {
            if cur & mask != 0 {
                None
            } else {
                Some(cur | mask)
            }
        })
        .is_some()
    }

    /// Atomically clear the bit for `block` ("eclipse" the predecessor
    /// block after a shadow-hop write commits, §4.2).
    pub fn clear(&self, block: BlockIdx) {
        let Some((w, b)) = self.split(block) else {
            return;
        };
        let mask = !(1u64 << b);
        cas_retry(&self.words[w], |cur| Some(cur & mask));
    }

    /// Scan forward from `start` (inclusive) for the first clear bit,
    /// wrapping once at the end of the covered range. Used by the
    /// Horizon ring allocator.
    pub fn find_first_clear_from(&self, start: BlockIdx) -> Option<BlockIdx> {
        let start_off = start.get().saturating_sub(self.base).min(self.bit_count);
        let total = self.bit_count;
        if total == 0 {
            return None;
        }
        for i in 0..total {
            let offset = (start_off + i) % total;
            let word_idx = (offset / BITS_PER_WORD) as usize;
            let bit = (offset % BITS_PER_WORD) as u32;
            let word = self.words[word_idx].load(Ordering::Acquire);
            if word & (1u64 << bit) == 0 {
                return Some(BlockIdx::new(self.base + offset));
            }
        }
        None
    }

    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    pub fn used_count(&self) -> u64 {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
            .sum()
    }

    /// Rebuild a bitmap from its on-disk words (mount-time load).
    pub fn from_words(base: u64, bit_count: u64, words: &[u64]) -> Self {
        let bitmap = Self::new(base, bit_count);
        for (w, &word) in bitmap.words.iter().zip(words) {
            w.store(word, Ordering::Relaxed);
        }
        bitmap
    }

    /// Snapshot the current words for persistence (unmount-time flush).
    pub fn to_words(&self) -> Vec<u64> {
        self.words.iter().map(|w| w.load(Ordering::Relaxed)).collect()
    }
}
