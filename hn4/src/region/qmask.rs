//! Q-Mask: two bits of quality classification per physical block (§4.7).
//! Same CAS-word idiom as [`crate::region::bitmap`], but the mutation is
//! one-directional — a block's class only ever downgrades, never
//! upgrades, so a downgrade CAS never needs to retry against a racing
//! upgrade.

use crate::core::atomic::cas_retry;
use crate::core::types::BlockIdx;
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

const ENTRIES_PER_WORD: u64 = 32;

/// Block quality, §4.7. Ordered so `Toxic < Bronze < Silver < Gold`;
/// downgrade means moving strictly left on this line.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(u8)]
pub enum QualityClass {
    Toxic = 0b00,
    Bronze = 0b01,
    Silver = 0b10,
    Gold = 0b11,
}

impl QualityClass {
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0b00 => QualityClass::Toxic,
            0b01 => QualityClass::Bronze,
            0b10 => QualityClass::Silver,
            _ => QualityClass::Gold,
        }
    }

    pub fn bits(self) -> u64 {
        self as u64
    }

    /// The next grade down: `Gold -> Silver -> Bronze -> Toxic`, and
    /// `Toxic` stays `Toxic`.
    pub fn step_down(self) -> Self {
        match self {
            QualityClass::Gold => QualityClass::Silver,
            QualityClass::Silver => QualityClass::Bronze,
            QualityClass::Bronze | QualityClass::Toxic => QualityClass::Toxic,
        }
    }
}

#[cfg(feature = "alloc")]
pub struct QMask {
    base: u64,
    entry_count: u64,
    words: Vec<AtomicU64>,
}

#[cfg(feature = "alloc")]
impl QMask {
    /// Build a mask covering `entry_count` blocks starting at `base`,
    /// every entry initialized to [`QualityClass::Gold`].
    pub fn new(base: u64, entry_count: u64) -> Self {
        let word_count = entry_count.div_ceil(ENTRIES_PER_WORD) as usize;
        let gold_word = u64::MAX; // every 2-bit lane set to 0b11
        let mut words = Vec::with_capacity(word_count);
        words.resize_with(word_count, || AtomicU64::new(gold_word));
        Self { base, entry_count, words }
    }

    #[inline]
    fn split(&self, block: BlockIdx) -> Option<(usize, u32)> {
        let offset = block.get().checked_sub(self.base)?;
        if offset >= self.entry_count {
            return None;
        }
        Some((
            (offset / ENTRIES_PER_WORD) as usize,
            ((offset % ENTRIES_PER_WORD) * 2) as u32,
        ))
    }

    pub fn get(&self, block: BlockIdx) -> Option<QualityClass> {
        let (w, shift) = self.split(block)?;
        let word = self.words[w].load(Ordering::Acquire);
        Some(QualityClass::from_bits(word >> shift))
    }

    /// Downgrade `block` to `new_class` if `new_class` is strictly worse
    /// than its current class. Returns the class that was actually
    /// stored after the call (unchanged if `new_class` was not a
    /// downgrade, or if a racing downgrade already went further).
    pub fn downgrade(&self, block: BlockIdx, new_class: QualityClass) -> Option<QualityClass> {
        let (w, shift) = self.split(block)?;
        let mask = 0b11u64 << shift;
        cas_retry(&self.words[w], |cur| {
            let current = QualityClass::from_bits((cur >> shift) & 0b11);
            if new_class >= current {
                None
            } else {
                Some((cur & !mask) | (new_class.bits() << shift))
            }
        });
        self.get(block)
    }

    /// Step `block` down exactly one quality grade (§4.7), used when a
    /// physical write to it fails. A no-op if the block is already
    /// `Toxic` or out of range.
    pub fn downgrade_one_step(&self, block: BlockIdx) -> Option<QualityClass> {
        let current = self.get(block)?;
        self.downgrade(block, current.step_down())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Rebuild a Q-Mask from its on-disk words (mount-time load).
    pub fn from_words(base: u64, entry_count: u64, words: &[u64]) -> Self {
        let qmask = Self::new(base, entry_count);
        for (w, &word) in qmask.words.iter().zip(words) {
            w.store(word, Ordering::Relaxed);
        }
        qmask
    }

    /// Snapshot the current words for persistence (unmount-time flush).
    pub fn to_words(&self) -> Vec<u64> {
        self.words.iter().map(|w| w.load(Ordering::Relaxed)).collect()
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    #[test]
    fn starts_gold() {
        let qm = QMask::new(0, 64);
        assert_eq!(qm.get(BlockIdx::new(10)), Some(QualityClass::Gold));
    }

    #[test]
    fn downgrade_moves_one_step() {
        let qm = QMask::new(0, 64);
        let blk = BlockIdx::new(5);
        assert_eq!(qm.downgrade(blk, QualityClass::Silver), Some(QualityClass::Silver));
        assert_eq!(qm.get(blk), Some(QualityClass::Silver));
    }

    #[test]
    fn downgrade_refuses_upgrade() {
        let qm = QMask::new(0, 64);
        let blk = BlockIdx::new(5);
        qm.downgrade(blk, QualityClass::Bronze);
        qm.downgrade(blk, QualityClass::Gold);
        assert_eq!(qm.get(blk), Some(QualityClass::Bronze));
    }

    #[test]
    fn neighboring_entries_are_independent() {
        let qm = QMask::new(0, 64);
        qm.downgrade(BlockIdx::new(1), QualityClass::Toxic);
        assert_eq!(qm.get(BlockIdx::new(0)), Some(QualityClass::Gold));
        assert_eq!(qm.get(BlockIdx::new(2)), Some(QualityClass::Gold));
    }

    #[test]
    fn downgrade_one_step_moves_exactly_one_grade_at_a_time() {
        let qm = QMask::new(0, 64);
        let blk = BlockIdx::new(5);
        assert_eq!(qm.downgrade_one_step(blk), Some(QualityClass::Silver));
        assert_eq!(qm.downgrade_one_step(blk), Some(QualityClass::Bronze));
        assert_eq!(qm.downgrade_one_step(blk), Some(QualityClass::Toxic));
        assert_eq!(qm.downgrade_one_step(blk), Some(QualityClass::Toxic));
    }

    #[test]
    fn out_of_range_returns_none() {
        let qm = QMask::new(100, 10);
        assert_eq!(qm.get(BlockIdx::new(5)), None);
    }

    #[test]
    fn words_round_trip_across_mount() {
        let qm = QMask::new(0, 128);
        qm.downgrade(BlockIdx::new(5), QualityClass::Bronze);
        qm.downgrade(BlockIdx::new(100), QualityClass::Toxic);
        let words = qm.to_words();
        let reloaded = QMask::from_words(0, 128, &words);
        assert_eq!(reloaded.get(BlockIdx::new(5)), Some(QualityClass::Bronze));
        assert_eq!(reloaded.get(BlockIdx::new(100)), Some(QualityClass::Toxic));
        assert_eq!(reloaded.get(BlockIdx::new(6)), Some(QualityClass::Gold));
    }
}
