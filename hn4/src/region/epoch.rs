//! The epoch ring (§2, §4.8): a small ring of monotonically numbered
//! records that seeds the crash-generation counter at mount. Restyled
//! from this lineage's write-ahead-log writer/scanner idiom — same
//! "ring of sequence-numbered records, scan for the highest valid one"
//! shape — but this is explicitly *not* a journal: no operation is ever
//! replayed from it, it only answers "what epoch did we last reach".

use crate::core::hash::header_crc;
use crate::core::types::ClockNs;

pub const EPOCH_RECORD_BYTES: usize = 24;
const EPOCH_MAGIC: u32 = 0x45_50_30_31; // "EP01"

/// One slot's contents: an epoch id, the wall-clock time it was sealed,
/// and a checksum over both.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EpochRecord {
    pub epoch_id: u64,
    pub sealed_at: ClockNs,
}

impl EpochRecord {
    pub fn to_bytes(self) -> [u8; EPOCH_RECORD_BYTES] {
        let mut buf = [0u8; EPOCH_RECORD_BYTES];
        buf[0..4].copy_from_slice(&EPOCH_MAGIC.to_le_bytes());
        buf[4..12].copy_from_slice(&self.epoch_id.to_le_bytes());
        buf[12..20].copy_from_slice(&self.sealed_at.get().to_le_bytes());
        let crc = header_crc(&buf[0..20]);
        buf[20..24].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Parse and validate a slot. A slot that was never written (all
    /// zero) or that fails its checksum is not a record at all.
    pub fn from_bytes(buf: &[u8; EPOCH_RECORD_BYTES]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != EPOCH_MAGIC {
            return None;
        }
        let crc = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        if header_crc(&buf[0..20]) != crc {
            return None;
        }
        let epoch_id = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        let sealed_at = ClockNs::new(u64::from_le_bytes(buf[12..20].try_into().unwrap()));
        Some(Self { epoch_id, sealed_at })
    }
}

/// Ring geometry over `slot_count` epoch-record slots. Holds no device
/// state itself; [`crate::volume::Volume`] owns the I/O and calls into
/// this for slot indexing and scan arbitration.
#[derive(Clone, Copy, Debug)]
pub struct EpochRing {
    pub slot_count: u64,
}

impl EpochRing {
    pub fn new(slot_count: u64) -> Self {
        Self { slot_count: slot_count.max(1) }
    }

    #[inline]
    pub fn next_index(&self, current: u64) -> u64 {
        (current + 1) % self.slot_count
    }

    /// Scan every slot's raw bytes and return the index and record of
    /// the highest valid `epoch_id`. A torn write leaves at most one
    /// slot invalid; ties (shouldn't happen under a single writer) are
    /// broken by slot index.
    pub fn scan_latest(&self, slots: &[[u8; EPOCH_RECORD_BYTES]]) -> Option<(u64, EpochRecord)> {
        let mut best: Option<(u64, EpochRecord)> = None;
        for (i, raw) in slots.iter().enumerate() {
            if let Some(rec) = EpochRecord::from_bytes(raw) {
                let better = match best {
                    None => true,
                    Some((_, b)) => rec.epoch_id > b.epoch_id,
                };
                if better {
                    best = Some((i as u64, rec));
                }
            }
        }
        best
    }

    /// True when `observed` trails `expected` by more than `threshold`
    /// epochs — the mount-time skew check that forces `EventHorizon`
    /// (§7) rather than silently accepting a stale mirror.
    pub fn is_skewed(&self, expected: u64, observed: u64, threshold: u64) -> bool {
        expected.saturating_sub(observed) > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips() {
        let rec = EpochRecord { epoch_id: 42, sealed_at: ClockNs::new(1_000) };
        let bytes = rec.to_bytes();
        assert_eq!(EpochRecord::from_bytes(&bytes), Some(rec));
    }

    #[test]
    fn zeroed_slot_is_not_a_record() {
        let buf = [0u8; EPOCH_RECORD_BYTES];
        assert_eq!(EpochRecord::from_bytes(&buf), None);
    }

    #[test]
    fn corrupted_record_fails_checksum() {
        let rec = EpochRecord { epoch_id: 7, sealed_at: ClockNs::new(1) };
        let mut bytes = rec.to_bytes();
        bytes[5] ^= 0xFF;
        assert_eq!(EpochRecord::from_bytes(&bytes), None);
    }

    #[test]
    fn scan_picks_highest_epoch() {
        let ring = EpochRing::new(4);
        let slots = [
            EpochRecord { epoch_id: 3, sealed_at: ClockNs::new(0) }.to_bytes(),
            EpochRecord { epoch_id: 5, sealed_at: ClockNs::new(0) }.to_bytes(),
            [0u8; EPOCH_RECORD_BYTES],
            EpochRecord { epoch_id: 4, sealed_at: ClockNs::new(0) }.to_bytes(),
        ];
        let (idx, rec) = ring.scan_latest(&slots).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(rec.epoch_id, 5);
    }

    #[test]
    fn skew_detection_respects_threshold() {
        let ring = EpochRing::new(8);
        assert!(!ring.is_skewed(10, 9, 2));
        assert!(ring.is_skewed(10, 5, 2));
    }
}
