//! The Super region (§2, §4.8): one block of fixed-layout metadata,
//! mirrored into a second block so mount can compare copies and detect
//! torn writes. Restyled from this lineage's superblock checksum/
//! validate/to_bytes/from_bytes pattern, with HN4's own field set.

use crate::core::error::{HnResult, Status};
use crate::core::hash::header_crc;
use crate::core::types::ClockNs;
use crate::region::layout::Geometry;
use bitflags::bitflags;

bitflags! {
    /// Volume state flags (§4.8): the engine refuses to mount a volume
    /// that is `DIRTY` without first degrading to read-only, and refuses
    /// to write to one that is `PANIC`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct VolumeState: u32 {
        const CLEAN    = 0b0000_0001;
        const DIRTY    = 0b0000_0010;
        const DEGRADED = 0b0000_0100;
        const PANIC    = 0b0000_1000;
        const SATURATED = 0b0001_0000;
    }
}

/// Length in bytes of a label set at format time (SPEC_FULL.md §12).
pub const LABEL_LEN: usize = 32;

/// On-disk byte size of one superblock copy; the remainder of its block
/// is unused padding.
pub const SUPERBLOCK_BYTES: usize = 202;

/// The Super region's fixed-layout record. Two copies live on disk
/// (`super_start`, `super_mirror_start`); [`Superblock::reconcile`]
/// decides which one a mount should trust.
#[derive(Clone, Copy, Debug)]
pub struct Superblock {
    pub magic: u32,
    pub format_version: u16,
    pub block_size: u32,
    pub sector_size: u32,
    pub total_blocks: u64,

    pub cortex_start: u64,
    pub cortex_blocks: u64,
    pub bitmap_start: u64,
    pub bitmap_blocks: u64,
    pub qmask_start: u64,
    pub qmask_blocks: u64,
    pub flux_start: u64,
    pub flux_blocks: u64,
    pub horizon_start: u64,
    pub horizon_blocks: u64,
    pub journal_start: u64,
    pub journal_blocks: u64,
    pub epoch_start: u64,
    pub epoch_blocks: u64,

    pub current_epoch_id: u64,
    pub state: VolumeState,
    pub label: [u8; LABEL_LEN],
    pub mount_count: u32,
    pub last_mount_time: ClockNs,
    /// Horizon ring write-head offset (relative to `horizon_start`), so a
    /// remount resumes the ring where it left off (§4.3) instead of
    /// restarting the scan from the first Horizon block.
    pub horizon_head: u64,

    /// CRC-32 (header seed) over every preceding field, computed with this
    /// field itself taken as zero.
    pub checksum: u32,
}

impl Superblock {
    pub fn new(geo: &Geometry, label: [u8; LABEL_LEN]) -> Self {
        let mut sb = Self {
            magic: crate::HN4_MAGIC,
            format_version: crate::FORMAT_VERSION,
            block_size: geo.block_size,
            sector_size: geo.sector_size,
            total_blocks: geo.total_blocks,
            cortex_start: geo.cortex_start,
            cortex_blocks: geo.cortex_blocks,
            bitmap_start: geo.bitmap_start,
            bitmap_blocks: geo.bitmap_blocks,
            qmask_start: geo.qmask_start,
            qmask_blocks: geo.qmask_blocks,
            flux_start: geo.flux_start,
            flux_blocks: geo.flux_blocks,
            horizon_start: geo.horizon_start,
            horizon_blocks: geo.horizon_blocks,
            journal_start: geo.journal_start,
            journal_blocks: geo.journal_blocks,
            epoch_start: geo.epoch_start,
            epoch_blocks: geo.epoch_blocks,
            current_epoch_id: 0,
            state: VolumeState::CLEAN,
            label,
            mount_count: 0,
            last_mount_time: ClockNs::new(0),
            horizon_head: 0,
            checksum: 0,
        };
        sb.checksum = sb.calculate_checksum();
        sb
    }

    /// Reconstruct the full geometry this superblock was formatted with.
    /// Built directly from the stored region fields rather than
    /// [`Geometry::from_fixed`], since that helper recomputes Q-Mask and
    /// journal sizing from a formula instead of reading back what was
    /// actually laid out at format time.
    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.block_size,
            sector_size: self.sector_size,
            total_blocks: self.total_blocks,
            super_start: 0,
            super_blocks: 1,
            super_mirror_start: 1,
            epoch_start: self.epoch_start,
            epoch_blocks: self.epoch_blocks,
            cortex_start: self.cortex_start,
            cortex_blocks: self.cortex_blocks,
            bitmap_start: self.bitmap_start,
            bitmap_blocks: self.bitmap_blocks,
            qmask_start: self.qmask_start,
            qmask_blocks: self.qmask_blocks,
            flux_start: self.flux_start,
            flux_blocks: self.flux_blocks,
            horizon_start: self.horizon_start,
            horizon_blocks: self.horizon_blocks,
            journal_start: self.journal_start,
            journal_blocks: self.journal_blocks,
        }
    }

    fn calculate_checksum(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
        header_crc(&bytes)
    }

    pub fn validate(&self) -> HnResult<()> {
        if self.magic != crate::HN4_MAGIC {
            return Err(Status::PhantomBlock);
        }
        if self.format_version != crate::FORMAT_VERSION {
            return Err(Status::Geometry);
        }
        if self.calculate_checksum() != self.checksum {
            return Err(Status::HeaderRot);
        }
        Ok(())
    }

    /// Reconcile primary and mirror copies at mount (§4.8): prefer the
    /// copy that validates; if both validate but disagree, trust the
    /// higher `current_epoch_id` (the more recently sealed one) and
    /// report divergence so the caller can re-mirror it.
    pub fn reconcile(primary: HnResult<Self>, mirror: HnResult<Self>) -> HnResult<(Self, bool)> {
        match (primary, mirror) {
            (Ok(p), Ok(m)) => {
                if p.current_epoch_id >= m.current_epoch_id {
                    Ok((p, p.current_epoch_id != m.current_epoch_id))
                } else {
                    Ok((m, true))
                }
            }
            (Ok(p), Err(_)) => Ok((p, true)),
            (Err(_), Ok(m)) => Ok((m, true)),
            (Err(e), Err(_)) => Err(e),
        }
    }

    pub fn to_bytes(&self) -> [u8; SUPERBLOCK_BYTES] {
        let mut buf = [0u8; SUPERBLOCK_BYTES];
        let mut w = Writer { buf: &mut buf, at: 0 };
        w.u32(self.magic);
        w.u16(self.format_version);
        w.u32(self.block_size);
        w.u32(self.sector_size);
        w.u64(self.total_blocks);
        w.u64(self.cortex_start);
        w.u64(self.cortex_blocks);
        w.u64(self.bitmap_start);
        w.u64(self.bitmap_blocks);
        w.u64(self.qmask_start);
        w.u64(self.qmask_blocks);
        w.u64(self.flux_start);
        w.u64(self.flux_blocks);
        w.u64(self.horizon_start);
        w.u64(self.horizon_blocks);
        w.u64(self.journal_start);
        w.u64(self.journal_blocks);
        w.u64(self.epoch_start);
        w.u64(self.epoch_blocks);
        w.u64(self.current_epoch_id);
        w.u32(self.state.bits());
        w.bytes(&self.label);
        w.u32(self.mount_count);
        w.u64(self.last_mount_time.get());
        w.u64(self.horizon_head);
        w.u32(self.checksum);
        buf
    }

    pub fn from_bytes(buf: &[u8; SUPERBLOCK_BYTES]) -> HnResult<Self> {
        let mut r = Reader { buf, at: 0 };
        let magic = r.u32();
        let format_version = r.u16();
        let block_size = r.u32();
        let sector_size = r.u32();
        let total_blocks = r.u64();
        let cortex_start = r.u64();
        let cortex_blocks = r.u64();
        let bitmap_start = r.u64();
        let bitmap_blocks = r.u64();
        let qmask_start = r.u64();
        let qmask_blocks = r.u64();
        let flux_start = r.u64();
        let flux_blocks = r.u64();
        let horizon_start = r.u64();
        let horizon_blocks = r.u64();
        let journal_start = r.u64();
        let journal_blocks = r.u64();
        let epoch_start = r.u64();
        let epoch_blocks = r.u64();
        let current_epoch_id = r.u64();
        let state_bits = r.u32();
        let mut label = [0u8; LABEL_LEN];
        r.bytes(&mut label);
        let mount_count = r.u32();
        let last_mount_time = ClockNs::new(r.u64());
        let horizon_head = r.u64();
        let checksum = r.u32();

        let sb = Self {
            magic,
            format_version,
            block_size,
            sector_size,
            total_blocks,
            cortex_start,
            cortex_blocks,
            bitmap_start,
            bitmap_blocks,
            qmask_start,
            qmask_blocks,
            flux_start,
            flux_blocks,
            horizon_start,
            horizon_blocks,
            journal_start,
            journal_blocks,
            epoch_start,
            epoch_blocks,
            current_epoch_id,
            state: VolumeState::from_bits_truncate(state_bits),
            label,
            mount_count,
            last_mount_time,
            horizon_head,
            checksum,
        };
        sb.validate()?;
        Ok(sb)
    }
}

const CHECKSUM_OFFSET: usize = SUPERBLOCK_BYTES - 4;

struct Writer<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl Writer<'_> {
    fn u16(&mut self, v: u16) {
        self.buf[self.at..self.at + 2].copy_from_slice(&v.to_le_bytes());
        self.at += 2;
    }
    fn u32(&mut self, v: u32) {
        self.buf[self.at..self.at + 4].copy_from_slice(&v.to_le_bytes());
        self.at += 4;
    }
    fn u64(&mut self, v: u64) {
        self.buf[self.at..self.at + 8].copy_from_slice(&v.to_le_bytes());
        self.at += 8;
    }
    fn bytes(&mut self, v: &[u8]) {
        self.buf[self.at..self.at + v.len()].copy_from_slice(v);
        self.at += v.len();
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes(self.buf[self.at..self.at + 2].try_into().unwrap());
        self.at += 2;
        v
    }
    fn u32(&mut self) -> u32 {
        let v = u32::from_le_bytes(self.buf[self.at..self.at + 4].try_into().unwrap());
        self.at += 4;
        v
    }
    fn u64(&mut self) -> u64 {
        let v = u64::from_le_bytes(self.buf[self.at..self.at + 8].try_into().unwrap());
        self.at += 8;
        v
    }
    fn bytes(&mut self, out: &mut [u8]) {
        out.copy_from_slice(&self.buf[self.at..self.at + out.len()]);
        self.at += out.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> Geometry {
        Geometry::calculate(500_000, 4096, 512)
    }

    #[test]
    fn roundtrips_through_bytes() {
        let sb = Superblock::new(&geo(), *b"test-volume-0000000000000000000");
        let bytes = sb.to_bytes();
        let back = Superblock::from_bytes(&bytes).unwrap();
        assert_eq!(back.total_blocks, sb.total_blocks);
        assert_eq!(back.flux_start, sb.flux_start);
        assert_eq!(back.checksum, sb.checksum);
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let sb = Superblock::new(&geo(), [0u8; LABEL_LEN]);
        let mut bytes = sb.to_bytes();
        bytes[20] ^= 0xFF;
        assert_eq!(Superblock::from_bytes(&bytes), Err(Status::HeaderRot));
    }

    #[test]
    fn reconcile_prefers_higher_epoch() {
        let mut a = Superblock::new(&geo(), [0u8; LABEL_LEN]);
        a.current_epoch_id = 5;
        a.checksum = a.calculate_checksum();
        let mut b = Superblock::new(&geo(), [0u8; LABEL_LEN]);
        b.current_epoch_id = 9;
        b.checksum = b.calculate_checksum();

        let (winner, diverged) = Superblock::reconcile(Ok(a), Ok(b)).unwrap();
        assert_eq!(winner.current_epoch_id, 9);
        assert!(diverged);
    }

    #[test]
    fn reconcile_falls_back_to_surviving_copy() {
        let sb = Superblock::new(&geo(), [0u8; LABEL_LEN]);
        let (winner, diverged) = Superblock::reconcile(Ok(sb), Err(Status::HeaderRot)).unwrap();
        assert_eq!(winner.current_epoch_id, sb.current_epoch_id);
        assert!(diverged);
    }
}
