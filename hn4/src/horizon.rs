//! The Horizon ring allocator (§2, §4.3): a linear fallback allocator
//! over the Horizon region, used when [`crate::trajectory`] exhausts
//! every shadow candidate in Flux. The write head persists in the
//! superblock so a remount resumes the ring where it left off rather
//! than restarting the scan from the first Horizon block every time.

use crate::core::atomic::Counter;
use crate::core::types::BlockIdx;
use crate::region::bitmap::Bitmap;
use crate::region::layout::Geometry;
use crate::region::qmask::{QMask, QualityClass};

/// Linear ring allocator. `head` is a relaxed counter rather than a
/// lock: advancing it is the only mutation, and a CAS loop against the
/// bitmap (not this counter) is what actually claims a block.
pub struct HorizonRing {
    start: u64,
    len: u64,
    head: Counter,
}

impl HorizonRing {
    pub fn new(geo: &Geometry, initial_head: u64) -> Self {
        let head = Counter::new();
        head.set(initial_head.saturating_sub(geo.horizon_start).min(geo.horizon_blocks.max(1) - 1));
        Self { start: geo.horizon_start, len: geo.horizon_blocks.max(1), head }
    }

    pub fn head(&self) -> BlockIdx {
        BlockIdx::new(self.start + self.head.get())
    }

    /// Walk the ring starting at the current head, skipping any block
    /// the bitmap marks occupied or the Q-Mask marks toxic, and claim
    /// the first acceptable block by setting its bitmap bit. Advances
    /// the head past the claimed block on success.
    ///
    /// A full pass with nothing acceptable returns `None`; the caller
    /// surfaces `Status::NoSpace` (§7).
    pub fn allocate(&self, bitmap: &Bitmap, qmask: &QMask) -> Option<BlockIdx> {
        let start_offset = self.head.get();
        for i in 0..self.len {
            let offset = (start_offset + i) % self.len;
            let candidate = BlockIdx::new(self.start + offset);
            if qmask.get(candidate) == Some(QualityClass::Toxic) {
                continue;
            }
            if bitmap.try_set(candidate) {
                self.head.set((offset + 1) % self.len);
                return Some(candidate);
            }
        }
        None
    }

    pub fn region_len(&self) -> u64 {
        self.len
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    fn geo() -> Geometry {
        Geometry::from_fixed(4096, 512, 100_000, 16, 32, 64, 64, 128, 10_000, 10_128, 1_000)
    }

    #[test]
    fn allocate_claims_first_free_block() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.horizon_start, geo.horizon_blocks);
        let qmask = QMask::new(geo.horizon_start, geo.horizon_blocks);
        let ring = HorizonRing::new(&geo, geo.horizon_start);

        let claimed = ring.allocate(&bitmap, &qmask).unwrap();
        assert_eq!(claimed, BlockIdx::new(geo.horizon_start));
        assert!(bitmap.is_set(claimed));
    }

    #[test]
    fn allocate_skips_toxic_blocks() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.horizon_start, geo.horizon_blocks);
        let qmask = QMask::new(geo.horizon_start, geo.horizon_blocks);
        qmask.downgrade(BlockIdx::new(geo.horizon_start), QualityClass::Toxic);
        let ring = HorizonRing::new(&geo, geo.horizon_start);

        let claimed = ring.allocate(&bitmap, &qmask).unwrap();
        assert_eq!(claimed, BlockIdx::new(geo.horizon_start + 1));
    }

    #[test]
    fn allocate_wraps_around_the_ring() {
        let geo = Geometry::from_fixed(4096, 512, 10_000, 16, 32, 64, 64, 128, 900, 1000, 4);
        let bitmap = Bitmap::new(geo.horizon_start, geo.horizon_blocks);
        let qmask = QMask::new(geo.horizon_start, geo.horizon_blocks);
        let ring = HorizonRing::new(&geo, geo.horizon_start + 3);

        let claimed = ring.allocate(&bitmap, &qmask).unwrap();
        assert_eq!(claimed, BlockIdx::new(geo.horizon_start + 3));
        let claimed2 = ring.allocate(&bitmap, &qmask).unwrap();
        assert_eq!(claimed2, BlockIdx::new(geo.horizon_start));
    }

    #[test]
    fn full_ring_returns_none() {
        let geo = Geometry::from_fixed(4096, 512, 10_000, 16, 32, 64, 64, 128, 900, 1000, 2);
        let bitmap = Bitmap::new(geo.horizon_start, geo.horizon_blocks);
        let qmask = QMask::new(geo.horizon_start, geo.horizon_blocks);
        let ring = HorizonRing::new(&geo, geo.horizon_start);
        ring.allocate(&bitmap, &qmask);
        ring.allocate(&bitmap, &qmask);
        assert_eq!(ring.allocate(&bitmap, &qmask), None);
    }
}
