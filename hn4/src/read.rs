//! The read path (§4.4): residency resolution over every shadow
//! candidate regardless of the write-side `k_limit`, since a volume may
//! have been grown or reconfigured since a block was written and an
//! old write might have hopped further than the current policy would.

use crate::anchor::{Anchor, DataClass};
use crate::core::error::{HnResult, Status};
use crate::core::types::{BlockIdx, Generation, LogicalIdx};
use crate::integrity::{verify_candidate, Candidate, HEADER_BYTES, PAYLOAD_CAPACITY};
use crate::region::bitmap::Bitmap;
use crate::region::layout::Geometry;
use crate::trajectory::{trajectory, TrajectoryInput};
use hn4_hal::BlockDevice;

fn trajectory_input(anchor: &Anchor, logical: LogicalIdx) -> TrajectoryInput {
    TrajectoryInput {
        gravity_center: anchor.gravity_center,
        orbit_vector: anchor.orbit_vector,
        logical,
        fractal_scale: anchor.fractal_scale,
    }
}

/// Result of a successful read: the bytes actually stored (un-padded to
/// the write's original length) and the block address and generation
/// they were found at.
pub struct ReadOutcome {
    pub block: BlockIdx,
    pub generation: Generation,
    pub len: u16,
}

fn fetch_frame<D: BlockDevice>(
    device: &D,
    geo: &Geometry,
    block: BlockIdx,
    frame: &mut [u8; crate::BLOCK_SIZE],
) -> HnResult<()> {
    let sector = geo.block_to_sector(block);
    device.read(sector, frame).map_err(Status::from)
}

/// Read the logical block at `logical` under `anchor` into `out`
/// (exactly [`crate::integrity::PAYLOAD_CAPACITY`] bytes; unused tail
/// is zeroed by the caller's original write). `expected_generation`:
/// `None` for the live read (accept the highest-generation valid
/// candidate); `Some(g)` for `read_block_at_generation` (§9 open
/// question #1) — require an exact match or fail `GenerationSkew`.
///
/// Scans `k = 0..=MAX_SHADOW_K` regardless of what `k_limit` the write
/// path used, since policy can change across a remount (§4.4). Each
/// candidate's bitmap bit is checked first: a clear bit means that
/// address was never claimed by this write, so it's skipped rather than
/// read — reading it would risk picking up another anchor's stale frame.
///
/// Refuses to read a payload flagged `ENCRYPTED` (§4.4) — the engine has
/// no key service, so it declines rather than hand back ciphertext.
pub fn read_block<D: BlockDevice>(
    device: &D,
    geo: &Geometry,
    bitmap: &Bitmap,
    anchor: &Anchor,
    logical: LogicalIdx,
    expected_generation: Option<Generation>,
    out: &mut [u8],
) -> HnResult<ReadOutcome> {
    if anchor.data_class.contains(DataClass::ENCRYPTED) {
        return Err(Status::AccessDenied);
    }
    if logical.get() * PAYLOAD_CAPACITY as u64 >= anchor.mass {
        if anchor.data_class.contains(DataClass::SPARSE_AWARE) {
            out.fill(0);
            return Err(Status::Sparse);
        }
        return Err(Status::NotFound);
    }

    let input = trajectory_input(anchor, logical);
    let mut best: Option<(BlockIdx, Generation, u16)> = None;
    let mut best_error: Option<Status> = None;
    let mut any_claimed = false;
    let mut frame = [0u8; crate::BLOCK_SIZE];

    for k in 0..=crate::MAX_SHADOW_K {
        let Some(candidate) = trajectory(geo, input, k) else {
            continue;
        };
        if !bitmap.is_set(candidate) {
            continue;
        }
        any_claimed = true;
        if fetch_frame(device, geo, candidate, &mut frame).is_err() {
            continue;
        }
        let mut header_bytes = [0u8; HEADER_BYTES];
        header_bytes.copy_from_slice(&frame[..HEADER_BYTES]);
        let payload = &frame[HEADER_BYTES..];

        match verify_candidate(&header_bytes, payload, anchor.seed_id, expected_generation) {
            Candidate::Valid { generation } => {
                let comp_len = u16::from_le_bytes(header_bytes[38..40].try_into().unwrap());
                let better = match best {
                    None => true,
                    Some((_, best_gen, _)) => generation > best_gen,
                };
                if better {
                    best = Some((candidate, generation, comp_len));
                    out[..(comp_len as usize).min(out.len())]
                        .copy_from_slice(&payload[..(comp_len as usize).min(out.len())]);
                }
            }
            Candidate::Phantom => {}
            other => {
                let status = other.status().unwrap();
                let replace = match best_error {
                    None => true,
                    Some(current) => status.arbitration_rank() > current.arbitration_rank(),
                };
                if replace {
                    best_error = Some(status);
                }
            }
        }
    }

    match best {
        Some((block, generation, len)) => Ok(ReadOutcome { block, generation, len }),
        None if !any_claimed && anchor.data_class.contains(DataClass::SPARSE_AWARE) => {
            out.fill(0);
            Err(Status::Sparse)
        }
        None => Err(best_error.unwrap_or(Status::PhantomBlock)),
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::core::types::{ClockNs, OrbitVector, SeedId};
    use crate::horizon::HorizonRing;
    use crate::region::bitmap::Bitmap;
    use crate::region::qmask::QMask;
    use crate::write::{write_block, WritePolicy};
    use hn4_hal::MemoryBlockDevice;

    fn geo() -> Geometry {
        Geometry::from_fixed(4096, 512, 100_000, 16, 32, 64, 64, 128, 10_000, 10_128, 1_000)
    }

    #[test]
    fn read_after_write_round_trips() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.flux_start, geo.flux_blocks);
        let qmask = QMask::new(geo.flux_start, geo.flux_blocks);
        let horizon = HorizonRing::new(&geo, geo.horizon_start);
        let device = MemoryBlockDevice::new(512, geo.total_blocks * geo.sectors_per_block());
        let mut anchor = Anchor::new(SeedId::new(1, 1), 200, OrbitVector::new(0x1234), 2, ClockNs::new(0));

        write_block(
            &device, &geo, &bitmap, &qmask, &horizon, &mut anchor,
            LogicalIdx::new(0), b"payload data", WritePolicy { k_limit: 4 }, ClockNs::new(1), false, None,
        )
        .unwrap();

        let mut out = [0u8; crate::integrity::PAYLOAD_CAPACITY];
        let outcome = read_block(&device, &geo, &bitmap, &anchor, LogicalIdx::new(0), None, &mut out).unwrap();
        assert_eq!(&out[..outcome.len as usize], b"payload data");
    }

    #[test]
    fn unwritten_logical_block_beyond_mass_is_sparse() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.flux_start, geo.flux_blocks);
        let device = MemoryBlockDevice::new(512, geo.total_blocks * geo.sectors_per_block());
        let anchor = Anchor::new(SeedId::new(1, 1), 200, OrbitVector::new(0x1234), 2, ClockNs::new(0));
        let mut out = [0u8; crate::integrity::PAYLOAD_CAPACITY];
        let result = read_block(&device, &geo, &bitmap, &anchor, LogicalIdx::new(0), None, &mut out);
        assert_eq!(result.err(), Some(Status::Sparse));
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn unclaimed_candidate_block_is_treated_as_sparse_hole() {
        // A logical index within `mass` but whose trajectory candidates
        // are all bitmap-clear (never actually claimed) reads as a
        // sparse hole rather than a hard error, for a sparse-aware file.
        let geo = geo();
        let bitmap = Bitmap::new(geo.flux_start, geo.flux_blocks);
        let qmask = QMask::new(geo.flux_start, geo.flux_blocks);
        let horizon = HorizonRing::new(&geo, geo.horizon_start);
        let device = MemoryBlockDevice::new(512, geo.total_blocks * geo.sectors_per_block());
        let mut anchor = Anchor::new(SeedId::new(1, 1), 200, OrbitVector::new(0x1234), 2, ClockNs::new(0));

        write_block(
            &device, &geo, &bitmap, &qmask, &horizon, &mut anchor,
            LogicalIdx::new(5), b"tail", WritePolicy { k_limit: 4 }, ClockNs::new(1), false, None,
        )
        .unwrap();

        let mut out = [0u8; crate::integrity::PAYLOAD_CAPACITY];
        let result = read_block(&device, &geo, &bitmap, &anchor, LogicalIdx::new(2), None, &mut out);
        assert_eq!(result.err(), Some(Status::Sparse));
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn encrypted_anchor_refuses_reads() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.flux_start, geo.flux_blocks);
        let qmask = QMask::new(geo.flux_start, geo.flux_blocks);
        let horizon = HorizonRing::new(&geo, geo.horizon_start);
        let device = MemoryBlockDevice::new(512, geo.total_blocks * geo.sectors_per_block());
        let mut anchor = Anchor::new(SeedId::new(1, 1), 200, OrbitVector::new(0x1234), 2, ClockNs::new(0));

        write_block(
            &device, &geo, &bitmap, &qmask, &horizon, &mut anchor,
            LogicalIdx::new(0), b"secret", WritePolicy { k_limit: 4 }, ClockNs::new(1), false, None,
        )
        .unwrap();
        anchor.data_class |= crate::anchor::DataClass::ENCRYPTED;
        anchor.reseal();

        let mut out = [0u8; crate::integrity::PAYLOAD_CAPACITY];
        let result = read_block(&device, &geo, &bitmap, &anchor, LogicalIdx::new(0), None, &mut out);
        assert_eq!(result.err(), Some(Status::AccessDenied));
    }

    #[test]
    fn historical_read_at_wrong_generation_fails() {
        let geo = geo();
        let bitmap = Bitmap::new(geo.flux_start, geo.flux_blocks);
        let qmask = QMask::new(geo.flux_start, geo.flux_blocks);
        let horizon = HorizonRing::new(&geo, geo.horizon_start);
        let device = MemoryBlockDevice::new(512, geo.total_blocks * geo.sectors_per_block());
        let mut anchor = Anchor::new(SeedId::new(1, 1), 200, OrbitVector::new(0x1234), 2, ClockNs::new(0));

        write_block(
            &device, &geo, &bitmap, &qmask, &horizon, &mut anchor,
            LogicalIdx::new(0), b"v1", WritePolicy { k_limit: 4 }, ClockNs::new(1), false, None,
        )
        .unwrap();

        let mut out = [0u8; crate::integrity::PAYLOAD_CAPACITY];
        let result = read_block(
            &device, &geo, &bitmap, &anchor, LogicalIdx::new(0), Some(Generation::new(99)), &mut out,
        );
        assert_eq!(result.err(), Some(Status::GenerationSkew));
    }
}
