//! The data-block header and the integrity checks both the write and
//! read paths share (§4.2, §4.4, §4.7): frame/seal a payload into a
//! block, and validate a block read back against the anchor that
//! claims to own it.

use crate::core::error::Status;
use crate::core::hash::{header_crc, payload_crc};
use crate::core::types::{Generation, SeedId};
use static_assertions::const_assert_eq;

pub const HEADER_BYTES: usize = 48;
const_assert_eq!(HEADER_BYTES, 48);

/// Usable payload capacity per block once the header is accounted for.
pub const PAYLOAD_CAPACITY: usize = crate::BLOCK_SIZE - HEADER_BYTES;

const BLOCK_MAGIC: u32 = 0x48_4E_34_42; // "HN4B"

/// Compression algorithm tag. HN4 itself never compresses (§12,
/// Non-goals); the field exists so a block written by a future codec
/// layer round-trips through this header without a format break.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u16)]
pub enum CompressionAlgo {
    None = 0,
}

/// The 48-byte data-block header (§4.2, §4.7).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BlockHeader {
    pub well_id: SeedId,
    pub generation: Generation,
    pub seq_index: u32,
    pub comp_algo: CompressionAlgo,
    pub comp_len: u16,
    pub header_crc: u32,
    pub data_crc: u32,
}

impl BlockHeader {
    /// Frame and seal: build a header for `payload`, computing both
    /// checksums. `payload` must be at most [`PAYLOAD_CAPACITY`] bytes;
    /// the caller zero-pads it to a full block before writing.
    pub fn seal(well_id: SeedId, generation: Generation, seq_index: u32, payload: &[u8]) -> Self {
        let mut h = Self {
            well_id,
            generation,
            seq_index,
            comp_algo: CompressionAlgo::None,
            comp_len: payload.len() as u16,
            header_crc: 0,
            data_crc: payload_crc(payload),
        };
        h.header_crc = h.calculate_header_crc();
        h
    }

    fn calculate_header_crc(&self) -> u32 {
        let mut buf = [0u8; HEADER_BYTES];
        self.write_fields(&mut buf);
        header_crc(&buf[0..40])
    }

    fn write_fields(&self, buf: &mut [u8; HEADER_BYTES]) {
        buf[0..4].copy_from_slice(&BLOCK_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&[0; 4]);
        buf[8..16].copy_from_slice(&self.well_id.lo.to_le_bytes());
        buf[16..24].copy_from_slice(&self.well_id.hi.to_le_bytes());
        buf[24..32].copy_from_slice(&(self.generation.get() as u64).to_le_bytes());
        buf[32..36].copy_from_slice(&self.seq_index.to_le_bytes());
        buf[36..38].copy_from_slice(&(self.comp_algo as u16).to_le_bytes());
        buf[38..40].copy_from_slice(&self.comp_len.to_le_bytes());
        buf[40..44].copy_from_slice(&self.header_crc.to_le_bytes());
        buf[44..48].copy_from_slice(&self.data_crc.to_le_bytes());
    }

    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];
        self.write_fields(&mut buf);
        buf
    }

    /// Parse a header without checking its magic or CRC — callers run
    /// [`verify_candidate`] against the header plus payload as one step
    /// so a phantom (unwritten) block is distinguished from a torn one.
    fn parse_unchecked(buf: &[u8; HEADER_BYTES]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != BLOCK_MAGIC {
            return None;
        }
        let well_id = SeedId::new(
            u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            u64::from_le_bytes(buf[8..16].try_into().unwrap()),
        );
        let generation = Generation::new(u64::from_le_bytes(buf[24..32].try_into().unwrap()) as u32);
        let seq_index = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let comp_len = u16::from_le_bytes(buf[38..40].try_into().unwrap());
        let header_crc = u32::from_le_bytes(buf[40..44].try_into().unwrap());
        let data_crc = u32::from_le_bytes(buf[44..48].try_into().unwrap());
        Some(Self {
            well_id,
            generation,
            seq_index,
            comp_algo: CompressionAlgo::None,
            comp_len,
            header_crc,
            data_crc,
        })
    }
}

/// Outcome of validating one shadow candidate against the anchor that
/// should own it (§4.4).
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Candidate {
    /// Every check passed; this candidate is a valid residency.
    Valid { generation: Generation },
    /// Header magic absent — never written, or stale garbage.
    Phantom,
    /// Header CRC mismatch.
    HeaderRot,
    /// Well id does not match the anchor's seed id.
    IdMismatch,
    /// Generation does not match the anchor's `write_gen`.
    GenerationSkew,
    /// Payload CRC mismatch.
    PayloadRot,
}

impl Candidate {
    pub fn status(self) -> Option<Status> {
        match self {
            Candidate::Valid { .. } => None,
            Candidate::Phantom => Some(Status::PhantomBlock),
            Candidate::HeaderRot => Some(Status::HeaderRot),
            Candidate::IdMismatch => Some(Status::IdMismatch),
            Candidate::GenerationSkew => Some(Status::GenerationSkew),
            Candidate::PayloadRot => Some(Status::PayloadRot),
        }
    }
}

/// Validate one candidate block: header magic, header CRC, `well_id`,
/// then (if the caller wants a specific vintage) `generation`, then
/// payload CRC, in that priority order (matches
/// [`Status::arbitration_rank`] so read-path callers can report the
/// single most useful error across several failed candidates).
///
/// `expected_generation`: `None` for an ordinary read, which accepts any
/// generation and lets the caller arbitrate by highest value across
/// candidates (§4.4) — a block header carries the generation that was
/// current when *that* block was last written, not a volume-wide value,
/// so ordinary reads never compare it to anything. `Some(g)` is for
/// `read_block_at_generation`: a historical read that must land on
/// exactly `g` or fail with `GenerationSkew`.
pub fn verify_candidate(
    header_bytes: &[u8; HEADER_BYTES],
    payload: &[u8],
    expected_seed_id: SeedId,
    expected_generation: Option<Generation>,
) -> Candidate {
    let Some(header) = BlockHeader::parse_unchecked(header_bytes) else {
        return Candidate::Phantom;
    };
    if header.calculate_header_crc() != header.header_crc {
        return Candidate::HeaderRot;
    }
    if header.well_id != expected_seed_id {
        return Candidate::IdMismatch;
    }
    if let Some(wanted) = expected_generation {
        if header.generation != wanted {
            return Candidate::GenerationSkew;
        }
    }
    let used = &payload[..(header.comp_len as usize).min(payload.len())];
    if payload_crc(used) != header.data_crc {
        return Candidate::PayloadRot;
    }
    Candidate::Valid { generation: header.generation }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_header_is_48_bytes() {
        let h = BlockHeader::seal(SeedId::new(1, 2), Generation::new(3), 0, b"hello");
        assert_eq!(h.to_bytes().len(), HEADER_BYTES);
    }

    #[test]
    fn payload_capacity_matches_budget() {
        assert_eq!(PAYLOAD_CAPACITY, 4048);
    }

    #[test]
    fn valid_candidate_round_trips() {
        let seed = SeedId::new(1, 2);
        let gen = Generation::new(7);
        let payload = b"payload bytes";
        let mut padded = [0u8; 4048];
        padded[..payload.len()].copy_from_slice(payload);
        let header = BlockHeader::seal(seed, gen, 0, payload);
        let bytes = header.to_bytes();

        match verify_candidate(&bytes, &padded, seed, None) {
            Candidate::Valid { generation } => assert_eq!(generation, gen),
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn wrong_seed_id_is_id_mismatch() {
        let seed = SeedId::new(1, 2);
        let gen = Generation::new(1);
        let header = BlockHeader::seal(seed, gen, 0, b"x");
        let bytes = header.to_bytes();
        let padded = [0u8; 4048];
        assert_eq!(
            verify_candidate(&bytes, &padded, SeedId::new(9, 9), None),
            Candidate::IdMismatch
        );
    }

    #[test]
    fn historical_read_at_wrong_generation_is_generation_skew() {
        let seed = SeedId::new(1, 2);
        let header = BlockHeader::seal(seed, Generation::new(1), 0, b"x");
        let bytes = header.to_bytes();
        let padded = [0u8; 4048];
        assert_eq!(
            verify_candidate(&bytes, &padded, seed, Some(Generation::new(2))),
            Candidate::GenerationSkew
        );
    }

    #[test]
    fn historical_read_at_matching_generation_succeeds() {
        let seed = SeedId::new(1, 2);
        let gen = Generation::new(4);
        let header = BlockHeader::seal(seed, gen, 0, b"x");
        let bytes = header.to_bytes();
        let padded = [0u8; 4048];
        assert_eq!(
            verify_candidate(&bytes, &padded, seed, Some(gen)),
            Candidate::Valid { generation: gen }
        );
    }

    #[test]
    fn unwritten_block_is_phantom() {
        let bytes = [0u8; HEADER_BYTES];
        let padded = [0u8; 4048];
        assert_eq!(
            verify_candidate(&bytes, &padded, SeedId::new(1, 1), None),
            Candidate::Phantom
        );
    }

    #[test]
    fn torn_header_is_header_rot() {
        let seed = SeedId::new(1, 2);
        let gen = Generation::new(1);
        let header = BlockHeader::seal(seed, gen, 0, b"x");
        let mut bytes = header.to_bytes();
        bytes[10] ^= 0xFF;
        let padded = [0u8; 4048];
        assert_eq!(verify_candidate(&bytes, &padded, seed, None), Candidate::HeaderRot);
    }

    #[test]
    fn corrupted_payload_is_payload_rot() {
        let seed = SeedId::new(1, 2);
        let gen = Generation::new(1);
        let payload = b"abcdef";
        let header = BlockHeader::seal(seed, gen, 0, payload);
        let bytes = header.to_bytes();
        let mut padded = [0u8; 4048];
        padded[..payload.len()].copy_from_slice(payload);
        padded[0] ^= 0xFF;
        assert_eq!(verify_candidate(&bytes, &padded, seed, None), Candidate::PayloadRot);
    }
}
