//! The anchor: a 128-byte metadata record, one per file, living in the
//! Cortex region (§3). Restyled from this lineage's inode record — same
//! "fixed-size, checksummed, to_bytes/from_bytes" shape — but flat: no
//! indirect/double-indirect block pointers, since placement is computed
//! by [`crate::trajectory`] instead of stored.

use crate::core::error::{HnResult, Status};
use crate::core::hash::anchor_crc;
use crate::core::types::{ClockNs, OrbitVector, SeedId};
use bitflags::bitflags;
use static_assertions::const_assert_eq;

pub const ANCHOR_BYTES: usize = crate::ANCHOR_SIZE;
const_assert_eq!(ANCHOR_BYTES, 128);

/// Length of the inline short-name buffer carried directly in the
/// anchor. Names that don't fit spill into an extension chain (§4.5).
pub const INLINE_NAME_LEN: usize = 40;

bitflags! {
    /// Data-class bits (§3): orthogonal hints the write/read paths and
    /// the resolver both consult.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct DataClass: u64 {
        /// File has been deleted; reads return `Tombstone` (§6).
        const TOMBSTONE     = 1 << 0;
        /// Name did not fit inline; `orbit_hints` holds the first
        /// extension block's low bits and the rest of its address lives
        /// in the extension chain itself.
        const LONGNAME      = 1 << 1;
        /// Content is sparse-aware: unwritten logical blocks read as
        /// zero rather than erroring.
        const SPARSE_AWARE  = 1 << 2;
        /// Anchor participates in tag-based resonance scans.
        const TAGGED        = 1 << 3;
        /// At least one of this file's blocks was placed via the
        /// Horizon fallback rather than a Flux shadow candidate.
        const HORIZON_HINT  = 1 << 4;
        /// Payload is a ciphertext the engine cannot prove is plaintext;
        /// the read path refuses it without a key service (§4.4).
        const ENCRYPTED     = 1 << 5;
        /// Content is an append-oriented byte stream (log-like access
        /// pattern hint; does not itself gate any check).
        const STREAM        = 1 << 6;
        /// Content is a dense numeric vector (hint only).
        const VECTOR        = 1 << 7;
        /// Content is a dense numeric matrix (hint only).
        const MATRIX        = 1 << 8;
        /// Content is expected to be rewritten often rather than stay
        /// static once written (hint only).
        const VOLATILE      = 1 << 9;
        /// A caller-defined type tag is present (consumer-defined
        /// meaning; the engine itself never inspects it).
        const TYPE_TAG      = 1 << 10;
    }
}

bitflags! {
    /// Permission bits (§3, §6).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Permissions: u32 {
        const READ      = 1 << 0;
        const WRITE     = 1 << 1;
        const IMMUTABLE = 1 << 2;
        /// May extend a file with new logical blocks but may not
        /// overwrite an already-resident one (§4.2).
        const APPEND    = 1 << 3;
        /// Content may be loaded and executed by the embedder. The
        /// engine itself never interprets it; this is a hint for
        /// whatever runs on top.
        const EXEC      = 1 << 4;
        /// Bypasses the `WRITE` check — a root-like override for
        /// anchors otherwise locked to append-only or read-only access.
        const SOVEREIGN = 1 << 5;
    }
}

/// The 128-byte anchor record.
///
/// Layout (little-endian, all offsets fixed):
/// ```text
/// 0   seed_id           16 B
/// 16  data_class         8 B
/// 24  permissions        4 B
/// 28  write_gen          4 B
/// 32  gravity_center     8 B
/// 40  orbit_vector       6 B
/// 46  fractal_scale      2 B
/// 48  create_clock       8 B
/// 56  mod_clock          8 B
/// 64  mass               8 B
/// 72  tag_filter         8 B
/// 80  inline_buffer     40 B
/// 120 orbit_hints        4 B
/// 124 checksum           4 B
/// ```
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Anchor {
    pub seed_id: SeedId,
    pub data_class: DataClass,
    pub permissions: Permissions,
    /// Generation every live data block under this anchor must carry.
    pub write_gen: u32,
    /// Trajectory gravity center (G), the base physical block address.
    pub gravity_center: u64,
    /// Trajectory orbit vector (V), this file's stride basis.
    pub orbit_vector: OrbitVector,
    /// Trajectory fractal scale (M); stride = `1 << fractal_scale`.
    pub fractal_scale: u16,
    pub create_clock: ClockNs,
    pub mod_clock: ClockNs,
    /// Logical block count, used for sparse-read bounds checking.
    pub mass: u64,
    /// Bloom-style filter over this file's tags, for fast resonance-scan
    /// rejection before a full tag compare.
    pub tag_filter: u64,
    /// Inline short name, or (if `LONGNAME` is set) the first chunk of a
    /// name whose remainder lives in an extension chain.
    pub inline_buffer: [u8; INLINE_NAME_LEN],
    /// When `LONGNAME` is set: the low 32 bits of the first extension
    /// block's physical address.
    pub orbit_hints: u32,
    pub checksum: u32,
}

impl Anchor {
    pub const EMPTY_SLOT_MARKER: u64 = 0;

    pub fn new(seed_id: SeedId, gravity_center: u64, orbit_vector: OrbitVector, fractal_scale: u16, now: ClockNs) -> Self {
        let mut a = Self {
            seed_id,
            data_class: DataClass::SPARSE_AWARE,
            permissions: Permissions::READ | Permissions::WRITE,
            write_gen: 1,
            gravity_center,
            orbit_vector,
            fractal_scale,
            create_clock: now,
            mod_clock: now,
            mass: 0,
            tag_filter: 0,
            inline_buffer: [0u8; INLINE_NAME_LEN],
            orbit_hints: 0,
            checksum: 0,
        };
        a.checksum = a.calculate_checksum();
        a
    }

    /// True if this cortex slot has never held a live anchor. An empty
    /// slot is all zero bytes, including its (valid, zero) checksum.
    pub fn is_empty_slot(bytes: &[u8; ANCHOR_BYTES]) -> bool {
        bytes.iter().all(|&b| b == 0)
    }

    pub fn is_tombstoned(&self) -> bool {
        self.data_class.contains(DataClass::TOMBSTONE)
    }

    pub fn is_immutable(&self) -> bool {
        self.permissions.contains(Permissions::IMMUTABLE)
    }

    /// Set the inline name buffer (zero-padded) and reseal the checksum.
    /// Panics if `name` does not fit in [`INLINE_NAME_LEN`] bytes — the
    /// caller is expected to have already decided between an inline name
    /// and a `LONGNAME` extension chain.
    pub fn set_inline_name(&mut self, name: &[u8]) {
        assert!(name.len() <= INLINE_NAME_LEN);
        self.inline_buffer = [0u8; INLINE_NAME_LEN];
        self.inline_buffer[..name.len()].copy_from_slice(name);
        self.checksum = self.calculate_checksum();
    }

    /// Recompute and store the checksum after mutating any other field
    /// directly (e.g. setting `data_class`/`permissions` outside of
    /// [`Anchor::set_inline_name`]).
    pub fn reseal(&mut self) {
        self.checksum = self.calculate_checksum();
    }

    fn calculate_checksum(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[124..128].copy_from_slice(&[0; 4]);
        anchor_crc(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; ANCHOR_BYTES] {
        let mut buf = [0u8; ANCHOR_BYTES];
        buf[0..8].copy_from_slice(&self.seed_id.lo.to_le_bytes());
        buf[8..16].copy_from_slice(&self.seed_id.hi.to_le_bytes());
        buf[16..24].copy_from_slice(&self.data_class.bits().to_le_bytes());
        buf[24..28].copy_from_slice(&self.permissions.bits().to_le_bytes());
        buf[28..32].copy_from_slice(&self.write_gen.to_le_bytes());
        buf[32..40].copy_from_slice(&self.gravity_center.to_le_bytes());
        buf[40..46].copy_from_slice(&self.orbit_vector.to_bytes());
        buf[46..48].copy_from_slice(&self.fractal_scale.to_le_bytes());
        buf[48..56].copy_from_slice(&self.create_clock.get().to_le_bytes());
        buf[56..64].copy_from_slice(&self.mod_clock.get().to_le_bytes());
        buf[64..72].copy_from_slice(&self.mass.to_le_bytes());
        buf[72..80].copy_from_slice(&self.tag_filter.to_le_bytes());
        buf[80..120].copy_from_slice(&self.inline_buffer);
        buf[120..124].copy_from_slice(&self.orbit_hints.to_le_bytes());
        buf[124..128].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; ANCHOR_BYTES]) -> HnResult<Self> {
        let seed_id = SeedId::new(
            u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            u64::from_le_bytes(buf[0..8].try_into().unwrap()),
        );
        let data_class = DataClass::from_bits_truncate(u64::from_le_bytes(buf[16..24].try_into().unwrap()));
        let permissions = Permissions::from_bits_truncate(u32::from_le_bytes(buf[24..28].try_into().unwrap()));
        let write_gen = u32::from_le_bytes(buf[28..32].try_into().unwrap());
        let gravity_center = u64::from_le_bytes(buf[32..40].try_into().unwrap());
        let orbit_vector = OrbitVector::from_bytes(buf[40..46].try_into().unwrap());
        let fractal_scale = u16::from_le_bytes(buf[46..48].try_into().unwrap());
        let create_clock = ClockNs::new(u64::from_le_bytes(buf[48..56].try_into().unwrap()));
        let mod_clock = ClockNs::new(u64::from_le_bytes(buf[56..64].try_into().unwrap()));
        let mass = u64::from_le_bytes(buf[64..72].try_into().unwrap());
        let tag_filter = u64::from_le_bytes(buf[72..80].try_into().unwrap());
        let mut inline_buffer = [0u8; INLINE_NAME_LEN];
        inline_buffer.copy_from_slice(&buf[80..120]);
        let orbit_hints = u32::from_le_bytes(buf[120..124].try_into().unwrap());
        let checksum = u32::from_le_bytes(buf[124..128].try_into().unwrap());

        let anchor = Self {
            seed_id,
            data_class,
            permissions,
            write_gen,
            gravity_center,
            orbit_vector,
            fractal_scale,
            create_clock,
            mod_clock,
            mass,
            tag_filter,
            inline_buffer,
            orbit_hints,
            checksum,
        };
        if anchor.calculate_checksum() != anchor.checksum {
            return Err(Status::PayloadRot);
        }
        Ok(anchor)
    }
}
