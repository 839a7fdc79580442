//! Extension blocks: the chain a `LONGNAME` anchor walks to reconstruct
//! a name too long for its 40-byte inline buffer (§4.5). Restyled from
//! this lineage's checksummed-record pattern; the chain itself is
//! bounded to [`crate::MAX_EXTENSION_DEPTH`] hops ("Ouroboros defense")
//! so a corrupt `next_ext_lba` cycle can never spin a reader forever.

use crate::core::error::{HnResult, Status};
use crate::core::hash::header_crc;
use static_assertions::const_assert_eq;

pub const EXTENSION_HEADER_BYTES: usize = 16;
const_assert_eq!(EXTENSION_HEADER_BYTES, 16);

const EXTENSION_MAGIC: u32 = 0x45_58_54_31; // "EXT1"

/// Terminal sentinel for `next_ext_lba`: no further hop.
pub const NO_NEXT_EXTENSION: u64 = u64::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum ExtensionType {
    NameFragment = 0,
    TagList = 1,
}

impl ExtensionType {
    fn from_u8(v: u8) -> HnResult<Self> {
        match v {
            0 => Ok(ExtensionType::NameFragment),
            1 => Ok(ExtensionType::TagList),
            _ => Err(Status::PhantomBlock),
        }
    }
}

/// One extension block's header; the remainder of the block (up to
/// `crate::BLOCK_SIZE - EXTENSION_HEADER_BYTES`) is fragment payload.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionHeader {
    pub ext_type: ExtensionType,
    pub next_ext_lba: u64,
    pub checksum: u32,
}

impl ExtensionHeader {
    pub fn new(ext_type: ExtensionType, next_ext_lba: u64, payload: &[u8]) -> Self {
        let mut h = Self { ext_type, next_ext_lba, checksum: 0 };
        h.checksum = h.calculate_checksum(payload);
        h
    }

    fn calculate_checksum(&self, payload: &[u8]) -> u32 {
        let mut buf = [0u8; EXTENSION_HEADER_BYTES];
        self.write_without_checksum(&mut buf);
        let mut running = header_crc(&buf[0..12]);
        running ^= header_crc(payload);
        running
    }

    fn write_without_checksum(&self, buf: &mut [u8; EXTENSION_HEADER_BYTES]) {
        buf[0..4].copy_from_slice(&EXTENSION_MAGIC.to_le_bytes());
        buf[4] = self.ext_type as u8;
        buf[5..8].copy_from_slice(&[0, 0, 0]);
        buf[8..16].copy_from_slice(&self.next_ext_lba.to_le_bytes());
    }

    pub fn to_bytes(&self) -> [u8; EXTENSION_HEADER_BYTES] {
        let mut buf = [0u8; EXTENSION_HEADER_BYTES];
        self.write_without_checksum(&mut buf);
        buf
    }

    pub fn from_bytes(buf: &[u8; EXTENSION_HEADER_BYTES], payload: &[u8]) -> HnResult<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != EXTENSION_MAGIC {
            return Err(Status::PhantomBlock);
        }
        let ext_type = ExtensionType::from_u8(buf[4])?;
        let next_ext_lba = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let header = Self { ext_type, next_ext_lba, checksum: 0 };
        let expected = header.calculate_checksum(payload);
        Ok(Self { checksum: expected, ..header })
    }

    pub fn has_next(&self) -> bool {
        self.next_ext_lba != NO_NEXT_EXTENSION
    }
}

/// Walk a chain of extension blocks, concatenating the payloads of its
/// `NameFragment` blocks, bounded to [`crate::MAX_EXTENSION_DEPTH`] hops.
/// `fetch` reads one extension block's raw bytes given its physical
/// block address.
///
/// Only `NameFragment` payloads contribute name bytes; a `TagList` (or
/// any other type) encountered mid-chain is skipped, but `next_ext_lba`
/// is still followed past it. A `NameFragment` payload is truncated at
/// its first NUL byte, which ends the name — a NUL inside a fragment
/// marks the padded tail of the final one, so assembly stops there even
/// if `next_ext_lba` points further.
#[cfg(feature = "alloc")]
pub fn reassemble_name<F>(
    first_lba: u64,
    block_payload_len: usize,
    mut fetch: F,
) -> HnResult<alloc::vec::Vec<u8>>
where
    F: FnMut(u64) -> HnResult<alloc::vec::Vec<u8>>,
{
    let mut out = alloc::vec::Vec::new();
    let mut lba = first_lba;
    let mut hops: u8 = 0;

    loop {
        if hops >= crate::MAX_EXTENSION_DEPTH {
            return Err(Status::InvalidArgument);
        }
        let block = fetch(lba)?;
        if block.len() < EXTENSION_HEADER_BYTES {
            return Err(Status::PhantomBlock);
        }
        let mut header_bytes = [0u8; EXTENSION_HEADER_BYTES];
        header_bytes.copy_from_slice(&block[0..EXTENSION_HEADER_BYTES]);
        let payload_end = (EXTENSION_HEADER_BYTES + block_payload_len).min(block.len());
        let payload = &block[EXTENSION_HEADER_BYTES..payload_end];
        let header = ExtensionHeader::from_bytes(&header_bytes, payload)?;
        hops += 1;

        if header.ext_type == ExtensionType::NameFragment {
            match payload.iter().position(|&b| b == 0) {
                Some(nul_at) => {
                    out.extend_from_slice(&payload[..nul_at]);
                    break;
                }
                None => out.extend_from_slice(payload),
            }
        }

        if !header.has_next() {
            break;
        }
        lba = header.next_ext_lba;
    }
    Ok(out)
}
