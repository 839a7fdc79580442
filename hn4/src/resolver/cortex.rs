//! Cortex table lookups (§4.5, §4.6): the fast path (id hash + linear
//! probe) and the slow path (full-table "resonance scan" for name/tag
//! queries, since the cortex has no secondary index over those).
//!
//! Both take a `fetch_slot` closure rather than owning storage directly
//! — the cortex lives on the block device, and this module doesn't know
//! about `hn4_hal`; [`crate::volume::Volume`] supplies the closure.

use crate::anchor::{Anchor, ANCHOR_BYTES};
use crate::core::error::{HnResult, Status};
use crate::core::hash::hash_seed_id;
use crate::core::types::SeedId;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Compute the bloom-filter bit a tag hash sets in an anchor's
/// `tag_filter` field.
#[inline]
pub fn tag_bit(tag_hash: u64) -> u64 {
    1u64 << (tag_hash % 64)
}

/// True if `filter` could contain every tag in `query` (a bloom
/// membership check — may false-positive, never false-negative).
pub fn filter_may_contain_all(filter: u64, query: &[u64]) -> bool {
    query.iter().all(|&t| filter & tag_bit(t) != 0)
}

/// Hash-probe lookup by exact `seed_id` (§4.6 `id:` scheme). Probing
/// stops at the first empty slot, matching standard open-addressing:
/// a deleted (tombstoned) anchor remains a non-empty slot so probe
/// chains past it stay intact.
pub fn lookup_by_id<F>(slot_count: u64, seed_id: SeedId, mut fetch_slot: F) -> HnResult<(u64, Anchor)>
where
    F: FnMut(u64) -> HnResult<[u8; ANCHOR_BYTES]>,
{
    if slot_count == 0 {
        return Err(Status::NotFound);
    }
    let start = hash_seed_id(seed_id.folded(), slot_count);
    for i in 0..slot_count {
        let idx = (start + i) % slot_count;
        let bytes = fetch_slot(idx)?;
        if Anchor::is_empty_slot(&bytes) {
            return Err(Status::NotFound);
        }
        let anchor = Anchor::from_bytes(&bytes)?;
        if anchor.seed_id == seed_id {
            return Ok((idx, anchor));
        }
    }
    Err(Status::NotFound)
}

/// Full-table scan for the anchor whose inline name matches `name`
/// exactly and whose `write_gen` is highest among all matches (§9 open
/// question #2: tombstones are skipped rather than shadowing the scan,
/// since a deleted file's old name may belong to a newer live one).
/// Anchors flagged `LONGNAME` are skipped here — the caller reassembles
/// and compares those itself via [`crate::extension::reassemble_name`],
/// since that requires device access this module doesn't have.
#[cfg(feature = "alloc")]
pub fn resonance_scan_name<F>(slot_count: u64, name: &[u8], mut fetch_slot: F) -> HnResult<(u64, Anchor)>
where
    F: FnMut(u64) -> HnResult<[u8; ANCHOR_BYTES]>,
{
    let mut best: Option<(u64, Anchor)> = None;
    for idx in 0..slot_count {
        let bytes = fetch_slot(idx)?;
        if Anchor::is_empty_slot(&bytes) {
            continue;
        }
        let anchor = Anchor::from_bytes(&bytes)?;
        if anchor.data_class.contains(crate::anchor::DataClass::LONGNAME) {
            continue;
        }
        if anchor.is_tombstoned() {
            continue;
        }
        let inline_len = anchor.inline_buffer.iter().position(|&b| b == 0).unwrap_or(anchor.inline_buffer.len());
        if &anchor.inline_buffer[..inline_len] != name {
            continue;
        }
        let better = best.as_ref().map_or(true, |(_, cur)| anchor.write_gen > cur.write_gen);
        if better {
            best = Some((idx, anchor));
        }
    }
    best.ok_or(Status::NotFound)
}

/// Full-table scan collecting every non-tombstoned anchor whose tag
/// filter could contain all of `tags`. Bloom false positives are the
/// caller's to filter further if it tracks exact tag strings elsewhere.
#[cfg(feature = "alloc")]
pub fn resonance_scan_tags<F>(slot_count: u64, tags: &[u64], mut fetch_slot: F) -> HnResult<Vec<(u64, Anchor)>>
where
    F: FnMut(u64) -> HnResult<[u8; ANCHOR_BYTES]>,
{
    let mut hits = Vec::new();
    for idx in 0..slot_count {
        let bytes = fetch_slot(idx)?;
        if Anchor::is_empty_slot(&bytes) {
            continue;
        }
        let anchor = Anchor::from_bytes(&bytes)?;
        if anchor.is_tombstoned() {
            continue;
        }
        if !anchor.data_class.contains(crate::anchor::DataClass::TAGGED) {
            continue;
        }
        if filter_may_contain_all(anchor.tag_filter, tags) {
            hits.push((idx, anchor));
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ClockNs, OrbitVector};

    #[test]
    fn lookup_finds_matching_id_at_its_hashed_slot() {
        let target = Anchor::new(SeedId::new(5, 5), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        let slot_count = 16u64;
        let start = hash_seed_id(target.seed_id.folded(), slot_count);
        let mut table = [[0u8; ANCHOR_BYTES]; 16];
        table[start as usize] = target.to_bytes();

        let (idx, found) = lookup_by_id(slot_count, target.seed_id, |i| Ok(table[i as usize])).unwrap();
        assert_eq!(idx, start);
        assert_eq!(found.seed_id, target.seed_id);
    }

    #[test]
    fn lookup_walks_past_a_collision() {
        let other = Anchor::new(SeedId::new(1, 1), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        let target = Anchor::new(SeedId::new(5, 5), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        let slot_count = 16u64;
        let start = hash_seed_id(target.seed_id.folded(), slot_count) as usize;
        let mut table = [[0u8; ANCHOR_BYTES]; 16];
        table[start] = other.to_bytes();
        table[(start + 1) % 16] = target.to_bytes();

        let (idx, found) = lookup_by_id(slot_count, target.seed_id, |i| Ok(table[i as usize])).unwrap();
        assert_eq!(idx, ((start + 1) % 16) as u64);
        assert_eq!(found.seed_id, target.seed_id);
    }

    #[test]
    fn lookup_stops_at_empty_slot() {
        let empty = [0u8; ANCHOR_BYTES];
        let table = [empty];
        let result = lookup_by_id(1, SeedId::new(1, 1), |i| Ok(table[i as usize]));
        assert_eq!(result.err(), Some(Status::NotFound));
    }

    #[test]
    fn resonance_scan_finds_inline_name() {
        let mut anchor = Anchor::new(SeedId::new(9, 9), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        anchor.set_inline_name(b"hello");
        let table = [anchor.to_bytes()];

        let (_, found) = resonance_scan_name(1, b"hello", |i| Ok(table[i as usize])).unwrap();
        assert_eq!(found.seed_id, SeedId::new(9, 9));
    }

    #[test]
    fn resonance_scan_skips_longname_anchors() {
        let mut anchor = Anchor::new(SeedId::new(9, 9), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        anchor.set_inline_name(b"hello");
        anchor.data_class |= crate::anchor::DataClass::LONGNAME;
        anchor.checksum = {
            let mut buf = anchor.to_bytes();
            buf[124..128].copy_from_slice(&[0; 4]);
            crate::core::hash::anchor_crc(&buf)
        };
        let table = [anchor.to_bytes()];

        let result = resonance_scan_name(1, b"hello", |i| Ok(table[i as usize]));
        assert_eq!(result.err(), Some(Status::NotFound));
    }

    #[test]
    fn resonance_scan_skips_tombstones_and_keeps_highest_generation() {
        let mut dead = Anchor::new(SeedId::new(1, 1), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        dead.set_inline_name(b"hello");
        dead.write_gen = 9;
        dead.data_class |= crate::anchor::DataClass::TOMBSTONE;
        dead.reseal();

        let mut stale = Anchor::new(SeedId::new(2, 2), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        stale.set_inline_name(b"hello");
        stale.write_gen = 3;

        let mut live = Anchor::new(SeedId::new(3, 3), 0, OrbitVector::new(0), 0, ClockNs::new(0));
        live.set_inline_name(b"hello");
        live.write_gen = 7;

        let table = [dead.to_bytes(), stale.to_bytes(), live.to_bytes()];
        let (_, found) = resonance_scan_name(3, b"hello", |i| Ok(table[i as usize])).unwrap();
        assert_eq!(found.seed_id, SeedId::new(3, 3));
    }

    #[test]
    fn tag_filter_membership_is_conservative() {
        let tag_a = crate::resolver::uri::tag_hash("alpha");
        let tag_b = crate::resolver::uri::tag_hash("beta");
        let filter = tag_bit(tag_a) | tag_bit(tag_b);
        assert!(filter_may_contain_all(filter, &[tag_a]));
        assert!(filter_may_contain_all(filter, &[tag_a, tag_b]));
    }
}
