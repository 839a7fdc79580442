//! Historical slice resolution (§4.6, §9 open question #1): turning a
//! `#time:`/`#gen:` URI suffix into the concrete generation a read
//! should target.
//!
//! HN4 keeps no change log — a slice can only be satisfied if the exact
//! requested vintage still has a surviving shadow candidate somewhere
//! in the trajectory fan-out. There is no implicit "rewind"; the engine
//! never silently returns an older generation than requested.

use crate::anchor::Anchor;
use crate::core::error::{HnResult, Status};
use crate::core::types::{ClockNs, Generation};
use crate::resolver::uri::Slice;

/// Resolve a [`Slice`] against an anchor's metadata into the exact
/// generation a read must match.
///
/// - `Slice::Gen(g)` maps directly.
/// - `Slice::Time(t)` is a three-way comparison against the anchor's
///   recorded window (§4.6): a `t` before the file even existed is
///   `NotFound` (there is nothing to slice); a `t` still ahead of the
///   last modification is `TimeParadox` — HN4 keeps no change log, so a
///   request to rewind to a point strictly between `create_clock` and
///   `mod_clock` can't be satisfied without guessing. Anything at or
///   past `mod_clock` resolves to the anchor's current `write_gen`,
///   the most recent vintage HN4 actually has on hand.
pub fn resolve_slice(anchor: &Anchor, slice: Slice) -> HnResult<Generation> {
    match slice {
        Slice::Gen(g) => Ok(Generation::new(g)),
        Slice::Time(t) => {
            let requested = ClockNs::new(t);
            if anchor.create_clock > requested {
                Err(Status::NotFound)
            } else if anchor.mod_clock > requested {
                Err(Status::TimeParadox)
            } else {
                Ok(Generation::new(anchor.write_gen))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OrbitVector, SeedId};

    fn anchor_with_times(create: u64, modified: u64, gen: u32) -> Anchor {
        let mut a = Anchor::new(SeedId::new(1, 1), 0, OrbitVector::new(0), 0, ClockNs::new(create));
        a.mod_clock = ClockNs::new(modified);
        a.write_gen = gen;
        a
    }

    #[test]
    fn gen_slice_maps_directly() {
        let a = anchor_with_times(0, 100, 3);
        assert_eq!(resolve_slice(&a, Slice::Gen(7)).unwrap(), Generation::new(7));
    }

    #[test]
    fn time_slice_at_mod_clock_resolves_to_current_generation() {
        let a = anchor_with_times(0, 100, 9);
        assert_eq!(resolve_slice(&a, Slice::Time(100)).unwrap(), Generation::new(9));
    }

    #[test]
    fn time_slice_inside_window_but_not_at_mod_clock_is_time_paradox() {
        let a = anchor_with_times(0, 100, 9);
        assert_eq!(resolve_slice(&a, Slice::Time(50)), Err(Status::TimeParadox));
    }

    #[test]
    fn time_slice_past_mod_clock_resolves_to_current_generation() {
        let a = anchor_with_times(1000, 2000, 9);
        assert_eq!(resolve_slice(&a, Slice::Time(2500)).unwrap(), Generation::new(9));
    }

    #[test]
    fn time_slice_before_create_clock_is_not_found() {
        let a = anchor_with_times(1000, 2000, 9);
        assert_eq!(resolve_slice(&a, Slice::Time(500)), Err(Status::NotFound));
    }
}
