//! The trajectory function (§4.1): the deterministic placement map that
//! replaces an indirect-block tree. Pure and replayable — depends only
//! on its inputs and volume geometry, never on mutable state — so two
//! processes (or the same process before and after a crash) compute the
//! identical physical address for a given `(G, V, N, M, k)`.

use crate::core::hash::fmix64;
use crate::core::types::{BlockIdx, LogicalIdx, OrbitVector};
use crate::region::layout::Geometry;

/// Inputs to one trajectory evaluation.
#[derive(Clone, Copy, Debug)]
pub struct TrajectoryInput {
    /// Gravity center (G): the anchor's base block offset *within Flux*
    /// (relative to `geo.flux_start`, not an absolute volume address).
    pub gravity_center: u64,
    /// Orbit vector (V): the anchor's 48-bit stride basis.
    pub orbit_vector: OrbitVector,
    /// Logical block index (N) within the file.
    pub logical: LogicalIdx,
    /// Fractal scale (M): stride = `2^M`.
    pub fractal_scale: u16,
}

/// Evaluate the trajectory for shadow candidate `k` (`0..=12`, §4.1).
/// `k == 0` is the primary candidate; each further `k` is a distinct
/// fallback hop tried in order when its predecessor is occupied.
///
/// `gravity_center` is a Flux-relative offset, so the result is always
/// `geo.flux_start + <some offset>`. Returns `None` if the computed
/// offset falls outside the Flux region — the caller then falls back
/// to the Horizon ring.
pub fn trajectory(geo: &Geometry, input: TrajectoryInput, k: u8) -> Option<BlockIdx> {
    if k > crate::MAX_SHADOW_K {
        return None;
    }
    let stride: u64 = 1u64 << input.fractal_scale.min(47);
    let primary = input
        .gravity_center
        .wrapping_add(input.logical.get().wrapping_mul(stride));

    let relative = if k == 0 {
        primary
    } else {
        let mixed = fmix64(
            input
                .orbit_vector
                .get()
                ^ input.logical.get().rotate_left(17)
                ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        // Hop envelope bounded to the stride itself, so shadow
        // candidates stay near the primary rather than scattering
        // across all of Flux.
        let envelope = stride.max(1);
        let hop = mixed % envelope;
        primary.wrapping_add(hop).wrapping_add(k as u64)
    };

    if relative >= geo.flux_blocks {
        return None;
    }
    Some(BlockIdx::new(geo.flux_start + relative))
}

/// Evaluate every candidate `0..=k_limit` in order, stopping at the
/// first the caller's `is_free` predicate accepts. This is the
/// collision-hop step of the shadow-hop write protocol (§4.2); it does
/// not itself touch the bitmap.
pub fn first_free_candidate(
    geo: &Geometry,
    input: TrajectoryInput,
    k_limit: u8,
    mut is_free: impl FnMut(BlockIdx) -> bool,
) -> Option<(u8, BlockIdx)> {
    for k in 0..=k_limit.min(crate::MAX_SHADOW_K) {
        if let Some(candidate) = trajectory(geo, input, k) {
            if is_free(candidate) {
                return Some((k, candidate));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> Geometry {
        Geometry::from_fixed(4096, 512, 100_000, 16, 32, 64, 64, 128, 10_000, 10_128, 1_000)
    }

    fn input(logical: u64) -> TrajectoryInput {
        TrajectoryInput {
            gravity_center: 200,
            orbit_vector: OrbitVector::new(0xDEAD_BEEF_CAFE),
            logical: LogicalIdx::new(logical),
            fractal_scale: 2,
        }
    }

    #[test]
    fn is_deterministic_across_calls() {
        let geo = geo();
        let a = trajectory(&geo, input(5), 0);
        let b = trajectory(&geo, input(5), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn primary_candidate_follows_stride() {
        let geo = geo();
        let addr = trajectory(&geo, input(3), 0).unwrap();
        assert_eq!(addr.get(), geo.flux_start + 200 + 3 * 4); // stride = 2^2 = 4
    }

    #[test]
    fn distinct_k_values_give_distinct_candidates_mostly() {
        let geo = geo();
        let inp = input(7);
        let c0 = trajectory(&geo, inp, 0).unwrap();
        let c1 = trajectory(&geo, inp, 1).unwrap();
        assert_ne!(c0, c1);
    }

    #[test]
    fn out_of_flux_candidate_is_none() {
        let geo = geo();
        let inp = TrajectoryInput {
            gravity_center: geo.flux_blocks, // one past the last Flux offset
            orbit_vector: OrbitVector::new(1),
            logical: LogicalIdx::new(0),
            fractal_scale: 0,
        };
        assert_eq!(trajectory(&geo, inp, 0), None);
    }

    #[test]
    fn first_free_candidate_skips_occupied() {
        let geo = geo();
        let inp = input(1);
        let first = trajectory(&geo, inp, 0).unwrap();
        let found = first_free_candidate(&geo, inp, 3, |addr| addr != first);
        assert!(found.is_some());
        assert_ne!(found.unwrap().1, first);
    }

    #[test]
    fn first_free_candidate_respects_k_limit() {
        let geo = geo();
        let inp = input(1);
        let found = first_free_candidate(&geo, inp, 0, |_| false);
        assert_eq!(found, None);
    }
}
