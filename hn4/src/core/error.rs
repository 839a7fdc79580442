//! The status enum every public operation returns through. One flat
//! `enum`, no payload variants — matching the corpus's preference for
//! plain C-like status codes over heap-allocating error types on hot
//! paths.

use core::fmt;

/// Result alias used throughout the engine.
pub type HnResult<T> = Result<T, Status>;

/// Outcome of an engine operation (§6, §7).
///
/// Three classes, in the order the spec defines them:
/// - informational (`Sparse`) — not an error, no volume side effects beyond
///   a zeroed output buffer;
/// - caller errors — recoverable, no volume side effects;
/// - integrity/environmental — surfaced, never silently repaired.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Status {
    /// Operation completed normally.
    Ok = 0,
    /// Read of an unallocated logical block; output buffer is all zero.
    /// Informational, not an error.
    Sparse,

    // --- caller errors: no volume side effects ---
    /// Malformed argument (oversized payload, malformed URI, ...).
    InvalidArgument,
    /// Permission check failed, or the volume is read-only.
    AccessDenied,
    /// The anchor carries the tombstone flag.
    Tombstone,
    /// The anchor's immutable permission bit is set.
    Immutable,
    /// Resolution found no matching anchor.
    NotFound,
    /// A `#time:`/`#gen:` slice could not be satisfied without retained
    /// history the engine does not keep.
    TimeParadox,

    // --- integrity / environmental: surfaced, never silently repaired ---
    /// Block generation does not match the anchor's `write_gen`.
    GenerationSkew,
    /// Block's `well_id` does not match the anchor's `seed_id`.
    IdMismatch,
    /// Header magic did not validate.
    PhantomBlock,
    /// Header CRC did not validate.
    HeaderRot,
    /// Payload CRC did not validate.
    PayloadRot,
    /// Generic on-disk corruption not covered by a more specific variant.
    DataRot,
    /// The HAL reported an I/O error.
    HardwareIO,
    /// No free, non-toxic candidate was available (Flux exhausted and
    /// Horizon's ring made a full pass with nothing free).
    NoSpace,
    /// Epoch-ring skew or superblock-mirror divergence beyond the
    /// configured threshold; the volume is forced read-only.
    EventHorizon,
    /// The volume is latched in PANIC and rejects all writes.
    GravityCollapse,
    /// The volume has not been mounted.
    Uninitialized,
    /// Requested geometry/capability combination is not supported (e.g.
    /// unmodeled ZNS zone-append).
    Geometry,
}

impl Status {
    /// Relative priority used by the read path to pick the most useful
    /// error among several failed residency candidates (§4.4): higher is
    /// reported in preference to lower.
    pub(crate) fn arbitration_rank(self) -> u8 {
        match self {
            Status::IdMismatch => 5,
            Status::GenerationSkew => 4,
            Status::PayloadRot => 3,
            Status::HeaderRot => 2,
            Status::PhantomBlock => 1,
            _ => 0,
        }
    }

    /// True for the three classes of outcome that must not mutate any
    /// volume state (§7, caller errors).
    pub fn is_caller_error(self) -> bool {
        matches!(
            self,
            Status::InvalidArgument
                | Status::AccessDenied
                | Status::Tombstone
                | Status::Immutable
                | Status::NotFound
                | Status::TimeParadox
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Sparse => "sparse",
            Status::InvalidArgument => "invalid argument",
            Status::AccessDenied => "access denied",
            Status::Tombstone => "tombstone",
            Status::Immutable => "immutable",
            Status::NotFound => "not found",
            Status::TimeParadox => "time paradox",
            Status::GenerationSkew => "generation skew",
            Status::IdMismatch => "id mismatch",
            Status::PhantomBlock => "phantom block",
            Status::HeaderRot => "header rot",
            Status::PayloadRot => "payload rot",
            Status::DataRot => "data rot",
            Status::HardwareIO => "hardware io",
            Status::NoSpace => "no space",
            Status::EventHorizon => "event horizon",
            Status::GravityCollapse => "gravity collapse",
            Status::Uninitialized => "uninitialized",
            Status::Geometry => "geometry",
        };
        f.write_str(s)
    }
}

impl From<hn4_hal::HalError> for Status {
    fn from(e: hn4_hal::HalError) -> Self {
        match e {
            hn4_hal::HalError::ReadOnly => Status::AccessDenied,
            hn4_hal::HalError::InvalidParameter | hn4_hal::HalError::InvalidAddress => {
                Status::InvalidArgument
            }
            _ => Status::HardwareIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbitration_prefers_id_mismatch_over_rot() {
        assert!(Status::IdMismatch.arbitration_rank() > Status::PayloadRot.arbitration_rank());
        assert!(Status::PayloadRot.arbitration_rank() > Status::HeaderRot.arbitration_rank());
        assert!(Status::HeaderRot.arbitration_rank() > Status::PhantomBlock.arbitration_rank());
    }

    #[test]
    fn hal_read_only_maps_to_access_denied() {
        let s: Status = hn4_hal::HalError::ReadOnly.into();
        assert_eq!(s, Status::AccessDenied);
    }
}
