//! The shadow-hop write path (§4.2): policy selection, candidate
//! enumeration, collision hop, frame/seal, persist, anchor commit, and
//! eclipse of the predecessor block — in that order, with no
//! write-ahead journal backing any of it.

use crate::anchor::{Anchor, DataClass, Permissions};
use crate::core::error::{HnResult, Status};
use crate::core::types::{BlockIdx, ClockNs, Generation, LogicalIdx};
use crate::horizon::HorizonRing;
use crate::integrity::{BlockHeader, PAYLOAD_CAPACITY};
use crate::region::bitmap::Bitmap;
use crate::region::layout::Geometry;
use crate::region::qmask::{QMask, QualityClass};
use crate::trajectory::{trajectory, TrajectoryInput};
use hn4_hal::{BlockDevice, DeviceCapabilities};

/// Device class an embedder mounts HN4 against (§4.2 step 1). Drives
/// `k_limit`: how far a write searches Flux for a free shadow candidate
/// before giving up locality and falling back to the Horizon ring.
/// Devices where a seek is expensive (or where "seek" isn't even the
/// right model, as on ZNS) pin `k_limit` to zero so a write either
/// lands on its primary candidate or goes straight to Horizon; devices
/// built for random access can afford to search the whole fan-out.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DeviceProfile {
    /// Microcontroller-class flash, smallest possible search.
    Pico,
    /// Removable USB-attached storage.
    Usb,
    /// Rotational hard disk; a seek is the most expensive thing HN4
    /// can ask of it.
    Hdd,
    /// Zoned-storage device using zone-append semantics.
    Zns,
    /// Solid-state / persistent-memory device with cheap random access.
    #[default]
    SsdNvm,
    /// Workstation-class NVMe tuned for heavy concurrent random access
    /// (AI training sets, game asset streaming).
    AiGaming,
}

impl DeviceProfile {
    /// Best-effort guess from raw HAL capability bits, used only when an
    /// embedder mounts without naming an explicit profile.
    pub fn from_capabilities(caps: DeviceCapabilities) -> Self {
        if caps.contains(DeviceCapabilities::ZNS_NATIVE) {
            DeviceProfile::Zns
        } else if caps.contains(DeviceCapabilities::NVM) {
            DeviceProfile::AiGaming
        } else if caps.contains(DeviceCapabilities::SSD) {
            DeviceProfile::SsdNvm
        } else {
            DeviceProfile::Hdd
        }
    }
}

/// How many shadow candidates (`k`) a write is willing to try before
/// falling back to the Horizon ring, chosen by device profile (§4.2).
#[derive(Clone, Copy, Debug)]
pub struct WritePolicy {
    pub k_limit: u8,
}

impl WritePolicy {
    pub fn for_profile(profile: DeviceProfile) -> Self {
        let k_limit = match profile {
            DeviceProfile::Pico | DeviceProfile::Usb | DeviceProfile::Hdd | DeviceProfile::Zns => 0,
            DeviceProfile::SsdNvm => 8,
            DeviceProfile::AiGaming => crate::MAX_SHADOW_K,
        };
        Self { k_limit }
    }

    pub fn for_capabilities(caps: DeviceCapabilities) -> Self {
        Self::for_profile(DeviceProfile::from_capabilities(caps))
    }
}

fn trajectory_input(anchor: &Anchor, logical: LogicalIdx) -> TrajectoryInput {
    TrajectoryInput {
        gravity_center: anchor.gravity_center,
        orbit_vector: anchor.orbit_vector,
        logical,
        fractal_scale: anchor.fractal_scale,
    }
}

/// Claim a physical block for `logical` under `anchor`: try each shadow
/// candidate in trajectory order, skipping toxic blocks, atomically
/// claiming the first free one via the bitmap. Falls back to the
/// Horizon ring if every candidate up to `policy.k_limit` is occupied.
///
/// The returned `bool` is `true` when the claim came from the Horizon
/// fallback rather than a Flux shadow candidate.
pub fn claim_block(
    geo: &Geometry,
    bitmap: &Bitmap,
    qmask: &QMask,
    horizon: &HorizonRing,
    anchor: &Anchor,
    logical: LogicalIdx,
    policy: WritePolicy,
) -> HnResult<(BlockIdx, bool)> {
    let input = trajectory_input(anchor, logical);
    for k in 0..=policy.k_limit.min(crate::MAX_SHADOW_K) {
        let Some(candidate) = trajectory(geo, input, k) else {
            continue;
        };
        if qmask.get(candidate) == Some(QualityClass::Toxic) {
            continue;
        }
        if bitmap.try_set(candidate) {
            return Ok((candidate, false));
        }
    }
    horizon.allocate(bitmap, qmask).map(|b| (b, true)).ok_or(Status::NoSpace)
}

/// Check the permission gate a write must pass before anything is
/// claimed (§4.2 step 0, §6): read-only volume, missing write
/// permission without the sovereign override, and append-only
/// overwrite of an already-resident block are each an `AccessDenied`,
/// never a silent no-op.
fn check_write_access(anchor: &Anchor, read_only: bool, predecessor: Option<BlockIdx>) -> HnResult<()> {
    if read_only {
        return Err(Status::AccessDenied);
    }
    let perms = anchor.permissions;
    if !perms.contains(Permissions::WRITE) && !perms.contains(Permissions::SOVEREIGN) {
        return Err(Status::AccessDenied);
    }
    if perms.contains(Permissions::APPEND) && predecessor.is_some() {
        return Err(Status::AccessDenied);
    }
    Ok(())
}

/// Write `payload` to `logical` under `anchor`, performing the full
/// shadow-hop protocol: permission gate, claim, frame/seal, persist,
/// commit, eclipse.
///
/// `predecessor` is the block the caller resolved as this logical
/// index's current residency, if any; it is freed only after the new
/// block is durable, so a crash mid-write leaves the old copy intact.
///
/// `read_only` reflects the volume's own mount state (e.g. degraded
/// after a dirty remount), independent of the anchor's own permission
/// bits. Returns the claimed block and whether the write went through
/// the Horizon fallback — the caller uses that to decide whether the
/// anchor record needs an extra, synchronous flush (§4.2 step 6).
#[allow(clippy::too_many_arguments)]
pub fn write_block<D: BlockDevice>(
    device: &D,
    geo: &Geometry,
    bitmap: &Bitmap,
    qmask: &QMask,
    horizon: &HorizonRing,
    anchor: &mut Anchor,
    logical: LogicalIdx,
    payload: &[u8],
    policy: WritePolicy,
    now: ClockNs,
    read_only: bool,
    predecessor: Option<BlockIdx>,
) -> HnResult<(BlockIdx, bool)> {
    if payload.len() > PAYLOAD_CAPACITY {
        return Err(Status::InvalidArgument);
    }
    if anchor.is_tombstoned() {
        return Err(Status::Tombstone);
    }
    if anchor.is_immutable() {
        return Err(Status::Immutable);
    }
    check_write_access(anchor, read_only, predecessor)?;

    let (claimed, via_horizon) = claim_block(geo, bitmap, qmask, horizon, anchor, logical, policy)?;

    let new_gen = Generation::new(anchor.write_gen).next();
    let header = BlockHeader::seal(anchor.seed_id, new_gen, logical.get() as u32, payload);

    let mut frame = [0u8; crate::BLOCK_SIZE];
    frame[..crate::integrity::HEADER_BYTES].copy_from_slice(&header.to_bytes());
    frame[crate::integrity::HEADER_BYTES..crate::integrity::HEADER_BYTES + payload.len()]
        .copy_from_slice(payload);

    let sector = geo.block_to_sector(claimed);
    if let Err(e) = device.write(sector, &frame) {
        qmask.downgrade_one_step(claimed);
        bitmap.clear(claimed);
        return Err(Status::from(e));
    }
    if let Err(e) = device.barrier() {
        bitmap.clear(claimed);
        return Err(Status::from(e));
    }

    anchor.write_gen = new_gen.get();
    anchor.mod_clock = now;
    let byte_len = logical.get() * PAYLOAD_CAPACITY as u64 + payload.len() as u64;
    anchor.mass = anchor.mass.max(byte_len);

    if via_horizon {
        anchor.data_class |= DataClass::HORIZON_HINT;
        // The file's data now clusters in Horizon rather than at its
        // original Flux trajectory; record where, even though this
        // reading is no longer plugged back into trajectory() for
        // future logical blocks under this anchor.
        anchor.gravity_center = claimed.get();
    }
    anchor.reseal();

    if let Some(pred) = predecessor {
        if pred != claimed {
            bitmap.clear(pred);
        }
    }

    Ok((claimed, via_horizon))
}
