//! # HN4 HAL - Block Device Abstraction Layer
//!
//! This crate defines the synchronous block-device contract the HN4 engine
//! is written against. An embedder plugs in whatever backs physical storage
//! (a raw device node, an NVMe queue pair, a RAM disk for tests) by
//! implementing [`BlockDevice`]; the engine never talks to hardware itself.
//!
//! ## Design Philosophy
//!
//! - **Synchronous**: every call blocks the caller until completion. The
//!   engine has no internal scheduler and relies on this.
//! - **Sector-addressed at the boundary**: all addresses crossing into this
//!   trait are in logical-block-size (sector) units; block-index-to-sector
//!   conversion happens above this layer.
//! - **Minimal**: read, write, discard, barrier, capability query, clock.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::len_without_is_empty)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

use core::fmt::Debug;
use core::sync::atomic::{AtomicU64, Ordering};

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

/// Errors a [`BlockDevice`] implementation may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The operation is not supported by this device/capability set.
    NotSupported,
    /// Invalid address, length, or alignment.
    InvalidParameter,
    /// The underlying medium reported an I/O error.
    HardwareError,
    /// The device is temporarily unavailable (e.g. queue full).
    ResourceBusy,
    /// The operation exceeded its deadline.
    Timeout,
    /// The address lies outside device capacity.
    InvalidAddress,
    /// The device is mounted or opened read-only.
    ReadOnly,
}

bitflags::bitflags! {
    /// Capability flags reported by a block device.
    ///
    /// Mirrors the disk-layer capability bitset pattern used across this
    /// lineage's storage code: a `repr(transparent)` bit set rather than a
    /// fixed enum, so new capabilities can be added without breaking ABI.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct DeviceCapabilities: u32 {
        /// Supports `discard`/TRIM.
        const TRIM          = 1 << 0;
        /// Supports a cheap secure-erase primitive.
        const SECURE_ERASE  = 1 << 1;
        /// Backed by solid-state (non-rotational) media.
        const SSD           = 1 << 2;
        /// Supports force-unit-access writes.
        const FUA           = 1 << 3;
        /// Supports an explicit write barrier beyond a plain flush.
        const BARRIER       = 1 << 4;
        /// Has a volatile write cache that must be flushed for durability.
        const WRITE_CACHE   = 1 << 5;
        /// Supports atomic multi-sector writes.
        const ATOMIC_WRITE  = 1 << 6;
        /// Persistent-memory class device (supports cache-line writeback
        /// and store-fence instead of a block-level flush).
        const NVM           = 1 << 7;
        /// Zoned-storage device requiring zone-append semantics.
        const ZNS_NATIVE    = 1 << 8;
    }
}

/// Static description of a block device's geometry and capabilities.
#[derive(Clone, Copy, Debug)]
pub struct DeviceInfo {
    /// Logical block (sector) size in bytes. Always a power of two.
    pub sector_size: u32,
    /// Total device capacity in sectors.
    pub total_sectors: u64,
    /// Capability bit flags.
    pub capabilities: DeviceCapabilities,
    /// Zone size in sectors; meaningful only when `ZNS_NATIVE` is set.
    pub zone_size_sectors: u64,
}

impl DeviceInfo {
    /// Total capacity in bytes.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.total_sectors * self.sector_size as u64
    }
}

/// Running counters for a device. Every field is an independent atomic;
/// there is no coarse lock, matching the engine's own counter style.
#[derive(Default)]
pub struct DeviceStats {
    pub sectors_read: AtomicU64,
    pub sectors_written: AtomicU64,
    pub read_ops: AtomicU64,
    pub write_ops: AtomicU64,
    pub read_errors: AtomicU64,
    pub write_errors: AtomicU64,
    pub barrier_ops: AtomicU64,
    pub sectors_discarded: AtomicU64,
}

impl DeviceStats {
    pub const fn new() -> Self {
        Self {
            sectors_read: AtomicU64::new(0),
            sectors_written: AtomicU64::new(0),
            read_ops: AtomicU64::new(0),
            write_ops: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            barrier_ops: AtomicU64::new(0),
            sectors_discarded: AtomicU64::new(0),
        }
    }

    pub fn record_read(&self, sectors: u64) {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
        self.sectors_read.fetch_add(sectors, Ordering::Relaxed);
    }

    pub fn record_write(&self, sectors: u64) {
        self.write_ops.fetch_add(1, Ordering::Relaxed);
        self.sectors_written.fetch_add(sectors, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_barrier(&self) {
        self.barrier_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discard(&self, sectors: u64) {
        self.sectors_discarded.fetch_add(sectors, Ordering::Relaxed);
    }
}

/// The synchronous block-device contract expected of the HAL collaborator.
///
/// All addresses are sector indices (`DeviceInfo::sector_size` units); the
/// engine converts to/from block indices before crossing this boundary.
pub trait BlockDevice: Send + Sync {
    /// Read `buf.len() / sector_size` sectors starting at `sector` into `buf`.
    /// `buf.len()` must be a multiple of the sector size.
    fn read(&self, sector: u64, buf: &mut [u8]) -> HalResult<()>;

    /// Write `buf.len() / sector_size` sectors starting at `sector` from `buf`.
    fn write(&self, sector: u64, buf: &[u8]) -> HalResult<()>;

    /// Hint that `count` sectors starting at `sector` no longer hold live
    /// data (TRIM/discard). Best-effort; devices without `TRIM` may no-op.
    fn discard(&self, sector: u64, count: u64) -> HalResult<()> {
        let _ = (sector, count);
        Ok(())
    }

    /// Block until all previously submitted writes are durable.
    ///
    /// For block devices this is a flush of the volatile write cache. For
    /// `NVM`-capable devices the engine instead prefers
    /// [`BlockDevice::writeback_and_fence`], which is cheaper because it
    /// doesn't round-trip through a queue.
    fn barrier(&self) -> HalResult<()>;

    /// Persistent-memory cache-line writeback for the byte range
    /// `[addr, addr + len)`, followed by a store fence. Only meaningful
    /// when `DeviceCapabilities::NVM` is set; other devices may return
    /// `NotSupported`.
    fn writeback_and_fence(&self, addr: u64, len: usize) -> HalResult<()> {
        let _ = (addr, len);
        Err(HalError::NotSupported)
    }

    /// Monotonic clock, nanoseconds since an arbitrary epoch. Used for
    /// `create_clock`/`mod_clock` stamps; not required to be wall-clock.
    fn monotonic_now_ns(&self) -> u64;

    /// Static geometry and capability description.
    fn info(&self) -> DeviceInfo;

    /// Running I/O counters.
    fn stats(&self) -> &DeviceStats;
}

/// In-memory [`BlockDevice`] used by the engine's own test suite and by
/// embedders exercising the volume lifecycle without real storage.
#[cfg(feature = "alloc")]
pub struct MemoryBlockDevice {
    sector_size: u32,
    sectors: spin::Mutex<alloc::vec::Vec<u8>>,
    stats: DeviceStats,
    capabilities: DeviceCapabilities,
}

#[cfg(feature = "alloc")]
impl MemoryBlockDevice {
    /// Create a zero-filled in-memory device of `total_sectors` sectors.
    pub fn new(sector_size: u32, total_sectors: u64) -> Self {
        Self {
            sector_size,
            sectors: spin::Mutex::new(alloc::vec![0u8; (sector_size as u64 * total_sectors) as usize]),
            stats: DeviceStats::new(),
            capabilities: DeviceCapabilities::TRIM | DeviceCapabilities::SSD | DeviceCapabilities::BARRIER,
        }
    }

    /// Override reported capabilities (e.g. to simulate an `NVM` or
    /// `ZNS_NATIVE` device in tests).
    pub fn with_capabilities(mut self, caps: DeviceCapabilities) -> Self {
        self.capabilities = caps;
        self
    }
}

#[cfg(feature = "alloc")]
impl BlockDevice for MemoryBlockDevice {
    fn read(&self, sector: u64, buf: &mut [u8]) -> HalResult<()> {
        if buf.len() % self.sector_size as usize != 0 {
            return Err(HalError::InvalidParameter);
        }
        let start = sector as usize * self.sector_size as usize;
        let end = start + buf.len();
        let backing = self.sectors.lock();
        if end > backing.len() {
            return Err(HalError::InvalidAddress);
        }
        buf.copy_from_slice(&backing[start..end]);
        self.stats.record_read(buf.len() as u64 / self.sector_size as u64);
        Ok(())
    }

    fn write(&self, sector: u64, buf: &[u8]) -> HalResult<()> {
        if buf.len() % self.sector_size as usize != 0 {
            return Err(HalError::InvalidParameter);
        }
        let start = sector as usize * self.sector_size as usize;
        let end = start + buf.len();
        let mut backing = self.sectors.lock();
        if end > backing.len() {
            return Err(HalError::InvalidAddress);
        }
        backing[start..end].copy_from_slice(buf);
        self.stats.record_write(buf.len() as u64 / self.sector_size as u64);
        Ok(())
    }

    fn discard(&self, sector: u64, count: u64) -> HalResult<()> {
        self.stats.record_discard(count);
        let start = sector as usize * self.sector_size as usize;
        let len = count as usize * self.sector_size as usize;
        let mut backing = self.sectors.lock();
        let end = (start + len).min(backing.len());
        if start < end {
            backing[start..end].fill(0);
        }
        Ok(())
    }

    fn barrier(&self) -> HalResult<()> {
        self.stats.record_barrier();
        Ok(())
    }

    fn writeback_and_fence(&self, _addr: u64, _len: usize) -> HalResult<()> {
        if self.capabilities.contains(DeviceCapabilities::NVM) {
            self.stats.record_barrier();
            Ok(())
        } else {
            Err(HalError::NotSupported)
        }
    }

    fn monotonic_now_ns(&self) -> u64 {
        #[cfg(feature = "std")]
        {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        }
        #[cfg(not(feature = "std"))]
        {
            0
        }
    }

    fn info(&self) -> DeviceInfo {
        let total_sectors = self.sectors.lock().len() as u64 / self.sector_size as u64;
        DeviceInfo {
            sector_size: self.sector_size,
            total_sectors,
            capabilities: self.capabilities,
            zone_size_sectors: 0,
        }
    }

    fn stats(&self) -> &DeviceStats {
        &self.stats
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    #[test]
    fn read_write_roundtrip() {
        let dev = MemoryBlockDevice::new(512, 1024);
        let mut buf = [0xABu8; 512];
        dev.write(10, &buf).unwrap();
        buf.fill(0);
        dev.read(10, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn write_out_of_range_is_invalid_address() {
        let dev = MemoryBlockDevice::new(512, 4);
        let buf = [0u8; 512];
        assert_eq!(dev.write(100, &buf), Err(HalError::InvalidAddress));
    }

    #[test]
    fn unaligned_length_is_invalid_parameter() {
        let dev = MemoryBlockDevice::new(512, 4);
        let buf = [0u8; 100];
        assert_eq!(dev.write(0, &buf), Err(HalError::InvalidParameter));
    }

    #[test]
    fn nvm_writeback_requires_capability() {
        let dev = MemoryBlockDevice::new(512, 4);
        assert_eq!(dev.writeback_and_fence(0, 64), Err(HalError::NotSupported));

        let nvm = MemoryBlockDevice::new(512, 4).with_capabilities(DeviceCapabilities::NVM);
        assert!(nvm.writeback_and_fence(0, 64).is_ok());
    }
}
