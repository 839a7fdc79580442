//! # HN4 - Block-Addressed Storage Engine
//!
//! HN4 exposes a flat, ID-addressed file abstraction over a single block
//! device. Each file is a 128-bit `seed_id` plus a 128-byte metadata record
//! ("anchor"); file content lives in fixed-size logical blocks that a
//! deterministic placement function ("ballistic trajectory") maps to
//! physical block addresses — there is no indirect-block tree. Updates are
//! out-of-place "shadow hop" writes carrying a per-block generation
//! counter; there is no write-ahead journal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Namespace Resolver                          │
//! │   URI tokenizer · cortex ID lookup · resonance scan · slices    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 Placement / Write / Read Paths                   │
//! │   trajectory() · shadow-hop writer · Horizon ring · read path    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                  Integrity & Q-Mask Layer                         │
//! │   header/payload CRC · generation arbitration · Q-Mask CAS       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       Region Layer                                │
//! │   superblock · layout geometry · bitmap · Q-Mask · epoch ring    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       hn4-hal::BlockDevice                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Format
//!
//! ```text
//! Super region:    geometry, capabilities, region starts, epoch id
//! Epoch ring:      monotonic epoch headers (crash generation seed)
//! Cortex:          anchor table, open-addressed, 128 B slots
//! Bitmap:          one bit per physical block
//! Q-Mask:          two bits per physical block (quality class)
//! Flux (D1):       user data, addressed by trajectory()
//! Horizon (D1.5):  linear ring-allocated fallback region
//! Journal:         reserved tail for epoch ring / recovery only
//! ```

#![no_std]
#![allow(dead_code)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod core;
pub mod region;
pub mod anchor;
pub mod extension;
pub mod trajectory;
pub mod horizon;
pub mod write;
pub mod read;
pub mod integrity;
pub mod resolver;
#[cfg(feature = "alloc")]
pub mod volume;

pub use crate::core::error::{HnResult, Status};
pub use crate::core::types::{BlockIdx, Generation, OrbitVector, SeedId};
#[cfg(feature = "alloc")]
pub use crate::volume::{MountParams, Volume};

/// Default logical block size in bytes.
pub const BLOCK_SIZE: usize = 4096;
pub const BLOCK_SHIFT: u32 = 12;

/// Size of one on-disk anchor record.
pub const ANCHOR_SIZE: usize = 128;

/// Bounded maximum shadow-candidate index (`k` in the trajectory function).
pub const MAX_SHADOW_K: u8 = 12;

/// Maximum extension-chain traversal depth ("Ouroboros defense", §4.5).
pub const MAX_EXTENSION_DEPTH: u8 = 16;

/// Magic number stamped on the superblock: "HN4\0" in little-endian.
pub const HN4_MAGIC: u32 = 0x00_34_4E_48;

/// On-disk format version.
pub const FORMAT_VERSION: u16 = 1;
