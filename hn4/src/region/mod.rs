//! On-disk regions (§2 SYSTEM OVERVIEW): geometry/layout calculation, the
//! superblock, the allocation bitmap, the Q-Mask quality classification,
//! and the epoch ring.

pub mod bitmap;
pub mod epoch;
pub mod layout;
pub mod qmask;
pub mod superblock;

pub use bitmap::Bitmap;
pub use epoch::EpochRing;
pub use layout::Geometry;
pub use qmask::{QMask, QualityClass};
pub use superblock::Superblock;
