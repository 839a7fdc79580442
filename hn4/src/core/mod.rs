//! Foundational types shared by every layer of the engine: newtypes for
//! the various id/address spaces, the status enum, the CRC seeds, and the
//! small atomic/spin primitives the region layer builds on.

pub mod atomic;
pub mod error;
pub mod hash;
pub mod types;
