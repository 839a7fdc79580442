//! The namespace resolver (§4.6): turns a URI into an anchor plus an
//! optional historical generation to read at.

pub mod cortex;
pub mod slice;
pub mod uri;

pub use slice::resolve_slice;
pub use uri::{parse, ParsedUri, Selector, Slice};
