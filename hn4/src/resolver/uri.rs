//! Namespace URI grammar (§4.6):
//!
//! ```text
//! id:<32 hex digits>                   -- direct id lookup
//! /tag:T1+T2/trailing-name              -- tag query, optional name filter
//! /tag:T1/tag:T2/trailing-name           -- same query, one tag per hop
//! trailing-name                         -- name lookup (resonance scan)
//! <any of the above>#time:<unix ns>     -- historical slice by time
//! <any of the above>#gen:<u32>          -- historical slice by generation
//! ```

use crate::core::error::{HnResult, Status};
use crate::core::hash::fmix64;
use crate::core::types::SeedId;
use alloc::string::String;
use alloc::vec::Vec;

/// What a URI resolves against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// `id:` — resolved by direct cortex hash lookup.
    Id(SeedId),
    /// `/tag:.../` — resolved by resonance scan with a tag-filter
    /// pre-check. Tags are carried as their folded hash, not the
    /// original string, since the anchor only stores a bloom filter.
    /// The trailing path segment, if non-empty, additionally constrains
    /// the match to that exact name — `ns_resolve("/tag:A/tag:B/name")`
    /// and `ns_resolve("/tag:A+B/name")` must resolve identically (§8),
    /// so every `tag:` segment up to the trailing one contributes to the
    /// same flat tag set regardless of how many hops it took to write.
    Tags(Vec<u64>, Option<String>),
    /// A bare trailing name — resolved by full resonance scan.
    Name(String),
}

/// `#time:`/`#gen:` suffix requesting a historical slice (§4.6, §9 open
/// question #1). Absent means "current".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slice {
    Time(u64),
    Gen(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedUri {
    pub selector: Selector,
    pub slice: Option<Slice>,
}

/// Hash a tag string into the 64-bit form stored in an anchor's bloom
/// filter and compared against during a resonance scan.
pub fn tag_hash(tag: &str) -> u64 {
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
    for b in tag.bytes() {
        acc ^= b as u64;
        acc = acc.wrapping_mul(0x0000_0100_0000_01B3);
    }
    fmix64(acc)
}

pub fn parse(uri: &str) -> HnResult<ParsedUri> {
    if uri.is_empty() {
        return Err(Status::InvalidArgument);
    }

    let (body, slice) = split_slice(uri)?;
    if body.is_empty() {
        return Err(Status::InvalidArgument);
    }

    let selector = if let Some(hex) = body.strip_prefix("id:") {
        Selector::Id(parse_id(hex)?)
    } else if let Some(rest) = body.strip_prefix('/') {
        parse_tag_query(rest)?
    } else {
        Selector::Name(String::from(body))
    };

    Ok(ParsedUri { selector, slice })
}

fn split_slice(uri: &str) -> HnResult<(&str, Option<Slice>)> {
    let Some(pos) = uri.rfind('#') else {
        return Ok((uri, None));
    };
    let (body, tail) = (&uri[..pos], &uri[pos + 1..]);
    if let Some(ns) = tail.strip_prefix("time:") {
        let t: u64 = ns.parse().map_err(|_| Status::InvalidArgument)?;
        Ok((body, Some(Slice::Time(t))))
    } else if let Some(g) = tail.strip_prefix("gen:") {
        let g: u32 = g.parse().map_err(|_| Status::InvalidArgument)?;
        Ok((body, Some(Slice::Gen(g))))
    } else {
        Err(Status::InvalidArgument)
    }
}

fn parse_id(hex: &str) -> HnResult<SeedId> {
    if hex.len() != 32 {
        return Err(Status::InvalidArgument);
    }
    let hi = u64::from_str_radix(&hex[0..16], 16).map_err(|_| Status::InvalidArgument)?;
    let lo = u64::from_str_radix(&hex[16..32], 16).map_err(|_| Status::InvalidArgument)?;
    Ok(SeedId::new(hi, lo))
}

/// Parse `tag:T1[+T2]/tag:T3/.../trailing-name` into a flat tag set plus
/// an optional trailing name constraint. Every `tag:` segment up to (but
/// not including) the final segment contributes to the same set, so a
/// query hopping across several segments and one packing its tags with
/// `+` into a single segment are indistinguishable once parsed (§8).
fn parse_tag_query(rest: &str) -> HnResult<Selector> {
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.len() < 2 {
        return Err(Status::InvalidArgument);
    }
    let (tag_segments, trailing) = segments.split_at(segments.len() - 1);
    let trailing = trailing[0];

    let mut tags = Vec::new();
    for segment in tag_segments {
        let tags_part = segment.strip_prefix("tag:").ok_or(Status::InvalidArgument)?;
        if tags_part.is_empty() {
            return Err(Status::InvalidArgument);
        }
        tags.extend(tags_part.split('+').map(tag_hash));
    }

    let name = if trailing.is_empty() { None } else { Some(String::from(trailing)) };
    Ok(Selector::Tags(tags, name))
}
