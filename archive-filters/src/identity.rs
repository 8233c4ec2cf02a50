//! The `none` codec: an explicit pass-through, for clients that want to
//! name "no compression" rather than rely on the pipeline defaulting to
//! the identity leaf.

use archive_core::error::Result;
use archive_core::read::{FilterBidder, ReadFilter};
use archive_core::write::WriteFilter;

/// Never bids: `none` is only ever chosen explicitly by a client
/// building a write pipeline, never autodetected on read.
pub struct Bidder;

impl FilterBidder for Bidder {
    fn name(&self) -> &'static str {
        "none"
    }

    fn bid(&self, _prefix: &[u8]) -> Result<i64> {
        Ok(0)
    }

    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>> {
        Ok(upstream)
    }
}

pub fn writer(upstream: Box<dyn WriteFilter>) -> Box<dyn WriteFilter> {
    upstream
}
