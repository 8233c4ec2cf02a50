//! Filter autodetection / bidding (spec.md §4.1 "Autodetection", §6.3).

use crate::error::Result;

use super::filter::ReadFilter;

/// Number of leading bytes offered to bidders for signature inspection.
const SNIFF_LEN: usize = 512;

/// A registered codec's signature bidder and constructor.
///
/// Implemented by codec plug-ins (the `archive-filters` crate); the core
/// only knows how to run the bidding loop and splice the winner onto the
/// pipeline.
pub trait FilterBidder {
    fn name(&self) -> &'static str;

    /// Inspects `prefix` (the stream's current leading bytes, not yet
    /// consumed) and returns a confidence score. `0` means "no match."
    /// An `Err` aborts the whole open immediately (spec.md §9 Open
    /// Question, resolved: a fatal bid aborts, it does not just get
    /// skipped).
    fn bid(&self, prefix: &[u8]) -> Result<i64>;

    /// Wraps `upstream` in a new filter element implementing this
    /// codec's decompression.
    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>>;
}

/// Repeatedly asks every bidder in `bidders` to inspect the current top
/// of the pipeline; splices on the highest (strictly positive, ties
/// broken by registration order) bidder's filter, then re-runs bidding
/// against the new top so chained transforms (gzip-of-bzip2-of-tar) are
/// discovered. Stops when nobody bids positive.
pub fn autodetect(
    mut top: Box<dyn ReadFilter>,
    bidders: &[Box<dyn FilterBidder>],
) -> Result<Box<dyn ReadFilter>> {
    loop {
        let prefix = top.read_ahead(SNIFF_LEN)?.to_vec();

        let mut best: Option<(i64, usize)> = None;
        for (i, bidder) in bidders.iter().enumerate() {
            let bid = bidder.bid(&prefix)?;
            let better = match best {
                None => bid > 0,
                Some((best_bid, _)) => bid > best_bid,
            };
            if better {
                best = Some((bid, i));
            }
        }

        match best {
            Some((bid, idx)) if bid > 0 => {
                top = bidders[idx].wrap(top)?;
            }
            _ => return Ok(top),
        }
    }
}
