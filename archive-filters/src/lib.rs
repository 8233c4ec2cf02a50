//! Stream transform (codec) plug-ins for `archive-core`'s filter chain:
//! `identity`, `gzip`, `bzip2`, `xz`/`lzma`, `compress`, `uu`,
//! `rpm` (passthrough), and `program` (external command).
//!
//! Every codec but `program` and `rpm` exposes a [`archive_core::read::FilterBidder`]
//! for autodetection plus a `writer()` constructor for explicit
//! selection on the write side; `rpm` only ever makes sense on read
//! (there is no "write an rpm lead" use case in this design), and
//! `program` never bids (spec.md §6.3: an external command has no
//! generic signature to recognize).

mod error;
mod pipe_adapter;

pub mod bzip2_codec;
pub mod compress;
pub mod gzip;
pub mod identity;
pub mod program;
pub mod rpm;
pub mod uu;
pub mod xz;

pub use error::FilterError;

use archive_core::read::FilterBidder;

/// All autodetecting bidders, in the registration order a client would
/// typically want: more specific/faster-to-check signatures first, the
/// historically oldest or loosest-matching ones (like `uu`'s
/// "starts with a text prefix" check) last.
pub fn default_bidders() -> Vec<Box<dyn FilterBidder>> {
    vec![
        Box::new(gzip::Bidder),
        Box::new(bzip2_codec::Bidder),
        Box::new(xz::Bidder),
        Box::new(compress::Bidder),
        Box::new(rpm::Bidder),
        Box::new(uu::Bidder),
    ]
}
