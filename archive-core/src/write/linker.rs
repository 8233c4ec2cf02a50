//! Write-side hardlink deduplicator (spec.md §4.5).
//!
//! Different archive formats have different conventions for the same
//! underlying problem (a file seen at more than one path because it has
//! more than one hardlink):
//!
//! - **Old style**: emit every sighting as a full regular entry.
//! - **New style**: emit the first sighting with data, later sightings
//!   as zero-size hardlink references naming the first path.
//!
//! Per spec.md §9's ownership note, the resolver owns clones of pending
//! entries and hands ownership back to the caller on emission — it does
//! not hold borrows across write-loop iterations. The write loop shape
//! is: feed an entry in, get zero or more ready-to-emit entries out.

use std::collections::HashMap;

use crate::entry::{Entry, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Every sighting of a (dev, ino) pair is emitted as a full entry.
    OldStyle,
    /// First sighting gets the data; later sightings become hardlink
    /// references to the first sighting's path.
    NewStyle,
}

#[derive(Default)]
pub struct LinkResolver {
    strategy: Option<LinkStrategy>,
    seen: HashMap<(u64, u64), Vec<u8>>,
}

impl LinkResolver {
    pub fn new(strategy: LinkStrategy) -> Self {
        Self {
            strategy: Some(strategy),
            seen: HashMap::new(),
        }
    }

    /// No-op resolver for formats/clients that don't want hardlink
    /// merging (e.g. `ar`, which has no hardlink concept).
    pub fn disabled() -> Self {
        Self {
            strategy: None,
            seen: HashMap::new(),
        }
    }

    /// Feeds one entry through the resolver. Returns the entry (possibly
    /// rewritten into a hardlink reference) ready for immediate
    /// emission. Entries whose `dev_ino` is unset, or with link count
    /// not worth tracking, pass straight through.
    pub fn feed(&mut self, mut entry: Entry) -> Entry {
        let Some(strategy) = self.strategy else {
            return entry;
        };
        let Some(key) = entry.dev_ino else {
            return entry;
        };
        if entry.filetype != FileType::Regular {
            return entry;
        }

        match strategy {
            LinkStrategy::OldStyle => {
                // Every sighting is emitted as-is; we don't even need to
                // remember it.
                entry
            }
            LinkStrategy::NewStyle => {
                if let Some(first_path) = self.seen.get(&key) {
                    entry.filetype = FileType::HardlinkReference;
                    entry.hardlink = Some(first_path.clone());
                    entry.size = 0;
                    entry
                } else {
                    self.seen.insert(key, entry.pathname.clone());
                    entry
                }
            }
        }
    }

    /// Flushes any entries the resolver is still holding pending
    /// emission. The resolver as specified here never withholds an
    /// entry from immediate emission (every `feed` call returns exactly
    /// one entry), so this is always empty — it exists for
    /// format-specific delayed-data strategies (spec.md §4.5's "spare
    /// entry" pattern) implemented by format plug-ins that wrap this
    /// resolver and buffer their own pending spares.
    pub fn flush(&mut self) -> Vec<Entry> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_style_merges_second_sighting() {
        let mut r = LinkResolver::new(LinkStrategy::NewStyle);
        let mut a = Entry::new(b"a".to_vec());
        a.dev_ino = Some((1, 100));
        a.size = 5;
        let a_out = r.feed(a);
        assert_eq!(a_out.filetype, FileType::Regular);

        let mut b = Entry::new(b"b".to_vec());
        b.dev_ino = Some((1, 100));
        b.size = 5;
        let b_out = r.feed(b);
        assert_eq!(b_out.filetype, FileType::HardlinkReference);
        assert_eq!(b_out.hardlink.as_deref(), Some(b"a".as_slice()));
        assert_eq!(b_out.size, 0);
    }

    #[test]
    fn old_style_emits_every_sighting_in_full() {
        let mut r = LinkResolver::new(LinkStrategy::OldStyle);
        let mut a = Entry::new(b"a".to_vec());
        a.dev_ino = Some((1, 100));
        a.size = 5;
        let mut b = Entry::new(b"b".to_vec());
        b.dev_ino = Some((1, 100));
        b.size = 5;

        assert_eq!(r.feed(a.clone()).filetype, FileType::Regular);
        assert_eq!(r.feed(b.clone()).filetype, FileType::Regular);
    }
}
