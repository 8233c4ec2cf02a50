//! The entry value object (spec.md §3 data model).

use std::collections::BTreeMap;

/// One logical object in an archive: a header plus optional body.
///
/// Produced by a reader for every header, or constructed by a client for
/// the writer. Readers overwrite their entry slot on the next
/// `next_header` call — clone if you need to retain one (invariant 5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub pathname: Vec<u8>,
    pub filetype: FileType,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub uname: Option<String>,
    pub gname: Option<String>,
    pub size: u64,
    pub mtime: Option<Timestamp>,
    pub atime: Option<Timestamp>,
    pub ctime: Option<Timestamp>,
    pub birthtime: Option<Timestamp>,
    pub hardlink: Option<Vec<u8>>,
    pub symlink: Option<Vec<u8>>,
    pub device: Option<Device>,
    pub fflags_set: u64,
    pub fflags_clear: u64,
    pub acl: Vec<AclEntry>,
    pub xattrs: BTreeMap<Vec<u8>, Vec<u8>>,
    pub sparse: SparseMap,
    pub mac_metadata: Option<Vec<u8>>,

    /// Identity of the underlying file for hardlink deduplication. Not
    /// part of the wire format; populated by a reader that walks a real
    /// filesystem, or by a client that wants automatic hardlink merging
    /// on write (spec.md §4.5).
    pub dev_ino: Option<(u64, u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Regular,
    Directory,
    Symlink,
    HardlinkReference,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub kind: AclKind,
    pub tag: AclTag,
    pub permissions: u32,
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclKind {
    Access,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTag {
    UserObj,
    User,
    GroupObj,
    Group,
    Mask,
    Other,
}

/// Ordered, non-overlapping `{offset, length}` regions carrying real
/// data. Gaps between regions are implicit zero holes (invariant 3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMap {
    regions: Vec<(u64, u64)>,
}

impl SparseMap {
    pub fn empty() -> Self {
        Self { regions: Vec::new() }
    }

    /// Builds a sparse map, validating invariant 3: regions must be
    /// non-overlapping and strictly ordered by increasing offset.
    pub fn new(regions: Vec<(u64, u64)>) -> Result<Self, String> {
        let mut prev_end: Option<u64> = None;
        for &(offset, length) in &regions {
            if let Some(end) = prev_end {
                if offset < end {
                    return Err(format!(
                        "sparse region at offset {offset} overlaps or precedes previous region ending at {end}"
                    ));
                }
            }
            prev_end = Some(offset + length);
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[(u64, u64)] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Entry {
    pub fn new(pathname: impl Into<Vec<u8>>) -> Self {
        Self {
            pathname: pathname.into(),
            ..Default::default()
        }
    }

    /// Invariant 1/2: non-regular entries, and hardlink references in
    /// particular, carry no body.
    pub fn carries_data(&self) -> bool {
        self.filetype == FileType::Regular && self.hardlink.is_none()
    }

    /// The size a writer should declare on the wire for this entry,
    /// honoring invariant 2 (non-regular entries write size zero).
    pub fn wire_size(&self) -> u64 {
        if self.carries_data() { self.size } else { 0 }
    }
}
