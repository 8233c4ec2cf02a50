//! The cpio family: `newc` (ASCII-hex "new" portable format, read+write)
//! and `odc` (old octal-ASCII "portable" format, read-only).

pub mod newc;
pub mod odc;

use archive_core::error::Result;
use archive_core::read::ReadFilter;
use archive_core::write::WriteFilter;

use crate::error::FormatError;

pub(crate) const TRAILER_NAME: &[u8] = b"TRAILER!!!";

pub(crate) fn read_name(pipe: &mut dyn ReadFilter, namesize: usize, format: &'static str) -> Result<Vec<u8>> {
    let mut name = vec![0u8; namesize];
    let mut filled = 0;
    while filled < namesize {
        let avail = pipe.read_ahead(namesize - filled)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format, detail: "truncated cpio name".into() }.into());
        }
        let take = avail.len().min(namesize - filled);
        name[filled..filled + take].copy_from_slice(&avail[..take]);
        filled += pipe.consume(take)?;
    }
    if name.last() == Some(&0) {
        name.pop();
    }
    Ok(name)
}

pub(crate) fn read_body(pipe: &mut dyn ReadFilter, size: usize, format: &'static str) -> Result<Vec<u8>> {
    let mut out = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let avail = pipe.read_ahead(size - filled)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format, detail: "truncated cpio body".into() }.into());
        }
        let take = avail.len().min(size - filled);
        out[filled..filled + take].copy_from_slice(&avail[..take]);
        filled += pipe.consume(take)?;
    }
    Ok(out)
}

pub(crate) fn pad4(pipe: &mut dyn ReadFilter, total: usize) -> Result<()> {
    let pad = (4 - (total % 4)) % 4;
    if pad > 0 {
        archive_core::read::filter::skip_exact(pipe, pad as u64)?;
    }
    Ok(())
}

pub(crate) fn write_pad4(pipe: &mut dyn WriteFilter, total: usize) -> Result<()> {
    let pad = (4 - (total % 4)) % 4;
    if pad > 0 {
        pipe.write(&[0u8; 4][..pad])?;
    }
    Ok(())
}
