//! `archive-cli read`: lists (and, with `-v`, describes) an archive's
//! entries. Extraction to disk is out of scope (Non-goals carried
//! forward from spec.md §1) — this is a lister/verifier, the moral
//! equivalent of `tar -tv`.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use archive_core::entry::{Entry, FileType};
use archive_core::read::{FilterBidder, FormatReader, ReaderBuilder};
use clap::Args;

use super::build_matcher;

#[derive(Args)]
pub struct ReadArgs {
    /// Archive to read
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Force a single decompression filter instead of autodetecting one
    /// (`gzip`, `bzip2`, `xz`, `compress`, `rpm`, `uu`)
    #[arg(short = 'C', long = "compression")]
    compression: Option<String>,

    /// Restrict format bidding to a single named reader (`ustar`,
    /// `gnutar`, `pax`, `oldtar`, `newc`, `odc`, `zip`, `ar`)
    #[arg(short = 'x', long = "format")]
    format: Option<String>,

    /// Only list entries matching this glob (repeatable)
    #[arg(long = "include")]
    include: Vec<String>,

    /// Exclude entries matching this glob (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Print mode/owner/size/mtime alongside each pathname
    #[arg(short = 'v', long)]
    verbose: bool,
}

pub fn run(args: &ReadArgs) -> Result<()> {
    let file = File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;

    let mut builder = ReaderBuilder::new();

    if let Some(name) = &args.compression {
        let bidder = archive_filters::default_bidders()
            .into_iter()
            .find(|b| b.name() == name)
            .with_context(|| format!("unknown compression filter {name:?}"))?;
        builder = builder.with_filter(bidder);
    } else {
        for bidder in archive_filters::default_bidders() {
            builder = builder.with_filter(bidder);
        }
    }

    if let Some(name) = &args.format {
        let reader = named_reader(name).with_context(|| format!("unknown archive format {name:?}"))?;
        builder = builder.with_format(reader);
    } else {
        for reader in archive_formats::default_readers() {
            builder = builder.with_format(reader);
        }
    }

    let mut archive = builder.open_seekable(file)?;
    let mut matcher = build_matcher(&args.include, &args.exclude);

    let mut count = 0u64;
    while let Some(entry) = archive.next_header()? {
        if matcher.matches(&entry) {
            print_entry(&entry, args.verbose);
            count += 1;
        }
        archive.read_data_skip()?;
    }
    archive.close()?;

    let unmatched = matcher.unmatched_includes();
    if !unmatched.is_empty() {
        bail!("{} include pattern(s) matched nothing in the archive", unmatched.len());
    }

    tracing::info!(entries = count, "listed archive");
    Ok(())
}

fn named_reader(name: &str) -> Option<Box<dyn FormatReader>> {
    archive_formats::default_readers()
        .into_iter()
        .find(|r| r.name() == name)
}

fn print_entry(entry: &Entry, verbose: bool) {
    let path = String::from_utf8_lossy(&entry.pathname);
    if !verbose {
        println!("{path}");
        return;
    }

    let kind = match entry.filetype {
        FileType::Regular => '-',
        FileType::Directory => 'd',
        FileType::Symlink => 'l',
        FileType::HardlinkReference => 'h',
        FileType::CharDevice => 'c',
        FileType::BlockDevice => 'b',
        FileType::Fifo => 'p',
        FileType::Socket => 's',
    };
    let mtime = entry.mtime.map_or(0, |t| t.secs);
    println!(
        "{kind}{:>7o} {:>5}/{:<5} {:>10} {:>12} {path}",
        entry.mode, entry.uid, entry.gid, entry.size, mtime
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_reader_finds_a_registered_format_by_name() {
        assert!(named_reader("ustar").is_some());
        assert!(named_reader("zip").is_some());
        assert!(named_reader("not-a-format").is_none());
    }
}
