//! `archive-cli write`: packages files on disk into an archive. No
//! ACL/xattr/sparse probing (Non-goals carried forward from spec.md
//! §1) — pathname, type, size, mode and mtime only.

use std::fs::{self, File};
use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use archive_core::entry::{Entry, FileType, Timestamp};
use archive_core::write::WriterBuilder;
use clap::Args;

use super::build_matcher;

#[derive(Args)]
pub struct WriteArgs {
    /// Archive to create
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Wrap the output in a compression filter (`gzip`, `bzip2`, `xz`,
    /// `compress`, `uu`)
    #[arg(short = 'C', long = "compression")]
    compression: Option<String>,

    /// Archive format to write (`ustar`, `gnutar`, `pax`, `cpio`,
    /// `zip`, `ar`); defaults to `ustar`
    #[arg(short = 'x', long = "format", default_value = "ustar")]
    format: String,

    /// Only add files matching this glob (repeatable)
    #[arg(long = "include")]
    include: Vec<String>,

    /// Skip files matching this glob (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Print each pathname as it's added
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Files or directories to add, walked recursively
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

pub fn run(args: &WriteArgs) -> Result<()> {
    let sink = File::create(&args.file).with_context(|| format!("creating {}", args.file.display()))?;

    let format = archive_formats::writer_by_name(&args.format)
        .with_context(|| format!("unknown archive format {:?}", args.format))?;

    let builder = WriterBuilder::new().with_format(format);

    let chain: Box<dyn archive_core::write::WriteFilter> = match &args.compression {
        Some(name) => wrap_compression(name, sink)?,
        None => Box::new(archive_core::write::IdentityWriter::new(sink)),
    };

    let mut archive = builder.open_with_chain(chain)?;
    let mut matcher = build_matcher(&args.include, &args.exclude);

    let mut files = Vec::new();
    for input in &args.inputs {
        collect(input, &mut files)?;
    }

    for path in files {
        let entry = entry_for(&path)?;
        if !matcher.matches(&entry) {
            continue;
        }
        if args.verbose {
            println!("{}", String::from_utf8_lossy(&entry.pathname));
        }

        let carries_data = entry.carries_data();
        archive.write_header(entry)?;
        if carries_data {
            let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                let mut chunk = &buf[..n];
                while !chunk.is_empty() {
                    let written = archive.write_data(chunk)?;
                    chunk = &chunk[written..];
                }
            }
        }
        archive.finish_entry()?;
    }

    archive.close()?;
    Ok(())
}

fn wrap_compression(name: &str, sink: File) -> Result<Box<dyn archive_core::write::WriteFilter>> {
    let identity: Box<dyn archive_core::write::WriteFilter> =
        Box::new(archive_core::write::IdentityWriter::new(sink));
    Ok(match name {
        "gzip" => archive_filters::gzip::writer(identity),
        "bzip2" => archive_filters::bzip2_codec::writer(identity),
        "xz" => archive_filters::xz::writer(identity),
        "compress" => archive_filters::compress::writer(identity),
        "uu" => archive_filters::uu::writer(identity),
        other => anyhow::bail!("unknown compression filter {other:?}"),
    })
}

/// Recursively gathers regular files, directories and symlinks under
/// `root`, depth-first.
fn collect(root: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let metadata = fs::symlink_metadata(root).with_context(|| format!("stat {}", root.display()))?;
    out.push(root.to_path_buf());
    if metadata.is_dir() {
        let mut children: Vec<_> = fs::read_dir(root)
            .with_context(|| format!("reading directory {}", root.display()))?
            .collect::<std::io::Result<Vec<_>>>()?;
        children.sort_by_key(std::fs::DirEntry::path);
        for child in children {
            collect(&child.path(), out)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn entry_for(path: &Path) -> Result<Entry> {
    use std::os::unix::fs::MetadataExt;

    let metadata = fs::symlink_metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let file_type = metadata.file_type();

    let filetype = if file_type.is_symlink() {
        FileType::Symlink
    } else if file_type.is_dir() {
        FileType::Directory
    } else {
        FileType::Regular
    };

    let mut pathname = path.to_string_lossy().into_owned();
    if filetype == FileType::Directory && !pathname.ends_with('/') {
        pathname.push('/');
    }

    let mut entry = Entry::new(pathname.into_bytes());
    entry.filetype = filetype;
    entry.mode = metadata.mode() & 0o7777;
    entry.uid = u64::from(metadata.uid());
    entry.gid = u64::from(metadata.gid());
    entry.size = if filetype == FileType::Regular { metadata.size() } else { 0 };
    entry.mtime = Some(Timestamp::new(metadata.mtime(), 0));
    entry.dev_ino = Some((metadata.dev(), metadata.ino()));

    if filetype == FileType::Symlink {
        entry.symlink = Some(fs::read_link(path)?.to_string_lossy().into_owned().into_bytes());
    }

    Ok(entry)
}

#[cfg(not(unix))]
fn entry_for(path: &Path) -> Result<Entry> {
    let metadata = fs::symlink_metadata(path).with_context(|| format!("stat {}", path.display()))?;

    let filetype = if metadata.is_dir() {
        FileType::Directory
    } else {
        FileType::Regular
    };

    let mut pathname = path.to_string_lossy().into_owned();
    if filetype == FileType::Directory && !pathname.ends_with('/') {
        pathname.push('/');
    }

    let mut entry = Entry::new(pathname.into_bytes());
    entry.filetype = filetype;
    entry.mode = if filetype == FileType::Directory { 0o755 } else { 0o644 };
    entry.size = if filetype == FileType::Regular { metadata.len() } else { 0 };
    entry.mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| Timestamp::new(d.as_secs() as i64, d.subsec_nanos()));

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_walks_a_directory_depth_first_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let mut out = Vec::new();
        collect(dir.path(), &mut out).unwrap();

        assert_eq!(out[0], dir.path());
        assert!(out.contains(&dir.path().join("a.txt")));
        assert!(out.contains(&dir.path().join("sub")));
        assert!(out.contains(&dir.path().join("sub/b.txt")));
    }

    #[test]
    fn entry_for_a_regular_file_carries_its_size_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let entry = entry_for(&path).unwrap();
        assert_eq!(entry.filetype, FileType::Regular);
        assert_eq!(entry.size, 11);
        assert!(entry.carries_data());
    }

    #[test]
    fn entry_for_a_directory_has_a_trailing_slash_and_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let entry = entry_for(&sub).unwrap();
        assert_eq!(entry.filetype, FileType::Directory);
        assert!(entry.pathname.ends_with(b"/"));
        assert!(!entry.carries_data());
    }

    #[test]
    fn wrap_compression_rejects_an_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = File::create(dir.path().join("out")).unwrap();
        assert!(wrap_compression("not-a-codec", sink).is_err());
    }
}
