//! Packing the vendor directory into a compressed tarball

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use hex::ToHex;
use sha2::{Digest, Sha256};
use tar::HeaderMode;
use walkdir::WalkDir;
use xz2::write::XzEncoder;

use crate::error::ServiceError;

/// Every archive entry lives below this directory
pub const ARCHIVE_ROOT: &str = "vendor";

/// The supported compression filters. Each is identified by the suffix it
/// gives the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gz,
    Xz,
    Zst,
}

impl Compression {
    pub fn suffix(&self) -> &'static str {
        match self {
            Compression::Gz => "gz",
            Compression::Xz => "xz",
            Compression::Zst => "zst",
        }
    }
}

impl FromStr for Compression {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gz" => Ok(Self::Gz),
            "xz" => Ok(Self::Xz),
            "zst" => Ok(Self::Zst),
            other => Err(ServiceError::UnsupportedCompression(other.to_owned())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// `<outdir>/vendor.tar.<suffix>`
pub fn archive_path(outdir: &Path, compression: Compression) -> PathBuf {
    outdir.join(archive_name(compression))
}

/// The file name of the archive, e.g. `vendor.tar.xz`
pub fn archive_name(compression: Compression) -> String {
    format!("{}.tar.{}", ARCHIVE_ROOT, compression.suffix())
}

enum Encoder<W: Write> {
    Gz(GzEncoder<W>),
    Xz(XzEncoder<W>),
    Zst(zstd::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    fn new(inner: W, compression: Compression) -> io::Result<Self> {
        Ok(match compression {
            Compression::Gz => Self::Gz(GzEncoder::new(inner, flate2::Compression::default())),
            Compression::Xz => Self::Xz(XzEncoder::new(inner, 6)),
            Compression::Zst => Self::Zst(zstd::Encoder::new(inner, 0)?),
        })
    }

    /// Write the compression trailer and hand back the underlying writer.
    fn finish(self) -> io::Result<W> {
        match self {
            Self::Gz(encoder) => encoder.finish(),
            Self::Xz(encoder) => encoder.finish(),
            Self::Zst(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gz(encoder) => encoder.write(buf),
            Self::Xz(encoder) => encoder.write(buf),
            Self::Zst(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gz(encoder) => encoder.flush(),
            Self::Xz(encoder) => encoder.flush(),
            Self::Zst(encoder) => encoder.flush(),
        }
    }
}

/// Archive the contents of `src_dir` as `vendor/...` into `dest`.
///
/// The archive is streamed into a temporary file next to `dest` and only
/// renamed into place once the encoder is finished and the data is synced,
/// so `dest` either holds a complete archive or is left untouched. Returns
/// the number of entries written.
pub fn write_archive(src_dir: &Path, dest: &Path, compression: Compression) -> Result<usize> {
    let dest_dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp_file = tempfile::Builder::new()
        .prefix(".vendor.tar.")
        .tempfile_in(dest_dir)
        .with_context(|| format!("Failed to create archive in {}", dest_dir.display()))?;

    let mut builder = tar::Builder::new(Encoder::new(temp_file, compression)?);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    let mut entries = 0;
    for entry in WalkDir::new(src_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", src_dir.display()))?;
        let relative = entry.path().strip_prefix(src_dir)?;
        let name = if relative.as_os_str().is_empty() {
            PathBuf::from(ARCHIVE_ROOT)
        } else {
            Path::new(ARCHIVE_ROOT).join(relative)
        };

        builder
            .append_path_with_name(entry.path(), &name)
            .with_context(|| format!("Failed to archive {}", entry.path().display()))?;
        entries += 1;
    }

    let temp_file = builder
        .into_inner()
        .and_then(Encoder::finish)
        .with_context(|| format!("Failed to finish archive {}", dest.display()))?;
    temp_file
        .as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync archive {}", dest.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_file.path(), fs::Permissions::from_mode(0o644))?;
    }

    temp_file
        .persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to write file to disk: {}", dest.display()))?;

    tracing::debug!("Archived {} entries from {}", entries, src_dir.display());
    Ok(entries)
}

/// Archive `src_dir` into `dest` and delete `src_dir` once the archive is
/// complete. On failure `src_dir` is kept.
pub fn archive_and_remove(src_dir: &Path, dest: &Path, compression: Compression) -> Result<()> {
    write_archive(src_dir, dest, compression)?;

    fs::remove_dir_all(src_dir)
        .with_context(|| format!("Failed to remove {}", src_dir.display()))?;
    tracing::debug!("Removed {}", src_dir.display());

    Ok(())
}

/// The hex encoded sha256 digest of a file
pub fn sha256_digest(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    loop {
        let consumed = {
            let buffer = reader.fill_buf()?;
            if buffer.is_empty() {
                break;
            }
            hasher.update(buffer);
            buffer.len()
        };
        reader.consume(consumed);
    }

    Ok(hasher.finalize().encode_hex::<String>())
}
