//! Locating the Cargo manifest inside an unpacked source tree

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::{DirEntry, WalkDir};

/// The manifest file name `cargo vendor` is run against
pub const MANIFEST_NAME: &str = "Cargo.toml";

/// Walk `root` top-down and return the first file named `file_name`.
///
/// Files in a directory are visited before its subdirectories, and entries
/// are ordered by name, so a manifest closer to the root always wins over
/// one nested further down the same branch.
pub fn find_manifest(root: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by(files_first);

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && entry.file_name() == file_name {
            let path = entry.into_path();
            tracing::debug!("Found manifest: {}", path.display());
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// The directory `cargo` should be run in for a given manifest
pub fn app_dir(manifest: &Path) -> &Path {
    manifest.parent().unwrap_or_else(|| Path::new("."))
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}
