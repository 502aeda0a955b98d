//! The cli entrypoint for the `vendor` strategy

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::archive::{archive_and_remove, archive_path, sha256_digest, Compression};
use crate::cargo::{self, Cargo, CargoRunner};
use crate::cargo_config::write_cargo_config;
use crate::cli::opt::{Strategy, VendorOptions};
use crate::error::ServiceError;
use crate::manifest::{app_dir, find_manifest, MANIFEST_NAME};

/// Vendor the dependencies of the first Cargo project found in `--srcdir`
/// into `--outdir`.
pub fn vendor(opt: VendorOptions) -> Result<()> {
    let mut cargo = Cargo::new();
    if let Some(cargo_bin) = &opt.cargo {
        cargo = cargo.with_cargo(cargo_bin.clone());
    }

    vendor_with(&opt, &cargo)
}

fn vendor_with<R: CargoRunner>(opt: &VendorOptions, runner: &R) -> Result<()> {
    fs::create_dir_all(&opt.outdir)
        .with_context(|| format!("Failed to create {}", opt.outdir.display()))?;

    // Locate the project to vendor
    let manifest = find_manifest(&opt.srcdir, MANIFEST_NAME)?.ok_or_else(|| {
        ServiceError::ManifestNotFound {
            srcdir: opt.srcdir.clone(),
        }
    })?;
    let app_dir = app_dir(&manifest);
    tracing::debug!("Using app directory: {}", app_dir.display());

    match Strategy::from_str(&opt.strategy)? {
        Strategy::Vendor => vendor_strategy(opt, runner, app_dir)?,
    }

    tracing::info!("Successfully vendored dependencies of {}", manifest.display());
    Ok(())
}

fn vendor_strategy<R: CargoRunner>(opt: &VendorOptions, runner: &R, app_dir: &Path) -> Result<()> {
    // Reject the compression before doing any work which needs cleaning up
    let compression = Compression::from_str(&opt.compression)?;

    let vendor_dir = app_dir.join("vendor");
    if vendor_dir.exists() {
        tracing::warn!(
            "{} already exists and will be replaced by `cargo vendor`",
            vendor_dir.display()
        );
    }

    if opt.update() {
        cargo::update(runner, app_dir)?;
    }

    let dest = archive_path(&opt.outdir, compression);
    let config = match vendor_and_archive(runner, app_dir, &vendor_dir, &dest, compression) {
        Ok(config) => config,
        Err(err) => {
            remove_vendor_dir(&vendor_dir);
            return Err(err);
        }
    };

    // The config is only written once the archive is in place
    if let Err(err) = write_cargo_config(&opt.outdir, &config, compression) {
        if let Err(remove_err) = fs::remove_file(&dest) {
            tracing::warn!("Failed to remove {}: {}", dest.display(), remove_err);
        }
        return Err(err);
    }

    log_digest(&dest);

    Ok(())
}

fn vendor_and_archive<R: CargoRunner>(
    runner: &R,
    app_dir: &Path,
    vendor_dir: &Path,
    dest: &Path,
    compression: Compression,
) -> Result<String> {
    let config = cargo::vendor(runner, app_dir, &[])?;

    if !vendor_dir.is_dir() {
        return Err(ServiceError::VendorDirMissing {
            path: vendor_dir.to_path_buf(),
        }
        .into());
    }

    archive_and_remove(vendor_dir, dest, compression)?;
    Ok(config)
}

/// Remove whatever a failed run left of the vendor directory
fn remove_vendor_dir(vendor_dir: &Path) {
    if !vendor_dir.is_dir() {
        return;
    }
    match fs::remove_dir_all(vendor_dir) {
        Ok(()) => tracing::debug!("Removed {}", vendor_dir.display()),
        Err(err) => tracing::warn!("Failed to remove {}: {}", vendor_dir.display(), err),
    }
}

/// Log the digest of the finished archive, or a warning when it cannot be read
fn log_digest(dest: &Path) {
    match sha256_digest(dest) {
        Ok(digest) => tracing::info!("Created {} (sha256: {})", dest.display(), digest),
        Err(err) => tracing::warn!("Created {} (sha256 unavailable: {:#})", dest.display(), err),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::collections::BTreeSet;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    use clap::Parser;

    use crate::cargo_config::CARGO_CONFIG_NAME;
    use crate::test::{archive_entries, FakeCargo};

    fn options(srcdir: &Path, outdir: &Path) -> VendorOptions {
        VendorOptions {
            strategy: "vendor".to_owned(),
            srcdir: srcdir.to_path_buf(),
            outdir: outdir.to_path_buf(),
            compression: "xz".to_owned(),
            update: Some(false),
            cargo: None,
            log_level: "debug".to_owned(),
        }
    }

    /// A source tree with `project/Cargo.toml`
    fn source_tree() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let srcdir = temp_dir.as_ref().join("src");
        let project = srcdir.join("project");
        fs::create_dir_all(&project).unwrap();
        fs::write(
            project.join("Cargo.toml"),
            "[package]\nname = \"project\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let outdir = temp_dir.as_ref().join("out");
        (temp_dir, srcdir, outdir)
    }

    #[test]
    fn vendor_without_config() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a", "crate-b"]);

        vendor_with(&options(&srcdir, &outdir), &cargo).unwrap();

        let archive = outdir.join("vendor.tar.xz");
        assert!(archive.is_file());
        assert!(!outdir.join(CARGO_CONFIG_NAME).exists());
        assert!(!srcdir.join("project").join("vendor").exists());
        assert_eq!(cargo.calls(), vec![vec!["vendor".to_owned()]]);

        let entries = archive_entries(&archive, Compression::Xz);
        assert!(entries.iter().all(|e| e == "vendor" || e.starts_with("vendor/")));
        let crates: BTreeSet<&str> = entries
            .iter()
            .filter_map(|e| e.strip_prefix("vendor/"))
            .filter(|e| !e.contains('/'))
            .collect();
        assert_eq!(crates, ["crate-a", "crate-b"].iter().copied().collect());
    }

    #[test]
    fn vendor_with_config() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let text = "[source.crates-io]\nreplace-with = \"vendored-sources\"\n\n[source.vendored-sources]\ndirectory = \"vendor\"\n";
        let cargo = FakeCargo::new(&["serde"]).with_stdout(text);
        let mut opt = options(&srcdir, &outdir);
        opt.compression = "gz".to_owned();

        vendor_with(&opt, &cargo).unwrap();

        assert_eq!(
            fs::read_to_string(outdir.join(CARGO_CONFIG_NAME)).unwrap(),
            text
        );
        assert!(outdir.join("vendor.tar.gz").is_file());
        assert!(!outdir.join("vendor.tar.xz").exists());
    }

    #[test]
    fn default_run_only_vendors() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]);
        let opt = VendorOptions::try_parse_from([
            OsStr::new("cargo_vendor"),
            OsStr::new("--srcdir"),
            srcdir.as_os_str(),
            OsStr::new("--outdir"),
            outdir.as_os_str(),
        ])
        .unwrap();

        vendor_with(&opt, &cargo).unwrap();

        assert_eq!(cargo.calls(), vec![vec!["vendor".to_owned()]]);
    }

    #[test]
    fn update_runs_before_vendor() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["log"]);
        let mut opt = options(&srcdir, &outdir);
        opt.update = Some(true);

        vendor_with(&opt, &cargo).unwrap();

        assert_eq!(
            cargo.calls(),
            vec![vec!["update".to_owned()], vec!["vendor".to_owned()]]
        );
    }

    #[test]
    fn manifest_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let srcdir = temp_dir.as_ref().join("src");
        fs::create_dir_all(srcdir.join("docs")).unwrap();
        let outdir = temp_dir.as_ref().join("out");
        let cargo = FakeCargo::new(&["crate-a"]);

        let err = vendor_with(&options(&srcdir, &outdir), &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::ManifestNotFound { .. })
        ));
        assert!(cargo.calls().is_empty());
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 0);
    }

    #[test]
    fn invalid_strategy() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]);
        let mut opt = options(&srcdir, &outdir);
        opt.strategy = "tarball".to_owned();

        let err = vendor_with(&opt, &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::InvalidStrategy(s)) if s == "tarball"
        ));
        assert!(cargo.calls().is_empty());
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 0);
    }

    #[test]
    fn unsupported_compression() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]);
        let mut opt = options(&srcdir, &outdir);
        opt.compression = "lz4".to_owned();

        let err = vendor_with(&opt, &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::UnsupportedCompression(_))
        ));
        assert!(cargo.calls().is_empty());
    }

    #[test]
    fn vendor_failure_is_fatal() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]).failing("vendor", "error: failed to download");

        let err = vendor_with(&options(&srcdir, &outdir), &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::CommandFailed { .. })
        ));
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 0);
    }

    #[test]
    fn update_failure_skips_vendor() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]).failing("update", "error: failed to fetch index");
        let mut opt = options(&srcdir, &outdir);
        opt.update = Some(true);

        assert!(vendor_with(&opt, &cargo).is_err());
        assert_eq!(cargo.calls(), vec![vec!["update".to_owned()]]);
    }

    #[test]
    fn failed_vendor_removes_partial_vendor_dir() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"])
            .failing("vendor", "error: failed to download `crate-b`")
            .after_populating();

        let err = vendor_with(&options(&srcdir, &outdir), &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::CommandFailed { .. })
        ));
        assert!(!srcdir.join("project").join("vendor").exists());
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 0);
    }

    #[test]
    fn archive_failure_leaves_no_config() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]).with_stdout("[source.crates-io]\n");
        // A directory in the archive's place makes the final rename fail
        fs::create_dir_all(outdir.join("vendor.tar.xz")).unwrap();

        assert!(vendor_with(&options(&srcdir, &outdir), &cargo).is_err());

        assert!(!outdir.join(CARGO_CONFIG_NAME).exists());
        assert!(outdir.join("vendor.tar.xz").is_dir());
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 1);
        assert!(!srcdir.join("project").join("vendor").exists());
    }

    #[test]
    fn config_failure_removes_archive() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&["crate-a"]).with_stdout("[source.crates-io]\n");
        fs::create_dir_all(outdir.join(CARGO_CONFIG_NAME)).unwrap();

        assert!(vendor_with(&options(&srcdir, &outdir), &cargo).is_err());

        assert!(!outdir.join("vendor.tar.xz").exists());
        assert!(!srcdir.join("project").join("vendor").exists());
    }

    #[test]
    fn digest_failure_is_not_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();

        log_digest(&temp_dir.as_ref().join("vendor.tar.xz"));
    }

    #[test]
    fn missing_vendor_dir() {
        let (_temp_dir, srcdir, outdir) = source_tree();
        let cargo = FakeCargo::new(&[])
            .with_stdout("[source.crates-io]\n")
            .without_vendor_dir();

        let err = vendor_with(&options(&srcdir, &outdir), &cargo).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::VendorDirMissing { .. })
        ));
        assert_eq!(fs::read_dir(&outdir).unwrap().count(), 0);
    }
}
