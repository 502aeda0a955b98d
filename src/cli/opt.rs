//! A collection of command line options

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::ServiceError;

/// Vendor the dependencies of a Cargo project into a compressed tarball
#[derive(Parser, Debug)]
#[clap(name = "cargo_vendor", about, version)]
pub struct VendorOptions {
    /// The vendoring strategy. `vendor` is the only one available.
    #[clap(long, default_value = "vendor")]
    pub strategy: String,

    /// The directory to search for a `Cargo.toml` file
    #[clap(long)]
    pub srcdir: PathBuf,

    /// The directory to write the vendor tarball and `cargo_config` into
    #[clap(long)]
    pub outdir: PathBuf,

    /// The compression to use for the tarball: `gz`, `xz` or `zst`. Also used
    /// as the tarball's suffix.
    #[clap(long, default_value = "xz")]
    pub compression: String,

    /// Whether or not to run `cargo update` before vendoring (`false` when
    /// not given)
    #[clap(long, parse(try_from_str))]
    pub update: Option<bool>,

    /// The path to a Cargo binary to use for vendoring
    #[clap(long, env = "CARGO")]
    pub cargo: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "OBS_SERVICE_CARGO_LOG", default_value = "debug")]
    pub log_level: String,
}

impl VendorOptions {
    pub fn update(&self) -> bool {
        self.update.unwrap_or(false)
    }
}

/// The ways dependencies can be collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Run `cargo vendor` and archive the result
    Vendor,
}

impl FromStr for Strategy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(Self::Vendor),
            other => Err(ServiceError::InvalidStrategy(other.to_owned())),
        }
    }
}
