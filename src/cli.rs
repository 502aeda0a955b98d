//! Command line interface entry points and utilities

mod opt;
mod vendor;

use clap::Parser;

pub use self::opt::{Strategy, VendorOptions};

// Entrypoints
pub use vendor::vendor;

// Convenience wrappers to avoid dependencies in the binary
pub type Result<T> = anyhow::Result<T>;

pub fn parse_args() -> VendorOptions {
    VendorOptions::parse()
}
