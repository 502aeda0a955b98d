//! Failures which end a service run

use std::path::PathBuf;

use thiserror::Error;

/// The ways a service run can fail before or while vendoring. Archive I/O
/// errors are reported through [anyhow::Error] with path context instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No `Cargo.toml` exists anywhere below the source directory.
    #[error("No Cargo.toml found in {}", srcdir.display())]
    ManifestNotFound { srcdir: PathBuf },

    /// Only the `vendor` strategy is implemented.
    #[error("Not a valid strategy: \"{0}\"")]
    InvalidStrategy(String),

    /// The compression id has no matching encoder.
    #[error("Unsupported compression: \"{0}\" (expected one of gz, xz, zst)")]
    UnsupportedCompression(String),

    /// A cargo subcommand exited unsuccessfully.
    #[error("`{command}` failed ({}): {stderr}", describe_code(*code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// `cargo vendor` succeeded but left no vendor directory behind.
    #[error("Vendor directory was not created: {}", path.display())]
    VendorDirMissing { path: PathBuf },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_owned(),
    }
}
