//! Running Cargo subcommands

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::error::ServiceError;

/// The captured result of a finished Cargo process
#[derive(Debug, Default, Clone)]
pub struct CargoOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Something which can run `cargo <args>` inside a directory and wait for it.
pub trait CargoRunner {
    fn run(&self, working_dir: &Path, args: &[String]) -> Result<CargoOutput>;
}

/// Runs a real Cargo binary
pub struct Cargo {
    cargo_bin: PathBuf,
}

impl Cargo {
    pub fn new() -> Self {
        Cargo {
            cargo_bin: PathBuf::from(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())),
        }
    }

    pub fn with_cargo(mut self, cargo_bin: PathBuf) -> Self {
        self.cargo_bin = cargo_bin;
        self
    }
}

impl Default for Cargo {
    fn default() -> Self {
        Self::new()
    }
}

impl CargoRunner for Cargo {
    fn run(&self, working_dir: &Path, args: &[String]) -> Result<CargoOutput> {
        tracing::debug!(
            "Running `{} {}` in {}",
            self.cargo_bin.display(),
            args.join(" "),
            working_dir.display()
        );

        let output = Command::new(&self.cargo_bin)
            .args(args)
            .current_dir(working_dir)
            .output()
            .with_context(|| {
                format!(
                    "Error running cargo '{}' in '{}'",
                    self.cargo_bin.display(),
                    working_dir.display()
                )
            })?;

        Ok(CargoOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a cargo subcommand, turning an unsuccessful exit into
/// [ServiceError::CommandFailed]. Returns the captured stdout.
fn run_checked<R: CargoRunner>(runner: &R, working_dir: &Path, args: Vec<String>) -> Result<String> {
    let command = format!("cargo {}", args.join(" "));
    let output = runner.run(working_dir, &args)?;

    if !output.success {
        tracing::error!("{}", output.stderr.trim_end());
        return Err(ServiceError::CommandFailed {
            command,
            code: output.code,
            stderr: output.stderr.trim().to_owned(),
        }
        .into());
    }

    Ok(output.stdout)
}

/// Collect all dependencies of the package in `app_dir` into `app_dir/vendor`.
/// Cargo prints the source replacement config needed to use them on stdout,
/// which is returned as is.
pub fn vendor<R: CargoRunner>(runner: &R, app_dir: &Path, extra_args: &[String]) -> Result<String> {
    let args = std::iter::once("vendor".to_owned())
        .chain(extra_args.iter().cloned())
        .collect();
    run_checked(runner, app_dir, args)
}

/// Refresh `Cargo.lock` in `app_dir` before vendoring
pub fn update<R: CargoRunner>(runner: &R, app_dir: &Path) -> Result<()> {
    run_checked(runner, app_dir, vec!["update".to_owned()]).map(|_| ())
}
