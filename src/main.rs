//! The `cargo_vendor` OBS source service

use std::{io, process};

use obs_service_cargo_vendor::cli::{self, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn setup_logging(level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_new(level.to_lowercase())?)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() {
    let opt = cli::parse_args();

    if let Err(err) = setup_logging(&opt.log_level) {
        eprintln!("Failed to set up logging: {:#}", err);
        process::exit(1);
    }

    if let Err(err) = cli::vendor(opt) {
        tracing::error!("{:#}", err);
        process::exit(1);
    }
}
