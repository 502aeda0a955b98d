//! Persisting the [Cargo configuration](https://doc.rust-lang.org/cargo/reference/config.html)
//! printed by `cargo vendor`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::archive::{archive_name, Compression};

/// The name of the config file written to the output directory
pub const CARGO_CONFIG_NAME: &str = "cargo_config";

/// The [`[source]`](https://doc.rust-lang.org/cargo/reference/config.html#source)
/// table entries `cargo vendor` emits.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// replace this source with the given named source
    #[serde(rename = "replace-with")]
    pub replace_with: Option<String>,

    /// path to a directory source
    pub directory: Option<String>,

    /// URL of a git source
    pub git: Option<String>,
}

/// A subset of a Cargo configuration file. Only source replacement is of
/// interest here.
#[derive(Debug, Default, Deserialize)]
pub struct CargoConfig {
    /// source definition and replacement
    #[serde(default)]
    pub source: BTreeMap<String, Source>,
}

impl FromStr for CargoConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Write the config text printed by `cargo vendor` into `outdir`, verbatim.
/// Nothing is written when `text` is empty.
pub fn write_cargo_config(
    outdir: &Path,
    text: &str,
    compression: Compression,
) -> Result<Option<PathBuf>> {
    if text.is_empty() {
        return Ok(None);
    }

    let path = outdir.join(CARGO_CONFIG_NAME);
    fs::write(&path, text)
        .with_context(|| format!("Failed to write file to disk: {}", path.display()))?;
    tracing::info!("Generated cargo config: {}", path.display());

    describe(text);
    tracing::info!("{}", usage_example(compression));

    Ok(Some(path))
}

fn describe(text: &str) {
    let config = match CargoConfig::from_str(text) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Vendor output is not a valid cargo config: {:#}", err);
            return;
        }
    };

    for (name, source) in config.source.iter() {
        if let Some(git) = &source.git {
            tracing::debug!("Source `{}` is the git repository {}", name, git);
        }
        if let Some(replacement) = &source.replace_with {
            tracing::debug!("Source `{}` is replaced with `{}`", name, replacement);
        }
        if let Some(directory) = &source.directory {
            tracing::debug!("Source `{}` reads from directory `{}`", name, directory);
        }
    }
}

fn usage_example(compression: Compression) -> String {
    textwrap::dedent(&format!(
        r#"
        To use the vendored sources, add the following to your spec file:

            Source1:        {archive}
            Source2:        {config}

            %prep
            %setup -qa1
            mkdir .cargo
            cp %{{SOURCE2}} .cargo/config
        "#,
        archive = archive_name(compression),
        config = CARGO_CONFIG_NAME,
    ))
}
