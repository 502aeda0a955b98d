//! An [OBS](https://openbuildservice.org/) source service which vendors the
//! dependencies of a Cargo project into a compressed tarball.

pub mod cli;

mod archive;
mod cargo;
mod cargo_config;
mod error;
mod manifest;
