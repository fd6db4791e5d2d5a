//! Command-line interface for docuforge.
//!
//! Provides commands for running the documentary pipeline, checking the
//! installation and managing the viral technique library.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, slugify, Cli, Commands};
