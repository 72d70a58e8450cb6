//! `viewforge` renders views from a template directory to stdout.
//!
//! ```text
//! viewforge --dir views render site/index --json '{"title": "Home"}'
//! viewforge --dir views render site/partial --partial
//! viewforge --dir views files site/index --layout page
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` when set; otherwise `-v`
//! raises the level for the `viewforge` crates.

mod cli;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli.execute(&mut out)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("viewforge={level},viewforge_cli={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
