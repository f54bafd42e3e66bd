//! The `ssrf` command line tool.
//!
//! Loads SSRF documents from YAML or JSON files (or whole directories of
//! them), resolves their serial references and reports on the result.

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
