use std::path::{Path, PathBuf};

mod check;
mod normalize;
mod show;

use check::Check;
use clap::ArgAction;
use normalize::Normalize;
use show::Show;
use ssrf::{Config, Directory, Document, DocumentFile};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// A configuration file to use instead of the defaults
    ///
    /// When loading a directory without this flag, `config.toml` at the
    /// directory root is used if present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = self
            .config
            .as_deref()
            .map(Config::load)
            .transpose()
            .map_err(|e| anyhow::anyhow!(e))?;

        self.command.run(config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Resolve every reference and report dangling serials
    ///
    /// Exits with an error if two datasets of the same kind share a serial,
    /// or if dangling references are found and `fail_on_dangling` is set.
    Check(Check),

    /// Show one dataset with its resolved relations and referrers
    Show(Show),

    /// Rewrite a document with its references resolved and re-projected
    ///
    /// Dangling serials are dropped from the output.
    Normalize(Normalize),
}

impl Command {
    fn run(self, config: Option<Config>) -> anyhow::Result<()> {
        match self {
            Self::Check(command) => command.run(config)?,
            Self::Show(command) => command.run(config)?,
            Self::Normalize(command) => command.run(config)?,
        }
        Ok(())
    }
}

/// Loads a document from a single file or from every dataset file below a
/// directory, returning it with the configuration that was applied.
fn load(path: &Path, config: Option<Config>) -> anyhow::Result<(Document, Config)> {
    if path.is_dir() {
        let directory = match config {
            Some(config) => Directory::with_config(path.to_path_buf(), config),
            None => Directory::new(path.to_path_buf()),
        };
        let document = directory.load_all()?;
        Ok((document, directory.config().clone()))
    } else {
        let config = config.unwrap_or_default();
        let document = DocumentFile::load(path, &config)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
        Ok((document, config))
    }
}
