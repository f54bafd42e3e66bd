use std::path::PathBuf;

use clap::Parser;
use ssrf::{Config, DocumentFile};
use tracing::instrument;

#[derive(Debug, Parser)]
#[command(about = "Resolve, re-project and rewrite a document")]
pub struct Normalize {
    /// A document file, or a directory of dataset files
    input: PathBuf,

    /// The file to write; `.yaml`, `.yml` or `.json`
    output: PathBuf,
}

impl Normalize {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: Option<Config>) -> anyhow::Result<()> {
        let (mut document, _) = super::load(&self.input, config)?;

        let hydrate = document.hydrate_with(|dangling| {
            tracing::warn!(
                "dropping dangling {} {} from {}",
                dangling.target,
                dangling.serial,
                dangling.relation
            );
        })?;
        let materialize = document.materialize()?;

        DocumentFile::save(&document, &self.output)?;

        println!(
            "Wrote {} datasets with {} references to {} ({} dangling dropped)",
            hydrate.datasets,
            materialize.references,
            self.output.display(),
            hydrate.dangling.len()
        );
        Ok(())
    }
}
