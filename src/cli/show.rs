use std::{path::PathBuf, process};

use clap::Parser;
use ssrf::{Config, Dataset, Document, EntityId, EntityKind, SerialKey};
use tracing::instrument;

#[derive(Debug, Parser)]
#[command(about = "Display one dataset and its relationships")]
pub struct Show {
    /// A document file, or a directory of dataset files
    path: PathBuf,

    /// The serial of the dataset to display
    serial: SerialKey,

    /// The dataset kind, by element name or kind code
    ///
    /// Required when datasets of several kinds share the serial.
    #[arg(long)]
    kind: Option<EntityKind>,
}

impl Show {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: Option<Config>) -> anyhow::Result<()> {
        let (mut document, _) = super::load(&self.path, config)?;
        document.hydrate()?;

        let matches: Vec<_> = EntityKind::ALL
            .into_iter()
            .filter(|kind| self.kind.is_none_or(|wanted| wanted == *kind))
            .filter_map(|kind| document.find(kind, &self.serial))
            .collect();

        let id = match matches.as_slice() {
            [] => {
                eprintln!("Dataset {} not found", self.serial);
                process::exit(1);
            }
            [id] => *id,
            _ => {
                let kinds: Vec<_> = matches
                    .iter()
                    .filter_map(|id| document.get(*id))
                    .map(|dataset| dataset.kind().to_string())
                    .collect();
                anyhow::bail!(
                    "serial {} is used by several kinds ({}); pass --kind",
                    self.serial,
                    kinds.join(", ")
                );
            }
        };

        let Some(dataset) = document.get(id) else {
            anyhow::bail!("dataset {id} disappeared from the document");
        };
        print_dataset(&document, id, dataset);
        Ok(())
    }
}

fn print_dataset(document: &Document, id: EntityId, dataset: &Dataset) {
    println!("# {} {}", dataset.kind(), label(document, id));
    if let Some(title) = dataset.title() {
        println!("{title}");
    }
    if let Some(classification) = dataset.classification() {
        println!("  Classification: {classification}");
    }
    if let Some(description) = dataset.description() {
        println!("  Description:    {description}");
    }

    println!("\nReferences");
    for (relation, field) in dataset.reference_fields() {
        if field.raw().is_empty() && field.resolved().is_empty() {
            continue;
        }
        println!("  {}:", relation.name);
        for &target in field.resolved() {
            println!("    -> {} {}", relation.target, label(document, target));
        }
        for serial in field.raw() {
            if document.find(relation.target, serial).is_none() {
                println!("    -> {} {serial} (dangling)", relation.target);
            }
        }
    }

    let graph = document.reference_graph();
    let referrers = graph.referrers(id);
    if !referrers.is_empty() {
        println!("\nReferenced by");
        for referrer in referrers {
            let kind = document
                .get(referrer)
                .map_or_else(String::new, |dataset| dataset.kind().to_string());
            let relation = graph.relation(referrer, id).unwrap_or_default();
            println!("  {kind} {} ({relation})", label(document, referrer));
        }
    }
}

/// The serial of a dataset, or its handle when it has none.
fn label(document: &Document, id: EntityId) -> String {
    document
        .get(id)
        .and_then(Dataset::serial)
        .map_or_else(|| id.to_string(), ToString::to_string)
}
