use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use ssrf::{Config, Document, domain::DanglingReference};
use tracing::instrument;

#[derive(Debug, Parser)]
#[command(about = "Resolve references and report dangling serials")]
pub struct Check {
    /// A document file, or a directory of dataset files
    path: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    datasets: usize,
    resolved: usize,
    dangling: &'a [DanglingReference],
    cycles: Vec<Vec<String>>,
}

impl Check {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: Option<Config>) -> anyhow::Result<()> {
        let (mut document, config) = super::load(&self.path, config)?;

        let hydrate = document.hydrate_with(|dangling| {
            tracing::debug!(
                "{} {} has dangling {} {}",
                dangling.source_kind,
                dangling.relation,
                dangling.target,
                dangling.serial
            );
        })?;

        let report = Report {
            datasets: hydrate.datasets,
            resolved: hydrate.resolved,
            dangling: &hydrate.dangling,
            cycles: cycles(&document),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_text(&report);
        }

        if config.fail_on_dangling && !report.dangling.is_empty() {
            std::process::exit(1);
        }

        Ok(())
    }
}

/// Reference cycles, each named by the serials of its members.
fn cycles(document: &Document) -> Vec<Vec<String>> {
    document
        .reference_graph()
        .cycles()
        .into_iter()
        .map(|cycle| {
            cycle
                .into_iter()
                .map(|id| {
                    document
                        .get(id)
                        .and_then(|dataset| dataset.serial())
                        .map_or_else(|| id.to_string(), ToString::to_string)
                })
                .collect()
        })
        .collect()
}

fn print_text(report: &Report<'_>) {
    println!(
        "{} datasets, {} references resolved, {} dangling",
        report.datasets,
        report.resolved,
        report.dangling.len()
    );

    for dangling in report.dangling {
        let source = dangling
            .source_serial
            .as_ref()
            .map_or_else(|| "<no serial>".to_string(), ToString::to_string);
        println!(
            "  dangling: {} {source} {}[{}] -> {} {}",
            dangling.source_kind,
            dangling.relation,
            dangling.index,
            dangling.target,
            dangling.serial
        );
    }

    for cycle in &report.cycles {
        println!("  cycle: {}", cycle.join(" -> "));
    }
}
