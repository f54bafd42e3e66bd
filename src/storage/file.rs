//! YAML and JSON encodings of a whole document.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    domain::{Config, Document, RuleError, SerialRules},
    storage::{DatasetRecord, RecordError},
};

/// The on-disk encoding of a document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.yaml` or `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl Format {
    /// Picks the format from a path's extension.
    ///
    /// Returns `None` for any other extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A whole document in flat form: one record per dataset, in document order.
///
/// Only raw serials are stored. A document's resolved relationships must be
/// materialized before saving if edits to them should be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct DocumentFile {
    datasets: Vec<DatasetRecord>,
}

/// Errors that can occur when loading a document file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The document file was not found.
    #[error("document file not found")]
    NotFound,

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file extension names no supported format.
    #[error("unsupported document format: {}", .0.display())]
    Format(PathBuf),

    /// The YAML content could not be parsed.
    #[error("failed to parse YAML document")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON content could not be parsed.
    #[error("failed to parse JSON document")]
    Json(#[from] serde_json::Error),

    /// A record could not be turned into a dataset.
    #[error("dataset {index} is invalid")]
    Record {
        /// Position of the record in the file.
        index: usize,
        /// Why the record was rejected.
        source: RecordError,
    },

    /// The configured serial rules do not compile.
    #[error(transparent)]
    Rules(#[from] RuleError),
}

/// Errors that can occur when saving a document file.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The document could not be encoded as YAML.
    #[error("failed to write YAML document")]
    Yaml(#[from] serde_yaml::Error),

    /// The document could not be encoded as JSON.
    #[error("failed to write JSON document")]
    Json(#[from] serde_json::Error),

    /// The file extension names no supported format.
    #[error("unsupported document format: {}", .0.display())]
    Format(PathBuf),
}

impl DocumentFile {
    /// Captures the raw serials of every dataset, in document order.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        Self {
            datasets: document
                .iter()
                .map(|(_, dataset)| DatasetRecord::from(dataset))
                .collect(),
        }
    }

    /// The records in file order.
    #[must_use]
    pub fn datasets(&self) -> &[DatasetRecord] {
        &self.datasets
    }

    /// Consumes the file, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<DatasetRecord> {
        self.datasets
    }

    /// Builds a document from the records.
    ///
    /// The returned document is in [`DocumentState::Building`](crate::DocumentState::Building)
    /// and must be hydrated before its relationships can be followed.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Record`] for the first record that does not fit
    /// its kind's schema or breaks a serial rule.
    pub fn into_document(self, rules: &SerialRules) -> Result<Document, LoadError> {
        let mut document = Document::with_capacity(self.datasets.len());
        for (index, record) in self.datasets.into_iter().enumerate() {
            let dataset = record
                .into_dataset(rules)
                .map_err(|source| LoadError::Record { index, source })?;
            document.push(dataset);
        }
        Ok(document)
    }

    /// Reads a document file in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be parsed.
    pub fn read<R: Read>(reader: R, format: Format) -> Result<Self, LoadError> {
        Ok(match format {
            Format::Yaml => serde_yaml::from_reader(reader)?,
            Format::Json => serde_json::from_reader(reader)?,
        })
    }

    /// Writes the document file in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write<W: Write>(&self, mut writer: W, format: Format) -> Result<(), SaveError> {
        match format {
            Format::Yaml => serde_yaml::to_writer(&mut writer, self)?,
            Format::Json => {
                serde_json::to_writer_pretty(&mut writer, self)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Loads a document from a file, picking the format by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if a record is
    /// invalid, or if the configured serial rules do not compile.
    #[instrument(skip(config))]
    pub fn load(path: &Path, config: &Config) -> Result<Document, LoadError> {
        let format = Format::from_path(path).ok_or_else(|| LoadError::Format(path.to_path_buf()))?;
        let rules = config.serial_rules()?;

        let file = File::open(path).map_err(|io_error| match io_error.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Io(io_error),
        })?;

        let document = Self::read(BufReader::new(file), format)?.into_document(&rules)?;
        tracing::debug!("loaded {} datasets", document.len());
        Ok(document)
    }

    /// Saves the raw serials of a document to a file, picking the format by
    /// extension.
    ///
    /// Parent directories are created automatically if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported or the file cannot be
    /// written.
    #[instrument(skip(document))]
    pub fn save(document: &Document, path: &Path) -> Result<(), SaveError> {
        let format = Format::from_path(path).ok_or_else(|| SaveError::Format(path.to_path_buf()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        Self::from_document(document).write(BufWriter::new(file), format)
    }
}

impl From<&Document> for DocumentFile {
    fn from(document: &Document) -> Self {
        Self::from_document(document)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        datasets: Vec<DatasetRecord>,
    },
}

impl From<Versions> for DocumentFile {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { datasets } => Self { datasets },
        }
    }
}

impl From<DocumentFile> for Versions {
    fn from(file: DocumentFile) -> Self {
        Self::V1 {
            datasets: file.datasets,
        }
    }
}
