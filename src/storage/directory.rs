//! A filesystem backed store of SSRF datasets
//!
//! The [`Directory`] merges every dataset file below a root directory into a
//! single [`Document`]. A file holds either a whole [`DocumentFile`] or a
//! single [`DatasetRecord`].

use std::{
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Deserialize;
use tracing::instrument;
use walkdir::WalkDir;

use crate::{
    domain::{Config, Dataset, Document, RuleError, SerialRules},
    storage::{DatasetRecord, DocumentFile, Format, LoadError, RecordError},
};

/// The name of the optional configuration file at the directory root.
pub const CONFIG_FILE: &str = "config.toml";

/// A filesystem backed store of SSRF datasets.
#[derive(Debug, Clone)]
pub struct Directory {
    /// The root of the directory datasets are stored in.
    root: PathBuf,
    config: Config,
}

impl Directory {
    /// Opens a directory at the given path.
    ///
    /// The configuration is read from `config.toml` at the root. A missing or
    /// invalid file falls back to the default configuration.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        let config = load_config(&root);
        Self { root, config }
    }

    /// Opens a directory with an explicit configuration, ignoring any
    /// `config.toml` at the root.
    #[must_use]
    pub const fn with_config(root: PathBuf, config: Config) -> Self {
        Self { root, config }
    }

    /// The root of the directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Load all datasets from disk
    ///
    /// Files are parsed in parallel and merged in sorted path order, so the
    /// resulting document does not depend on the order the filesystem lists
    /// them in. The document is returned unhydrated.
    ///
    /// # Errors
    ///
    /// This method has different behaviour depending on the configuration. If
    /// `allow_unrecognised` is `true`, then any files that cannot be parsed as
    /// datasets are skipped. If `allow_unrecognised` is `false` (the default),
    /// then any such file returns an error.
    ///
    /// A file that parses but holds a record breaking its kind's schema or
    /// the serial rules is always an error ([`DirectoryLoadError::Record`]).
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load_all(&self) -> Result<Document, DirectoryLoadError> {
        let rules = self.config.serial_rules()?;
        let paths = collect_dataset_paths(&self.root);

        let results: Vec<_> = paths
            .par_iter()
            .map(|path| try_load_datasets(path, &rules))
            .collect();

        let mut loaded = Vec::with_capacity(results.len());
        let mut unrecognised = Vec::new();
        for result in results {
            match result {
                Ok(datasets) => loaded.push(datasets),
                Err(FileError::Unrecognised(path)) => unrecognised.push(path),
                Err(FileError::Record {
                    path,
                    index,
                    source,
                }) => {
                    return Err(DirectoryLoadError::Record {
                        path,
                        index,
                        source,
                    });
                }
            }
        }

        if let Some(skipped) = NonEmpty::from_vec(unrecognised) {
            if !self.config.allow_unrecognised {
                return Err(DirectoryLoadError::UnrecognisedFiles(skipped));
            }
            tracing::warn!("skipped {} unrecognised files", skipped.len());
        }

        let mut document = Document::with_capacity(loaded.iter().map(Vec::len).sum());
        for dataset in loaded.into_iter().flatten() {
            document.push(dataset);
        }

        tracing::debug!("loaded {} datasets from {} files", document.len(), paths.len());
        Ok(document)
    }
}

/// Errors that can occur when loading a directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryLoadError {
    /// Files that could not be parsed as datasets.
    UnrecognisedFiles(NonEmpty<PathBuf>),
    /// A parsed record that does not fit its kind's schema or breaks a
    /// serial rule.
    Record {
        /// The file holding the record.
        path: PathBuf,
        /// Position of the record in the file.
        index: usize,
        /// Why the record was rejected.
        #[source]
        source: RecordError,
    },
    /// The configured serial rules do not compile.
    Rules(#[from] RuleError),
}

impl fmt::Display for DirectoryLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        match self {
            Self::UnrecognisedFiles(paths) => {
                write!(f, "unrecognised files: ")?;

                let total = paths.len();
                let displayed_paths: Vec<String> = paths
                    .iter()
                    .take(MAX_DISPLAY)
                    .map(|p| p.display().to_string())
                    .collect();

                let msg = displayed_paths.join(", ");

                if total <= MAX_DISPLAY {
                    write!(f, "{msg}")
                } else {
                    write!(f, "{msg}... (and {} more)", total - MAX_DISPLAY)
                }
            }
            Self::Record { path, index, .. } => {
                write!(f, "dataset {index} in {} is invalid", path.display())
            }
            Self::Rules(e) => write!(f, "{e}"),
        }
    }
}

fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

fn collect_dataset_paths(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            matches!(
                entry.path().extension().and_then(OsStr::to_str),
                Some("yaml" | "yml" | "json")
            )
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

/// The contents of one dataset file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Document(DocumentFile),
    Record(DatasetRecord),
}

impl DatasetFile {
    fn into_records(self) -> Vec<DatasetRecord> {
        match self {
            Self::Document(file) => file.into_records(),
            Self::Record(record) => vec![record],
        }
    }
}

/// Why one file contributed no datasets.
enum FileError {
    /// The file is not a dataset file at all.
    Unrecognised(PathBuf),
    /// The file parsed, but one of its records is invalid.
    Record {
        path: PathBuf,
        index: usize,
        source: RecordError,
    },
}

fn try_load_datasets(path: &Path, rules: &SerialRules) -> Result<Vec<Dataset>, FileError> {
    let records = match read_dataset_file(path) {
        Ok(file) => file.into_records(),
        Err(e) => {
            tracing::debug!("Skipping unparseable file at {}: {e}", path.display());
            return Err(FileError::Unrecognised(path.to_path_buf()));
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_dataset(rules)
                .map_err(|source| FileError::Record {
                    path: path.to_path_buf(),
                    index,
                    source,
                })
        })
        .collect()
}

fn read_dataset_file(path: &Path) -> Result<DatasetFile, LoadError> {
    let content = fs::read_to_string(path)?;
    Ok(match Format::from_path(path) {
        Some(Format::Json) => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    })
}
