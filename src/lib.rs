//! Serial reference resolution for SSRF datasets
//!
//! Spectrum Supportability Risk Format datasets refer to one another by
//! serial. This crate resolves those serials into direct relationships
//! after a document is loaded ([`Document::hydrate`]) and projects the
//! relationships back into serials before it is written
//! ([`Document::materialize`]).

pub mod domain;
pub use domain::{
    Config, Dataset, DocumentState, Document, DuplicateKeyError, EntityId, EntityKind,
    MaterializeError, Registry, SerialKey,
};

/// Flat-form storage of documents as YAML or JSON files.
pub mod storage;
pub use storage::{Directory, DocumentFile};
