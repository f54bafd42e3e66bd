//! Domain models for SSRF reference resolution.
//!
//! This module contains the core domain types: serials, dataset kinds and
//! their relations, datasets, the document that owns them, and the registry
//! and resolver that connect them.

/// Serial identifier types and parsing.
pub mod serial;
pub use serial::{Error as SerialError, SerialKey};

/// Dataset kinds and their declared reference relations.
pub mod schema;
pub use schema::{Cardinality, EntityKind, Relation};

pub mod dataset;
pub use dataset::{Address, Dataset, Identifier, ReferenceField, SchemaError, TelephoneFax};

mod document;
pub use document::{Document, DocumentState, EntityId};

/// Index from `(kind, serial)` to dataset.
pub mod registry;
pub use registry::{DuplicateKeyError, Registry};

pub mod resolver;
pub use resolver::{DanglingReference, HydrateReport, MaterializeError, MaterializeReport};

mod graph;
pub use graph::ReferenceGraph;

mod config;
pub use config::{Config, RuleError, SerialRules};
