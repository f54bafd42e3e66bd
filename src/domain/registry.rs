//! Index from `(kind, serial)` to the dataset that carries that serial.

use std::collections::HashMap;

use thiserror::Error;
use tracing::instrument;

use crate::domain::{Document, EntityId, EntityKind, SerialKey};

/// Two datasets of the same kind claim the same serial.
///
/// This is a data-integrity defect in the source document. Neither dataset
/// is preferred.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate {kind} serial {serial} (datasets {existing} and {duplicate})")]
pub struct DuplicateKeyError {
    /// The dataset kind.
    pub kind: EntityKind,
    /// The contested serial.
    pub serial: SerialKey,
    /// The dataset registered first.
    pub existing: EntityId,
    /// The dataset that collided with it.
    pub duplicate: EntityId,
}

/// A read-only lookup table over one snapshot of a [`Document`].
///
/// The registry holds values, not borrows, so the document can be mutated
/// while a registry built from it is alive. Any change to the document's
/// datasets is only reflected by building a new registry.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: HashMap<EntityKind, HashMap<SerialKey, EntityId>>,
    len: usize,
}

impl Registry {
    /// Creates an empty registry with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(EntityKind::ALL.len())),
            len: 0,
        }
    }

    /// Registers every dataset in the document that has a serial.
    ///
    /// Datasets without a serial cannot be referenced and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] on the first serial that is claimed by
    /// two datasets of the same kind.
    #[instrument(skip_all, fields(datasets = document.len()))]
    pub fn build(document: &Document) -> Result<Self, DuplicateKeyError> {
        let mut registry = Self::with_capacity(document.len());

        for (id, dataset) in document.iter() {
            let Some(serial) = dataset.serial() else {
                tracing::trace!("skipping {} {id} with no serial", dataset.kind());
                continue;
            };
            registry.register(dataset.kind(), serial.clone(), id)?;
        }

        tracing::debug!("registered {} serials", registry.len());
        Ok(registry)
    }

    /// Inserts a single entry.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] if `(kind, serial)` is already present.
    /// The registry is left unchanged in that case.
    pub fn register(
        &mut self,
        kind: EntityKind,
        serial: SerialKey,
        id: EntityId,
    ) -> Result<(), DuplicateKeyError> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(kind).or_default().entry(serial) {
            Entry::Occupied(entry) => Err(DuplicateKeyError {
                kind,
                serial: entry.key().clone(),
                existing: *entry.get(),
                duplicate: id,
            }),
            Entry::Vacant(entry) => {
                entry.insert(id);
                self.len += 1;
                Ok(())
            }
        }
    }

    /// Finds the dataset of the given kind with the given serial.
    ///
    /// A miss is the normal outcome for a dangling reference.
    #[must_use]
    pub fn lookup(&self, kind: EntityKind, serial: &SerialKey) -> Option<EntityId> {
        self.entries.get(&kind)?.get(serial).copied()
    }

    /// Whether `(kind, serial)` is registered.
    #[must_use]
    pub fn contains(&self, kind: EntityKind, serial: &SerialKey) -> bool {
        self.lookup(kind, serial).is_some()
    }

    /// The number of registered serials.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the registry is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
