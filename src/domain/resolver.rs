//! The two resolution passes over a [`Document`].
//!
//! - [`hydrate`] turns raw serials into dataset handles using a [`Registry`].
//! - [`materialize`] turns dataset handles back into raw serials.
//!
//! Each pass writes only its own half of every [`ReferenceField`]: hydrate
//! never touches raw serials and materialize never touches resolved handles.
//!
//! [`ReferenceField`]: crate::domain::ReferenceField

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::domain::{Document, EntityId, EntityKind, Registry, SerialKey};

/// A raw serial that names no dataset of the expected kind.
///
/// Dangling references are legal; this is diagnostic information only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// The dataset holding the reference.
    pub source: EntityId,
    /// The kind of the dataset holding the reference.
    pub source_kind: EntityKind,
    /// The serial of the dataset holding the reference, if it has one.
    pub source_serial: Option<SerialKey>,
    /// The relation the serial appears in.
    pub relation: &'static str,
    /// The position of the serial within the relation's raw list.
    pub index: usize,
    /// The unresolved serial.
    pub serial: SerialKey,
    /// The kind of dataset the serial was expected to name.
    pub target: EntityKind,
}

/// Summary of a hydrate pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HydrateReport {
    /// Number of datasets visited.
    pub datasets: usize,
    /// Number of serials that resolved.
    pub resolved: usize,
    /// Every serial that did not resolve, in document order.
    pub dangling: Vec<DanglingReference>,
}

/// Summary of a materialize pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    /// Number of reference fields rewritten.
    pub fields: usize,
    /// Number of serials written across all fields.
    pub references: usize,
}

/// Errors raised when resolved handles cannot be projected back to serials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaterializeError {
    /// The referenced dataset has no serial.
    #[error("{kind} {} references a dataset with no serial at {relation}[{index}] ({target})", display_serial(.serial.as_ref()))]
    MissingIdentity {
        /// The kind of the referencing dataset.
        kind: EntityKind,
        /// The serial of the referencing dataset, if it has one.
        serial: Option<SerialKey>,
        /// The relation holding the reference.
        relation: &'static str,
        /// The position within the relation's resolved list.
        index: usize,
        /// The handle of the dataset lacking a serial.
        target: EntityId,
    },

    /// The handle names no dataset in this document.
    #[error("{kind} {} references unknown dataset {target} at {relation}[{index}]", display_serial(.serial.as_ref()))]
    UnknownTarget {
        /// The kind of the referencing dataset.
        kind: EntityKind,
        /// The serial of the referencing dataset, if it has one.
        serial: Option<SerialKey>,
        /// The relation holding the reference.
        relation: &'static str,
        /// The position within the relation's resolved list.
        index: usize,
        /// The unknown handle.
        target: EntityId,
    },

    /// The handle names a dataset of another kind than the relation targets.
    #[error(
        "{kind} {} references a {found} at {relation}[{index}] ({target}), expected {expected}",
        display_serial(.serial.as_ref())
    )]
    KindMismatch {
        /// The kind of the referencing dataset.
        kind: EntityKind,
        /// The serial of the referencing dataset, if it has one.
        serial: Option<SerialKey>,
        /// The relation holding the reference.
        relation: &'static str,
        /// The position within the relation's resolved list.
        index: usize,
        /// The handle of the mismatched dataset.
        target: EntityId,
        /// The kind the relation expects.
        expected: EntityKind,
        /// The kind of the dataset the handle names.
        found: EntityKind,
    },
}

fn display_serial(serial: Option<&SerialKey>) -> String {
    serial.map_or_else(|| "<no serial>".to_string(), ToString::to_string)
}

/// Resolve every raw serial in the document against `registry`.
///
/// For each dataset, in document order, and each declared relation, the
/// resolved list is replaced by the handles of the raw serials that resolve,
/// in raw order. Repeated serials resolve repeatedly. Serials that do not
/// resolve are skipped and passed to `on_dangling`.
///
/// The registry is expected to have been built from this document; a stale
/// registry yields stale handles.
#[instrument(skip_all, fields(datasets = document.len(), serials = registry.len()))]
pub fn hydrate<F>(document: &mut Document, registry: &Registry, mut on_dangling: F) -> HydrateReport
where
    F: FnMut(&DanglingReference),
{
    let mut report = HydrateReport::default();

    for &id in document.order.values().flatten() {
        let Some(dataset) = document.datasets.get_mut(&id) else {
            continue;
        };
        report.datasets += 1;

        let kind = dataset.kind();
        let relations = kind.relations();
        let source_serial = dataset.serial().cloned();

        for (relation, field) in relations.iter().zip(dataset.references.iter_mut()) {
            let mut resolved = Vec::with_capacity(field.raw.len());

            for (index, serial) in field.raw.iter().enumerate() {
                if let Some(target) = registry.lookup(relation.target, serial) {
                    resolved.push(target);
                    continue;
                }

                tracing::debug!(
                    "dangling reference {kind}.{relation}[{index}] -> {} {serial}",
                    relation.target
                );
                report.dangling.push(DanglingReference {
                    source: id,
                    source_kind: kind,
                    source_serial: source_serial.clone(),
                    relation: relation.name,
                    index,
                    serial: serial.clone(),
                    target: relation.target,
                });
            }

            report.resolved += resolved.len();
            field.resolved = resolved;
        }
    }

    for dangling in &report.dangling {
        on_dangling(dangling);
    }

    report
}

/// Rewrite every raw serial list in the document from its resolved handles.
///
/// All new lists are computed before any is written, so on error the
/// document is unchanged.
///
/// # Errors
///
/// Returns [`MaterializeError::MissingIdentity`] if a resolved handle names a
/// dataset with no serial, [`MaterializeError::UnknownTarget`] if it names
/// no dataset in the document, or [`MaterializeError::KindMismatch`] if it
/// names a dataset of another kind than the relation targets.
#[instrument(skip_all, fields(datasets = document.len()))]
pub fn materialize(document: &mut Document) -> Result<MaterializeReport, MaterializeError> {
    let mut writes: Vec<(EntityId, usize, Vec<SerialKey>)> = Vec::new();

    for (id, dataset) in document.iter() {
        for (field_index, (relation, field)) in dataset.reference_fields().enumerate() {
            let serials = field
                .resolved
                .iter()
                .enumerate()
                .map(|(index, &target)| {
                    let error_context = || (dataset.kind(), dataset.serial().cloned());

                    let Some(referenced) = document.get(target) else {
                        let (kind, serial) = error_context();
                        return Err(MaterializeError::UnknownTarget {
                            kind,
                            serial,
                            relation: relation.name,
                            index,
                            target,
                        });
                    };

                    if referenced.kind() != relation.target {
                        let (kind, serial) = error_context();
                        return Err(MaterializeError::KindMismatch {
                            kind,
                            serial,
                            relation: relation.name,
                            index,
                            target,
                            expected: relation.target,
                            found: referenced.kind(),
                        });
                    }

                    referenced.serial().cloned().ok_or_else(|| {
                        let (kind, serial) = error_context();
                        MaterializeError::MissingIdentity {
                            kind,
                            serial,
                            relation: relation.name,
                            index,
                            target,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            writes.push((id, field_index, serials));
        }
    }

    let mut report = MaterializeReport::default();
    for (id, field_index, serials) in writes {
        let Some(dataset) = document.datasets.get_mut(&id) else {
            continue;
        };
        report.fields += 1;
        report.references += serials.len();
        dataset.references[field_index].raw = serials;
    }

    Ok(report)
}
