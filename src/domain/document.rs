//! The root aggregate that owns every dataset of one SSRF document.
//!
//! The [`Document`] knows nothing about the on-disk encoding. It stores
//! datasets keyed by a stable [`EntityId`] and keeps per-kind insertion order
//! so output is deterministic.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    Dataset, EntityKind, SerialKey,
    graph::ReferenceGraph,
    registry::{DuplicateKeyError, Registry},
    resolver::{self, DanglingReference, HydrateReport, MaterializeError, MaterializeReport},
};

/// A stable, opaque handle to a dataset within a [`Document`].
///
/// Handles are assigned when a dataset is added and are never reused, so
/// resolved relationships survive reordering and rebuilding of the
/// document's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a document is in its resolution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DocumentState {
    /// Datasets are being added; resolved fields are not trustworthy.
    #[default]
    Building,
    /// Resolved fields reflect the raw serials.
    Hydrated,
    /// Raw serials reflect the resolved fields; ready to serialise.
    Materialized,
}

/// An in-memory SSRF document.
///
/// Datasets are stored in decomposed form:
/// - Content: `HashMap<EntityId, Dataset>`
/// - Order: `BTreeMap<EntityKind, Vec<EntityId>>`, insertion order per kind
///
/// The document is not internally synchronised. Callers must serialise
/// mutation and resolution passes on any one document.
#[derive(Debug, Default, Clone)]
pub struct Document {
    pub(crate) datasets: HashMap<EntityId, Dataset>,
    pub(crate) order: BTreeMap<EntityKind, Vec<EntityId>>,
    state: DocumentState,
    hydrated: bool,
    /// Sum of dataset revisions as of the last resolution pass.
    synced_revision: u64,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            datasets: HashMap::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Adds a dataset, returning its handle.
    ///
    /// This returns the document to [`DocumentState::Building`]. Existing
    /// resolved fields are left as they are, but are stale until the next
    /// [`Document::hydrate`].
    pub fn push(&mut self, dataset: Dataset) -> EntityId {
        let id = EntityId::new();
        self.order.entry(dataset.kind()).or_default().push(id);
        self.datasets.insert(id, dataset);
        self.state = DocumentState::Building;
        id
    }

    /// Removes a dataset, returning it if it existed.
    ///
    /// Resolved fields elsewhere that point at the removed dataset are not
    /// touched; [`Document::materialize`] reports them as
    /// [`MaterializeError::UnknownTarget`].
    pub fn remove(&mut self, id: EntityId) -> Option<Dataset> {
        let dataset = self.datasets.remove(&id)?;
        if let Some(ids) = self.order.get_mut(&dataset.kind()) {
            ids.retain(|&other| other != id);
        }
        self.state = DocumentState::Building;
        Some(dataset)
    }

    /// Retrieves a dataset by handle.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Dataset> {
        self.datasets.get(&id)
    }

    /// Retrieves a dataset by handle for editing.
    ///
    /// Editing resolved fields is the expected way to change relationships
    /// before [`Document::materialize`]. Changing a serial or raw serials
    /// returns the document to [`DocumentState::Building`]; a new
    /// [`Document::hydrate`] is needed before resolved fields reflect them.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Dataset> {
        self.datasets.get_mut(&id)
    }

    /// Whether the handle names a dataset in this document.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.datasets.contains_key(&id)
    }

    /// The number of datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether the document holds no datasets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// The current lifecycle state.
    ///
    /// In-place edits to a serial or to raw serials since the last hydrate
    /// or materialize count as [`DocumentState::Building`].
    #[must_use]
    pub fn state(&self) -> DocumentState {
        if self.state != DocumentState::Building && self.revision() != self.synced_revision {
            DocumentState::Building
        } else {
            self.state
        }
    }

    /// Whether resolved fields may be out of date.
    ///
    /// True once datasets have been added or removed, or a serial or raw
    /// serials edited in place, after a hydrate.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.hydrated && self.state() == DocumentState::Building
    }

    fn revision(&self) -> u64 {
        self.datasets
            .values()
            .map(Dataset::revision)
            .fold(0, u64::wrapping_add)
    }

    /// Iterates over every dataset, grouped by kind in schema order and in
    /// insertion order within each kind.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Dataset)> + '_ {
        self.order
            .values()
            .flatten()
            .filter_map(|&id| self.datasets.get(&id).map(|dataset| (id, dataset)))
    }

    /// Iterates over the datasets of one kind, in insertion order.
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Dataset)> + '_ {
        self.order
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.datasets.get(&id).map(|dataset| (id, dataset)))
    }

    /// Finds a dataset by kind and serial with a linear scan.
    ///
    /// Use a [`Registry`] when many lookups are needed.
    #[must_use]
    pub fn find(&self, kind: EntityKind, serial: &SerialKey) -> Option<EntityId> {
        self.iter_kind(kind)
            .find(|(_, dataset)| dataset.serial() == Some(serial))
            .map(|(id, _)| id)
    }

    /// Builds a registry over the current datasets.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] if two datasets of the same kind share
    /// a serial.
    pub fn registry(&self) -> Result<Registry, DuplicateKeyError> {
        Registry::build(self)
    }

    /// Resolves every raw serial into a dataset handle.
    ///
    /// See [`Document::hydrate_with`].
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] if the registry cannot be built. No
    /// resolved field is modified in that case.
    pub fn hydrate(&mut self) -> Result<HydrateReport, DuplicateKeyError> {
        self.hydrate_with(|_| {})
    }

    /// Resolves every raw serial into a dataset handle, reporting each
    /// dangling reference to `on_dangling`.
    ///
    /// Every resolved field is replaced with a fresh resolution of its raw
    /// serials. Resolved-field edits that have not been materialized are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] if the registry cannot be built. No
    /// resolved field is modified in that case.
    #[instrument(skip_all)]
    pub fn hydrate_with<F>(&mut self, on_dangling: F) -> Result<HydrateReport, DuplicateKeyError>
    where
        F: FnMut(&DanglingReference),
    {
        let registry = self.registry()?;
        let report = resolver::hydrate(self, &registry, on_dangling);

        self.state = DocumentState::Hydrated;
        self.hydrated = true;
        self.synced_revision = self.revision();

        tracing::info!(
            "hydrated {} datasets: {} resolved, {} dangling",
            report.datasets,
            report.resolved,
            report.dangling.len()
        );
        Ok(report)
    }

    /// Rewrites every raw serial field from its resolved field.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError`] if a resolved field points at a dataset
    /// with no serial, or at a handle not in this document. The document is
    /// left unchanged in that case.
    #[instrument(skip_all)]
    pub fn materialize(&mut self) -> Result<MaterializeReport, MaterializeError> {
        if self.is_stale() {
            tracing::debug!("materializing a document with stale resolved fields");
        }

        let report = resolver::materialize(self)?;
        self.state = DocumentState::Materialized;
        self.synced_revision = self.revision();

        tracing::info!(
            "materialized {} references into {} fields",
            report.references,
            report.fields
        );
        Ok(report)
    }

    /// Builds a graph of the resolved relationships.
    #[must_use]
    pub fn reference_graph(&self) -> ReferenceGraph<'_> {
        ReferenceGraph::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(s: &str) -> SerialKey {
        SerialKey::try_from(s).unwrap()
    }

    #[test]
    fn iteration_is_grouped_by_kind_in_insertion_order() {
        let mut document = Document::new();
        let toa = document.push(Dataset::new(EntityKind::Toa));
        let plan_b = document.push(Dataset::new(EntityKind::ChannelPlan));
        let org = document.push(Dataset::new(EntityKind::Organisation));
        let plan_a = document.push(Dataset::new(EntityKind::ChannelPlan));

        let ids: Vec<_> = document.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![org, plan_b, plan_a, toa]);

        let plans: Vec<_> = document
            .iter_kind(EntityKind::ChannelPlan)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(plans, vec![plan_b, plan_a]);
    }

    #[test]
    fn remove_drops_dataset_and_order_entry() {
        let mut document = Document::new();
        let a = document.push(Dataset::new(EntityKind::Note));
        let b = document.push(Dataset::new(EntityKind::Note));

        assert!(document.remove(a).is_some());
        assert!(document.remove(a).is_none());
        assert!(!document.contains(a));
        assert_eq!(document.len(), 1);
        assert_eq!(
            document.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            vec![b]
        );
    }

    #[test]
    fn find_by_serial() {
        let mut document = Document::new();
        let id = document
            .push(Dataset::new(EntityKind::ChannelPlan).with_serial(serial("DEU:NFA:CP:1")));

        assert_eq!(
            document.find(EntityKind::ChannelPlan, &serial("DEU:NFA:CP:1")),
            Some(id)
        );
        assert_eq!(
            document.find(EntityKind::Toa, &serial("DEU:NFA:CP:1")),
            None
        );
    }

    #[test]
    fn state_transitions() {
        let mut document = Document::new();
        assert_eq!(document.state(), DocumentState::Building);
        assert!(!document.is_stale());

        document.push(Dataset::new(EntityKind::Note));
        document.hydrate().unwrap();
        assert_eq!(document.state(), DocumentState::Hydrated);
        assert!(!document.is_stale());

        document.materialize().unwrap();
        assert_eq!(document.state(), DocumentState::Materialized);

        document.push(Dataset::new(EntityKind::Note));
        assert_eq!(document.state(), DocumentState::Building);
        assert!(document.is_stale());

        document.hydrate().unwrap();
        assert!(!document.is_stale());
    }

    #[test]
    fn in_place_raw_edits_make_document_stale() {
        let mut document = Document::new();
        let plan = document
            .push(Dataset::new(EntityKind::ChannelPlan).with_serial(serial("DEU:NFA:CP:1")));
        let toa = document.push(Dataset::new(EntityKind::Toa));
        document.hydrate().unwrap();

        document
            .get_mut(toa)
            .unwrap()
            .set_references("ChannelPlanRef", vec![serial("DEU:NFA:CP:1")])
            .unwrap();

        assert_eq!(document.state(), DocumentState::Building);
        assert!(document.is_stale());

        document.hydrate().unwrap();
        assert!(!document.is_stale());
        assert_eq!(
            document.get(toa).unwrap().resolved("ChannelPlanRef").unwrap(),
            &[plan]
        );

        document
            .get_mut(plan)
            .unwrap()
            .set_serial(Some(serial("DEU:NFA:CP:2")));
        assert!(document.is_stale());
    }

    #[test]
    fn resolved_edits_keep_document_fresh() {
        let mut document = Document::new();
        let plan = document
            .push(Dataset::new(EntityKind::ChannelPlan).with_serial(serial("DEU:NFA:CP:1")));
        let toa = document.push(Dataset::new(EntityKind::Toa));
        document.hydrate().unwrap();

        document
            .get_mut(toa)
            .unwrap()
            .add_resolved("ChannelPlanRef", plan)
            .unwrap();

        assert_eq!(document.state(), DocumentState::Hydrated);
        assert!(!document.is_stale());
    }

    #[test]
    fn failed_hydrate_keeps_state() {
        let mut document = Document::new();
        document.push(Dataset::new(EntityKind::Role).with_serial(serial("USA:AF:RL:1")));
        document.push(Dataset::new(EntityKind::Role).with_serial(serial("USA:AF:RL:1")));

        assert!(document.hydrate().is_err());
        assert_eq!(document.state(), DocumentState::Building);
        assert!(!document.is_stale());
    }
}
