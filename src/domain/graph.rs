//! A directed graph of the resolved relationships in a [`Document`].

use std::collections::HashMap;

use petgraph::{Direction, algo::tarjan_scc, graphmap::DiGraphMap};

use crate::domain::{Document, EntityId};

/// Resolved relationships, with edges pointing from the referencing dataset
/// to the referenced one.
///
/// Built from resolved fields, so it reflects the document as of the last
/// hydrate plus any resolved-field edits since. Parallel references between
/// the same two datasets collapse into one edge labelled with the first
/// relation seen.
#[derive(Debug)]
pub struct ReferenceGraph<'a> {
    document: &'a Document,
    graph: DiGraphMap<EntityId, &'static str>,
    position: HashMap<EntityId, usize>,
}

impl<'a> ReferenceGraph<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        let mut graph = DiGraphMap::with_capacity(document.len(), document.len());
        let mut position = HashMap::with_capacity(document.len());

        for (index, (id, _)) in document.iter().enumerate() {
            graph.add_node(id);
            position.insert(id, index);
        }

        for (id, dataset) in document.iter() {
            for (relation, field) in dataset.reference_fields() {
                for &target in field.resolved() {
                    if !document.contains(target) || graph.contains_edge(id, target) {
                        continue;
                    }
                    graph.add_edge(id, target, relation.name);
                }
            }
        }

        Self {
            document,
            graph,
            position,
        }
    }

    /// Datasets that reference `id`, in document order.
    #[must_use]
    pub fn referrers(&self, id: EntityId) -> Vec<EntityId> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Datasets that `id` references, in document order.
    #[must_use]
    pub fn references(&self, id: EntityId) -> Vec<EntityId> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// The relation labelling the edge from `source` to `target`, if any.
    #[must_use]
    pub fn relation(&self, source: EntityId, target: EntityId) -> Option<&'static str> {
        self.graph.edge_weight(source, target).copied()
    }

    /// The number of distinct referencing edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether any dataset can reach itself by following references.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Every reference cycle, as sets of datasets in document order.
    ///
    /// Cycles are legal in SSRF (an organisation may name itself as parent);
    /// they are reported, not rejected.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<EntityId>> {
        let mut cycles: Vec<Vec<EntityId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [node] => self.graph.contains_edge(*node, *node),
                _ => true,
            })
            .map(|mut component| {
                component.sort_by_key(|id| self.position(*id));
                component
            })
            .collect();

        cycles.sort_by_key(|component| component.first().map(|id| self.position(*id)));
        cycles
    }

    /// The document the graph was built from.
    #[must_use]
    pub const fn document(&self) -> &'a Document {
        self.document
    }

    fn neighbours(&self, id: EntityId, direction: Direction) -> Vec<EntityId> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut ids: Vec<_> = self.graph.neighbors_directed(id, direction).collect();
        ids.sort_by_key(|id| self.position(*id));
        ids
    }

    fn position(&self, id: EntityId) -> usize {
        self.position.get(&id).copied().unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, EntityKind, SerialKey};

    fn serial(s: &str) -> SerialKey {
        SerialKey::try_from(s).unwrap()
    }

    #[test]
    fn referrers_and_references() {
        let mut document = Document::new();
        let org = document
            .push(Dataset::new(EntityKind::Organisation).with_serial(serial("USA:AF:OR:1")));
        let role = document.push(
            Dataset::new(EntityKind::Role)
                .with_reference("OrganisationRef", serial("USA:AF:OR:1"))
                .unwrap(),
        );
        let contact = document.push(
            Dataset::new(EntityKind::Contact)
                .with_reference("OrganisationRef", serial("USA:AF:OR:1"))
                .unwrap(),
        );
        document.hydrate().unwrap();

        let graph = document.reference_graph();

        assert_eq!(graph.referrers(org), vec![role, contact]);
        assert_eq!(graph.references(role), vec![org]);
        assert_eq!(graph.relation(role, org), Some("OrganisationRef"));
        assert_eq!(graph.edge_count(), 2);
        assert!(!graph.has_cycles());
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn cycles_are_reported() {
        let mut document = Document::new();
        let a = document.push(
            Dataset::new(EntityKind::Organisation)
                .with_serial(serial("USA:AF:OR:1"))
                .with_reference("ParentRef", serial("USA:AF:OR:2"))
                .unwrap(),
        );
        let b = document.push(
            Dataset::new(EntityKind::Organisation)
                .with_serial(serial("USA:AF:OR:2"))
                .with_reference("ParentRef", serial("USA:AF:OR:1"))
                .unwrap(),
        );
        let own_parent = document.push(
            Dataset::new(EntityKind::Organisation)
                .with_serial(serial("USA:AF:OR:3"))
                .with_reference("ParentRef", serial("USA:AF:OR:3"))
                .unwrap(),
        );
        document.hydrate().unwrap();

        let graph = document.reference_graph();

        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec![a, b], vec![own_parent]]);
    }

    #[test]
    fn unknown_node_has_no_neighbours() {
        let document = Document::new();
        let graph = document.reference_graph();
        assert!(graph.referrers(EntityId::new()).is_empty());
    }
}
