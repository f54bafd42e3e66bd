//! Datasets and their nested value objects.
//!
//! A [`Dataset`] owns one [`ReferenceField`] per relation its kind declares.
//! Raw serials and resolved handles are edited through the relation name;
//! names the kind does not declare are rejected with [`SchemaError`].

use serde::{Deserialize, Serialize};

use crate::domain::{
    EntityId, SerialKey,
    schema::{Cardinality, EntityKind, Relation},
};

/// A top-level SSRF dataset.
///
/// Datasets carry their own serial and one [`ReferenceField`] for every
/// relation their kind declares. Nested value objects ([`Identifier`],
/// [`Address`], [`TelephoneFax`]) are owned outright and play no part in
/// reference resolution.
#[derive(Debug, Clone)]
pub struct Dataset {
    kind: EntityKind,
    serial: Option<SerialKey>,
    title: Option<String>,
    classification: Option<String>,
    description: Option<String>,
    identifiers: Vec<Identifier>,
    address: Option<Address>,
    telephone_fax: Vec<TelephoneFax>,
    /// One field per entry in `kind.relations()`, in the same order.
    pub(crate) references: Vec<ReferenceField>,
    /// Bumped whenever the serial or raw serials change in place.
    revision: u64,
}

// Equality covers content only, not edit bookkeeping.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.serial == other.serial
            && self.title == other.title
            && self.classification == other.classification
            && self.description == other.description
            && self.identifiers == other.identifiers
            && self.address == other.address
            && self.telephone_fax == other.telephone_fax
            && self.references == other.references
    }
}

impl Eq for Dataset {}

/// The raw and resolved halves of one reference relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceField {
    pub(crate) raw: Vec<SerialKey>,
    pub(crate) resolved: Vec<EntityId>,
}

impl ReferenceField {
    /// The serials as they appear in the flat, serialised form.
    #[must_use]
    pub fn raw(&self) -> &[SerialKey] {
        &self.raw
    }

    /// The datasets these serials resolved to.
    ///
    /// Only meaningful after the owning document has been hydrated.
    #[must_use]
    pub fn resolved(&self) -> &[EntityId] {
        &self.resolved
    }
}

/// Errors raised when a dataset is used in a way its kind does not declare.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The relation is not declared by this dataset kind.
    #[error("{kind} has no reference field named '{relation}'")]
    UnknownRelation {
        /// The dataset kind.
        kind: EntityKind,
        /// The name that was looked up.
        relation: String,
    },

    /// More than one serial was supplied for a 0..1 relation.
    #[error("{kind}.{relation} holds at most one reference, got {count}")]
    Cardinality {
        /// The dataset kind.
        kind: EntityKind,
        /// The relation name.
        relation: &'static str,
        /// The number of serials supplied.
        count: usize,
    },
}

/// An alternative identifier for a dataset, such as a national registration
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// The issuing scheme.
    pub scheme: String,
    /// The identifier within the scheme.
    pub value: String,
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street lines, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
    /// City or locality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// A telephone or fax number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephoneFax {
    /// The dialable number.
    pub number: String,
    /// Whether this is a fax line.
    #[serde(default)]
    pub fax: bool,
}

impl Dataset {
    /// Create an empty dataset of the given kind.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            serial: None,
            title: None,
            classification: None,
            description: None,
            identifiers: Vec::new(),
            address: None,
            telephone_fax: Vec::new(),
            references: vec![ReferenceField::default(); kind.relations().len()],
            revision: 0,
        }
    }

    /// The kind of this dataset.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The serial of this dataset, if one has been assigned.
    #[must_use]
    pub const fn serial(&self) -> Option<&SerialKey> {
        self.serial.as_ref()
    }

    /// Whether a serial has been assigned.
    #[must_use]
    pub const fn is_serial_set(&self) -> bool {
        self.serial.is_some()
    }

    /// Set or clear the serial.
    pub fn set_serial(&mut self, serial: Option<SerialKey>) {
        self.serial = serial;
        self.revision = self.revision.wrapping_add(1);
    }

    /// A counter of in-place edits to the serial and raw serials.
    pub(crate) const fn revision(&self) -> u64 {
        self.revision
    }

    /// Builder-style variant of [`Dataset::set_serial`].
    #[must_use]
    pub fn with_serial(mut self, serial: SerialKey) -> Self {
        self.serial = Some(serial);
        self
    }

    /// The human-readable title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether a title has been set.
    #[must_use]
    pub const fn is_title_set(&self) -> bool {
        self.title.is_some()
    }

    /// Set or clear the title.
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// Builder-style variant of [`Dataset::set_title`].
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The security classification marking.
    #[must_use]
    pub fn classification(&self) -> Option<&str> {
        self.classification.as_deref()
    }

    /// Builder-style setter for the classification marking.
    #[must_use]
    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Builder-style setter for the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Alternative identifiers.
    #[must_use]
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Append an alternative identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    /// Postal address.
    #[must_use]
    pub const fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Builder-style setter for the address.
    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Telephone and fax numbers.
    #[must_use]
    pub fn telephone_fax(&self) -> &[TelephoneFax] {
        &self.telephone_fax
    }

    /// Append a telephone or fax number.
    #[must_use]
    pub fn with_telephone_fax(mut self, number: TelephoneFax) -> Self {
        self.telephone_fax.push(number);
        self
    }

    /// Iterate over every declared relation with its field, in schema order.
    pub fn reference_fields(&self) -> impl Iterator<Item = (&'static Relation, &ReferenceField)> {
        self.kind.relations().iter().zip(&self.references)
    }

    /// The raw serials held for a relation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn references(&self, relation: &str) -> Result<&[SerialKey], SchemaError> {
        let (index, _) = self.relation(relation)?;
        Ok(&self.references[index].raw)
    }

    /// Replace the raw serials held for a relation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared, or [`SchemaError::Cardinality`] if more than one serial is
    /// given for a 0..1 relation.
    pub fn set_references(
        &mut self,
        relation: &str,
        serials: Vec<SerialKey>,
    ) -> Result<(), SchemaError> {
        let (index, declared) = self.relation(relation)?;
        if declared.cardinality == Cardinality::Optional && serials.len() > 1 {
            return Err(SchemaError::Cardinality {
                kind: self.kind,
                relation: declared.name,
                count: serials.len(),
            });
        }
        self.references[index].raw = serials;
        self.revision = self.revision.wrapping_add(1);
        Ok(())
    }

    /// Add a raw serial to a relation.
    ///
    /// For a 0..1 relation this replaces any existing serial.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn with_reference(
        mut self,
        relation: &str,
        serial: SerialKey,
    ) -> Result<Self, SchemaError> {
        let (index, declared) = self.relation(relation)?;
        push_or_replace(&mut self.references[index].raw, declared.cardinality, serial);
        Ok(self)
    }

    /// The resolved datasets held for a relation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn resolved(&self, relation: &str) -> Result<&[EntityId], SchemaError> {
        let (index, _) = self.relation(relation)?;
        Ok(&self.references[index].resolved)
    }

    /// Associate a dataset with a relation, bypassing raw serials.
    ///
    /// For a 0..1 relation this replaces any existing association. Call
    /// [`Document::materialize`](crate::domain::Document::materialize) to
    /// write the association back into the raw serials.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn add_resolved(&mut self, relation: &str, target: EntityId) -> Result<(), SchemaError> {
        let (index, declared) = self.relation(relation)?;
        push_or_replace(
            &mut self.references[index].resolved,
            declared.cardinality,
            target,
        );
        Ok(())
    }

    /// Builder-style variant of [`Dataset::add_resolved`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn with_resolved(mut self, relation: &str, target: EntityId) -> Result<Self, SchemaError> {
        self.add_resolved(relation, target)?;
        Ok(self)
    }

    /// Remove the first association with `target` from a relation.
    ///
    /// Returns `true` if an association was removed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn remove_resolved(
        &mut self,
        relation: &str,
        target: EntityId,
    ) -> Result<bool, SchemaError> {
        let (index, _) = self.relation(relation)?;
        let resolved = &mut self.references[index].resolved;
        Ok(resolved
            .iter()
            .position(|&id| id == target)
            .map(|position| resolved.remove(position))
            .is_some())
    }

    /// Remove every association from a relation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelation`] if the relation is not
    /// declared by this dataset's kind.
    pub fn clear_resolved(&mut self, relation: &str) -> Result<(), SchemaError> {
        let (index, _) = self.relation(relation)?;
        self.references[index].resolved.clear();
        Ok(())
    }

    fn relation(&self, name: &str) -> Result<(usize, &'static Relation), SchemaError> {
        self.kind
            .relation(name)
            .ok_or_else(|| SchemaError::UnknownRelation {
                kind: self.kind,
                relation: name.to_string(),
            })
    }
}

fn push_or_replace<T>(values: &mut Vec<T>, cardinality: Cardinality, value: T) {
    if cardinality == Cardinality::Optional {
        values.clear();
    }
    values.push(value);
}
