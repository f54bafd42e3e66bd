//! The flat, serialisable form of a single dataset.
//!
//! Records carry raw serials only. Resolved relationships exist in memory and
//! are never written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Address, Dataset, EntityKind, Identifier, RuleError, SchemaError, SerialKey, SerialRules,
    TelephoneFax,
};

/// A dataset as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetRecord {
    /// The dataset kind.
    pub kind: EntityKind,
    /// The dataset serial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<SerialKey>,
    /// The human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The classification marking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Alternative identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,
    /// Postal address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Telephone and fax numbers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub telephone_fax: Vec<TelephoneFax>,
    /// Raw serials keyed by relation name. Empty relations are omitted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<SerialKey>>,
}

/// A record that cannot be turned into a dataset.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The record names an undeclared relation or breaks a cardinality.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The record's serial breaks a configured serial rule.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl DatasetRecord {
    /// Converts the record into a dataset, checking relation names,
    /// cardinalities and the serial rules.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the record does not fit its kind's schema or
    /// its serial breaks a rule.
    pub fn into_dataset(self, rules: &SerialRules) -> Result<Dataset, RecordError> {
        if let Some(serial) = &self.serial {
            rules.check(self.kind, serial)?;
        }

        let mut dataset = Dataset::new(self.kind);
        dataset.set_serial(self.serial);
        dataset.set_title(self.title);

        if let Some(classification) = self.classification {
            dataset = dataset.with_classification(classification);
        }
        if let Some(description) = self.description {
            dataset = dataset.with_description(description);
        }
        if let Some(address) = self.address {
            dataset = dataset.with_address(address);
        }
        for identifier in self.identifiers {
            dataset = dataset.with_identifier(identifier);
        }
        for number in self.telephone_fax {
            dataset = dataset.with_telephone_fax(number);
        }

        for (relation, serials) in self.references {
            dataset.set_references(&relation, serials)?;
        }

        Ok(dataset)
    }
}

impl From<&Dataset> for DatasetRecord {
    fn from(dataset: &Dataset) -> Self {
        let references = dataset
            .reference_fields()
            .filter(|(_, field)| !field.raw().is_empty())
            .map(|(relation, field)| (relation.name.to_string(), field.raw().to_vec()))
            .collect();

        Self {
            kind: dataset.kind(),
            serial: dataset.serial().cloned(),
            title: dataset.title().map(ToString::to_string),
            classification: dataset.classification().map(ToString::to_string),
            description: dataset.description().map(ToString::to_string),
            identifiers: dataset.identifiers().to_vec(),
            address: dataset.address().cloned(),
            telephone_fax: dataset.telephone_fax().to_vec(),
            references,
        }
    }
}
