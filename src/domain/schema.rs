//! The SSRF dataset kinds and the reference relations each kind declares.
//!
//! The relation tables here are the single source of truth for resolution:
//! the resolver walks them generically instead of each dataset type carrying
//! its own load/prepare logic.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// How many targets a relation may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// 0..1
    Optional,
    /// 0..n
    Many,
}

/// A reference field declared by a dataset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relation {
    /// The name of the raw reference element, e.g. `ChannelPlanRef`.
    pub name: &'static str,
    /// The kind of dataset the serials in this field name.
    pub target: EntityKind,
    /// Whether the field holds at most one or any number of serials.
    pub cardinality: Cardinality,
}

impl Relation {
    const fn optional(name: &'static str, target: EntityKind) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::Optional,
        }
    }

    const fn many(name: &'static str, target: EntityKind) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::Many,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The top-level, independently serialisable SSRF datasets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityKind {
    /// Administrative dataset.
    Administrative,
    /// An organisation.
    Organisation,
    /// A role within an organisation.
    Role,
    /// A point of contact.
    Contact,
    /// A geographic location.
    Location,
    /// A free-text note, referenced from remarks.
    Note,
    /// A reference to an external document.
    ExternalReference,
    /// A channel plan.
    ChannelPlan,
    /// A table of allocations.
    #[serde(rename = "TOA")]
    Toa,
    /// A transmitter.
    Transmitter,
    /// A receiver.
    Receiver,
    /// An antenna.
    Antenna,
    /// An RF system grouping transmitters, receivers and antennas.
    #[serde(rename = "RFSystem")]
    RfSystem,
    /// A force element.
    ForceElement,
    /// A frequency assignment.
    Assignment,
}

const COMMON: [Relation; 2] = [
    Relation::many("Remarks", EntityKind::Note),
    Relation::many("ExtReferenceRef", EntityKind::ExternalReference),
];

const COMMON_ONLY: &[Relation] = &COMMON;

const ADMINISTRATIVE: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::many("ContactRef", EntityKind::Contact),
];

const ORGANISATION: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("ParentRef", EntityKind::Organisation),
    Relation::optional("LocationRef", EntityKind::Location),
];

const ROLE: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("OrganisationRef", EntityKind::Organisation),
];

const CONTACT: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("OrganisationRef", EntityKind::Organisation),
    Relation::many("RoleRef", EntityKind::Role),
];

const CHANNEL_PLAN: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("OrganisationRef", EntityKind::Organisation),
];

const TOA: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::many("ChannelPlanRef", EntityKind::ChannelPlan),
];

const TRANSMITTER: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("LocationRef", EntityKind::Location),
    Relation::many("AntennaRef", EntityKind::Antenna),
];

const RECEIVER: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("LocationRef", EntityKind::Location),
    Relation::many("AntennaRef", EntityKind::Antenna),
];

const RF_SYSTEM: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::many("TxRef", EntityKind::Transmitter),
    Relation::many("RxRef", EntityKind::Receiver),
    Relation::many("AntennaRef", EntityKind::Antenna),
];

const FORCE_ELEMENT: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::optional("OrganisationRef", EntityKind::Organisation),
    Relation::many("RFSystemRef", EntityKind::RfSystem),
    Relation::optional("ParentRef", EntityKind::ForceElement),
];

const ASSIGNMENT: &[Relation] = &[
    COMMON[0],
    COMMON[1],
    Relation::many("TxRef", EntityKind::Transmitter),
    Relation::many("RxRef", EntityKind::Receiver),
    Relation::optional("ContactRef", EntityKind::Contact),
];

impl EntityKind {
    /// Every kind, in canonical document order.
    pub const ALL: [Self; 15] = [
        Self::Administrative,
        Self::Organisation,
        Self::Role,
        Self::Contact,
        Self::Location,
        Self::Note,
        Self::ExternalReference,
        Self::ChannelPlan,
        Self::Toa,
        Self::Transmitter,
        Self::Receiver,
        Self::Antenna,
        Self::RfSystem,
        Self::ForceElement,
        Self::Assignment,
    ];

    /// The XML element name of the dataset.
    #[must_use]
    pub const fn element(self) -> &'static str {
        match self {
            Self::Administrative => "Administrative",
            Self::Organisation => "Organisation",
            Self::Role => "Role",
            Self::Contact => "Contact",
            Self::Location => "Location",
            Self::Note => "Note",
            Self::ExternalReference => "ExternalReference",
            Self::ChannelPlan => "ChannelPlan",
            Self::Toa => "TOA",
            Self::Transmitter => "Transmitter",
            Self::Receiver => "Receiver",
            Self::Antenna => "Antenna",
            Self::RfSystem => "RFSystem",
            Self::ForceElement => "ForceElement",
            Self::Assignment => "Assignment",
        }
    }

    /// The conventional kind code used in the third segment of serials of
    /// this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Administrative => "AD",
            Self::Organisation => "OR",
            Self::Role => "RL",
            Self::Contact => "CT",
            Self::Location => "LO",
            Self::Note => "NT",
            Self::ExternalReference => "ER",
            Self::ChannelPlan => "CP",
            Self::Toa => "TA",
            Self::Transmitter => "TX",
            Self::Receiver => "RX",
            Self::Antenna => "AN",
            Self::RfSystem => "RS",
            Self::ForceElement => "FE",
            Self::Assignment => "AS",
        }
    }

    /// The reference fields declared by this kind, in schema order.
    #[must_use]
    pub const fn relations(self) -> &'static [Relation] {
        match self {
            Self::Administrative => ADMINISTRATIVE,
            Self::Organisation => ORGANISATION,
            Self::Role => ROLE,
            Self::Contact => CONTACT,
            Self::Location | Self::Note | Self::ExternalReference | Self::Antenna => COMMON_ONLY,
            Self::ChannelPlan => CHANNEL_PLAN,
            Self::Toa => TOA,
            Self::Transmitter => TRANSMITTER,
            Self::Receiver => RECEIVER,
            Self::RfSystem => RF_SYSTEM,
            Self::ForceElement => FORCE_ELEMENT,
            Self::Assignment => ASSIGNMENT,
        }
    }

    /// Finds a declared relation by name, returning its position and
    /// declaration.
    #[must_use]
    pub fn relation(self, name: &str) -> Option<(usize, &'static Relation)> {
        self.relations()
            .iter()
            .enumerate()
            .find(|(_, relation)| relation.name == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.element())
    }
}

/// Error returned when a string names no known dataset kind.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown dataset kind '{0}'")]
pub struct UnknownKindError(String);

impl FromStr for EntityKind {
    type Err = UnknownKindError;

    /// Accepts either the element name (`ChannelPlan`) or the kind code
    /// (`CP`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.element() == s || kind.code() == s)
            .ok_or_else(|| UnknownKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;

    #[test]
    fn relation_names_are_unique_per_kind() {
        for kind in EntityKind::ALL {
            let names: HashSet<_> = kind.relations().iter().map(|r| r.name).collect();
            assert_eq!(names.len(), kind.relations().len(), "{kind}");
        }
    }

    #[test]
    fn every_kind_carries_common_relations() {
        for kind in EntityKind::ALL {
            assert!(kind.relation("Remarks").is_some(), "{kind}");
            assert!(kind.relation("ExtReferenceRef").is_some(), "{kind}");
        }
    }

    #[test]
    fn kind_codes_are_unique() {
        let codes: HashSet<_> = EntityKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), EntityKind::ALL.len());
    }

    #[test]
    fn toa_channel_plans_are_many() {
        let (_, relation) = EntityKind::Toa.relation("ChannelPlanRef").unwrap();
        assert_eq!(relation.target, EntityKind::ChannelPlan);
        assert_eq!(relation.cardinality, Cardinality::Many);
    }

    #[test_case("ChannelPlan", EntityKind::ChannelPlan; "element name")]
    #[test_case("CP", EntityKind::ChannelPlan; "kind code")]
    #[test_case("TOA", EntityKind::Toa; "upper case element")]
    #[test_case("RFSystem", EntityKind::RfSystem; "rf system")]
    fn parse_kind(input: &str, expected: EntityKind) {
        assert_eq!(input.parse::<EntityKind>(), Ok(expected));
    }

    #[test]
    fn parse_unknown_kind_fails() {
        assert!("Satellite".parse::<EntityKind>().is_err());
    }

    #[test]
    fn serde_uses_element_names() {
        let json = serde_json::to_string(&EntityKind::Toa).unwrap();
        assert_eq!(json, "\"TOA\"");
        let kind: EntityKind = serde_json::from_str("\"RFSystem\"").unwrap();
        assert_eq!(kind, EntityKind::RfSystem);
    }
}
