use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A single required segment of a serial.
///
/// Guaranteed to be non-empty and free of whitespace, control characters and
/// the `:` delimiter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment(NonEmptyString);

impl Segment {
    /// Creates a new `Segment` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySegment`] if the string is empty, or
    /// [`Error::Character`] if it contains whitespace, a control character or
    /// the `:` delimiter.
    pub fn new(position: Position, s: String) -> Result<Self, Error> {
        check_characters(position, &s)?;
        NonEmptyString::new(s)
            .map(Self)
            .map_err(|_| Error::EmptySegment(position))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Segment {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names one of the four segments of a serial, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The leading country code.
    Country,
    /// The (optional) organisation code.
    Organisation,
    /// The dataset kind code, e.g. `TX`.
    Kind,
    /// The trailing number or suffix.
    Suffix,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Country => "country",
            Self::Organisation => "organisation",
            Self::Kind => "kind",
            Self::Suffix => "suffix",
        };
        f.write_str(name)
    }
}

/// A serial identifier naming an SSRF dataset.
///
/// Format: `{COUNTRY}:{ORG}:{KIND}:{SUFFIX}`, where:
/// - `COUNTRY` is a code-list country value (e.g. `USA`, `DEU`)
/// - `ORG` is an organisation code, which may be empty
/// - `KIND` identifies the dataset type (e.g. `OR`, `TX`, `CP`)
/// - `SUFFIX` is unique within the preceding triple
///
/// Comparison is exact and case-sensitive over all four segments. A
/// well-formed serial says nothing about whether a dataset with that serial
/// exists.
///
/// Examples: `USA:AF:OR:100`, `DEU:NFA:CP:1`, `GBR::TX:7`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialKey {
    country: Segment,
    organisation: String,
    kind: Segment,
    suffix: Segment,
}

impl SerialKey {
    /// Create a serial from its four segments.
    ///
    /// # Errors
    ///
    /// Returns an error if a required segment is empty or any segment
    /// contains a forbidden character.
    pub fn new(
        country: impl Into<String>,
        organisation: impl Into<String>,
        kind: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<Self, Error> {
        let organisation = organisation.into();
        check_characters(Position::Organisation, &organisation)?;

        Ok(Self {
            country: Segment::new(Position::Country, country.into())?,
            organisation,
            kind: Segment::new(Position::Kind, kind.into())?,
            suffix: Segment::new(Position::Suffix, suffix.into())?,
        })
    }

    /// Returns the country segment.
    #[must_use]
    pub fn country(&self) -> &str {
        self.country.as_str()
    }

    /// Returns the organisation segment. May be empty.
    #[must_use]
    pub fn organisation(&self) -> &str {
        &self.organisation
    }

    /// Returns the kind code segment.
    #[must_use]
    pub fn kind_code(&self) -> &str {
        self.kind.as_str()
    }

    /// Returns the suffix segment.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.suffix.as_str()
    }
}

impl fmt::Display for SerialKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.country, self.organisation, self.kind, self.suffix
        )
    }
}

/// Errors that can occur when parsing or constructing a serial.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The serial does not have exactly four colon-delimited segments.
    #[error("Invalid serial '{0}': expected 4 ':'-delimited segments, found {1}")]
    Segments(String, usize),

    /// A required segment is empty.
    #[error("Invalid serial: the {0} segment cannot be empty")]
    EmptySegment(Position),

    /// A segment contains whitespace or a control character.
    #[error("Invalid serial: the {0} segment contains the forbidden character {1:?}")]
    Character(Position, char),
}

fn check_characters(position: Position, s: &str) -> Result<(), Error> {
    match s
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || *c == ':')
    {
        Some(c) => Err(Error::Character(position, c)),
        None => Ok(()),
    }
}

impl FromStr for SerialKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();

        let [country, organisation, kind, suffix] = parts.as_slice() else {
            return Err(Error::Segments(s.to_string(), parts.len()));
        };

        Self::new(*country, *organisation, *kind, *suffix)
    }
}

impl TryFrom<&str> for SerialKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl TryFrom<String> for SerialKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<SerialKey> for String {
    fn from(serial: SerialKey) -> Self {
        serial.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::hash_map::DefaultHasher,
        hash::{Hash, Hasher},
    };

    use test_case::test_case;

    use super::*;

    fn hash_of(serial: &SerialKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        serial.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn serial_creation() {
        let serial = SerialKey::new("USA", "AF", "OR", "100").unwrap();
        assert_eq!(serial.country(), "USA");
        assert_eq!(serial.organisation(), "AF");
        assert_eq!(serial.kind_code(), "OR");
        assert_eq!(serial.suffix(), "100");
    }

    #[test]
    fn serial_creation_empty_organisation() {
        let serial = SerialKey::new("GBR", "", "TX", "7").unwrap();
        assert_eq!(serial.organisation(), "");
        assert_eq!(serial.to_string(), "GBR::TX:7");
    }

    #[test_case("USA:AF:OR:100"; "organisation")]
    #[test_case("DEU:NFA:CP:1"; "channel plan")]
    #[test_case("GBR::TX:7"; "empty organisation")]
    #[test_case("FRA:MOD:RX:A-12"; "alphanumeric suffix")]
    #[test_case("usa:af:or:x"; "lowercase is kept verbatim")]
    fn canonical_roundtrip(input: &str) {
        let serial: SerialKey = input.parse().unwrap();
        assert_eq!(serial.to_string(), input);
    }

    #[test_case(""; "empty string")]
    #[test_case("USA"; "single segment")]
    #[test_case("USA:AF:OR"; "three segments")]
    #[test_case("USA:AF:OR:1:2"; "five segments")]
    fn wrong_segment_count_fails(input: &str) {
        let result = SerialKey::try_from(input);
        assert!(matches!(result, Err(Error::Segments(_, _))));
    }

    #[test_case(":AF:OR:1", Position::Country; "empty country")]
    #[test_case("USA:AF::1", Position::Kind; "empty kind")]
    #[test_case("USA:AF:OR:", Position::Suffix; "empty suffix")]
    fn empty_required_segment_fails(input: &str, position: Position) {
        assert_eq!(
            SerialKey::try_from(input),
            Err(Error::EmptySegment(position))
        );
    }

    #[test]
    fn whitespace_is_rejected() {
        assert_eq!(
            SerialKey::try_from("USA:AF:OR: 1"),
            Err(Error::Character(Position::Suffix, ' '))
        );
        assert_eq!(
            SerialKey::try_from("USA:A F:OR:1"),
            Err(Error::Character(Position::Organisation, ' '))
        );
    }

    #[test]
    fn colon_in_constructed_segment_is_rejected() {
        assert_eq!(
            SerialKey::new("USA", "AF", "OR", "1:2"),
            Err(Error::Character(Position::Suffix, ':'))
        );
    }

    #[test]
    fn equality_is_case_sensitive() {
        let upper = SerialKey::try_from("USA:AF:OR:100").unwrap();
        let lower = SerialKey::try_from("USA:af:OR:100").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn equal_serials_hash_equally() {
        let a = SerialKey::try_from("DEU:NFA:CP:1").unwrap();
        let b = SerialKey::new("DEU", "NFA", "CP", "1").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let serial = SerialKey::try_from("USA:AF:OR:100").unwrap();
        let json = serde_json::to_string(&serial).unwrap();
        assert_eq!(json, "\"USA:AF:OR:100\"");

        let parsed: SerialKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serial);

        let invalid: Result<SerialKey, _> = serde_json::from_str("\"USA:AF\"");
        assert!(invalid.is_err());
    }

    #[test]
    fn error_display() {
        let error = SerialKey::try_from("USA:AF").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid serial 'USA:AF': expected 4 ':'-delimited segments, found 2"
        );

        let error = SerialKey::try_from("USA:AF::1").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid serial: the kind segment cannot be empty"
        );
    }
}
