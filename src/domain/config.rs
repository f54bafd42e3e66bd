//! Loading and validation settings, stored as versioned TOML.

use std::{collections::BTreeMap, path::Path};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{EntityKind, SerialKey};

/// Configuration for loading and checking SSRF documents.
///
/// This struct holds settings that control how strictly serials are
/// validated on load and how loaders and the checker treat imperfect input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Whether a dataset's serial must use its kind's conventional kind
    /// code (`OR` for organisations, `CP` for channel plans, ...).
    pub strict_kind_codes: bool,

    /// Additional grammar for serials, keyed by kind code.
    ///
    /// A serial whose kind code has an entry must match the regular
    /// expression in full. Kind codes without an entry are unconstrained.
    serial_patterns: BTreeMap<String, String>,

    /// Whether directory loading skips files that cannot be parsed as
    /// datasets instead of failing.
    pub allow_unrecognised: bool,

    /// Whether dangling references should be treated as a failure by the
    /// checker.
    pub fail_on_dangling: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_kind_codes: false,
            serial_patterns: BTreeMap::new(),
            allow_unrecognised: false,
            fail_on_dangling: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the configured serial patterns, keyed by kind code.
    #[must_use]
    pub const fn serial_patterns(&self) -> &BTreeMap<String, String> {
        &self.serial_patterns
    }

    /// Sets the pattern serials with the given kind code must match.
    ///
    /// Returns the previous pattern, if any.
    pub fn set_serial_pattern(&mut self, kind_code: String, pattern: String) -> Option<String> {
        self.serial_patterns.insert(kind_code, pattern)
    }

    /// Compiles the serial rules described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if a configured pattern is not a valid
    /// regular expression.
    pub fn serial_rules(&self) -> Result<SerialRules, RuleError> {
        let patterns = self
            .serial_patterns
            .iter()
            .map(|(code, pattern)| {
                // Anchor so the pattern must match the whole serial.
                Regex::new(&format!("^(?:{pattern})$"))
                    .map(|regex| (code.clone(), regex))
                    .map_err(|source| RuleError::InvalidPattern {
                        kind_code: code.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(SerialRules {
            strict_kind_codes: self.strict_kind_codes,
            patterns,
        })
    }
}

/// Compiled per-kind serial grammar.
#[derive(Debug, Clone, Default)]
pub struct SerialRules {
    strict_kind_codes: bool,
    patterns: BTreeMap<String, Regex>,
}

/// A serial that the configured rules reject, or a rule that does not
/// compile.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A configured pattern is not a valid regular expression.
    #[error("invalid serial pattern for kind code '{kind_code}'")]
    InvalidPattern {
        /// The kind code the pattern is configured for.
        kind_code: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// The serial's kind code does not match the dataset kind.
    #[error("{kind} serial {serial} must use kind code '{}'", kind.code())]
    KindCode {
        /// The dataset kind.
        kind: EntityKind,
        /// The offending serial.
        serial: SerialKey,
    },

    /// The serial does not match the pattern configured for its kind code.
    #[error("serial {serial} does not match the pattern configured for kind code '{}'", serial.kind_code())]
    Mismatch {
        /// The offending serial.
        serial: SerialKey,
    },
}

impl SerialRules {
    /// Checks a serial assigned to a dataset of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::KindCode`] if strict kind codes are enabled and
    /// the serial uses another kind's code, or [`RuleError::Mismatch`] if the
    /// serial does not match its configured pattern.
    pub fn check(&self, kind: EntityKind, serial: &SerialKey) -> Result<(), RuleError> {
        if self.strict_kind_codes && serial.kind_code() != kind.code() {
            return Err(RuleError::KindCode {
                kind,
                serial: serial.clone(),
            });
        }

        if let Some(pattern) = self.patterns.get(serial.kind_code()) {
            if !pattern.is_match(&serial.to_string()) {
                return Err(RuleError::Mismatch {
                    serial: serial.clone(),
                });
            }
        }

        Ok(())
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        strict_kind_codes: bool,

        /// Regular expressions keyed by serial kind code.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        serial_patterns: BTreeMap<String, String>,

        #[serde(default)]
        allow_unrecognised: bool,

        #[serde(default)]
        fail_on_dangling: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                strict_kind_codes,
                serial_patterns,
                allow_unrecognised,
                fail_on_dangling,
            } => Self {
                strict_kind_codes,
                serial_patterns,
                allow_unrecognised,
                fail_on_dangling,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            strict_kind_codes: config.strict_kind_codes,
            serial_patterns: config.serial_patterns,
            allow_unrecognised: config.allow_unrecognised,
            fail_on_dangling: config.fail_on_dangling,
        }
    }
}
