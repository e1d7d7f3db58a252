//! Typed record keys and the shared integer key space.
//!
//! Both corpora are indexed under one integer key space. A review key
//! `R700002` and a patient key `P17` are stripped of their tag and parsed
//! into an [`IndexKey`]; the tag is recovered on the way back out from the
//! numeric range alone, using the fixed threshold held by [`KeyPartition`].
//!
//! The mapping is only a bijection while review numerals stay at or above
//! the threshold and patient numerals stay below it. [`KeyPartition::encode`]
//! rejects any key that would land on the wrong side instead of letting it
//! decode into the other table later.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default boundary between the medical-record range and the review range.
pub const DEFAULT_REVIEW_THRESHOLD: i64 = 700_000;

/// The relational table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    CustomerReview,
    MedicalRecord,
}

impl TableKind {
    /// One-character tag prefixed to the numeral in an [`EntityKey`].
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::CustomerReview => 'R',
            Self::MedicalRecord => 'P',
        }
    }

    /// Looks up the kind for a tag character.
    #[must_use]
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'R' => Some(Self::CustomerReview),
            'P' => Some(Self::MedicalRecord),
            _ => None,
        }
    }

    /// Name of the backing table in the relational store.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::CustomerReview => "customer_reviews",
            Self::MedicalRecord => "medical_records",
        }
    }

    /// Primary key column of the backing table.
    #[must_use]
    pub const fn key_column(self) -> &'static str {
        match self {
            Self::CustomerReview => "review_id",
            Self::MedicalRecord => "patient_id",
        }
    }

    /// Both kinds, in the order the build pipeline indexes them.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::CustomerReview, Self::MedicalRecord]
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Errors produced while parsing or partitioning record keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Entity key '{key}' has no type tag\nSuggestion: Keys must look like R<digits> or P<digits>")]
    MissingTypeTag { key: String },

    #[error("Entity key '{key}' has unknown type tag '{tag}'\nSuggestion: Use 'R' for reviews or 'P' for patient records")]
    UnknownTypeTag { key: String, tag: char },

    #[error("Entity key '{key}' has an invalid numeral: {reason}\nSuggestion: The part after the tag must be plain decimal digits without leading zeros")]
    InvalidNumeral { key: String, reason: &'static str },

    #[error(
        "Entity key '{key}' falls on the wrong side of the partition threshold {threshold}\nSuggestion: Review numerals must be >= {threshold} and patient numerals < {threshold}; fix the source ids rather than the threshold"
    )]
    PartitionViolation { key: String, threshold: i64 },

    #[error(
        "Entity key '{key}' was read from {table} but is tagged for another table\nSuggestion: Fix the primary key of the source row"
    )]
    WrongTable { key: String, table: TableKind },

    #[error("Invalid partition threshold {threshold}\nSuggestion: The threshold must be greater than zero")]
    InvalidThreshold { threshold: i64 },
}

impl KeyError {
    /// True when the error comes from settings rather than from a record key.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidThreshold { .. })
    }
}

/// Primary key of a vector inside the index.
///
/// Always non-negative: it is parsed from a decimal numeral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexKey(i64);

impl IndexKey {
    /// Creates an `IndexKey`, returning `None` for negative values.
    #[must_use]
    pub fn new(value: i64) -> Option<Self> {
        (value >= 0).then_some(Self(value))
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 8]) -> Option<Self> {
        Self::new(i64::from_le_bytes(bytes))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable typed record identifier, e.g. `R700002` or `P17`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    kind: TableKind,
    numeral: IndexKey,
}

impl EntityKey {
    #[must_use]
    pub const fn new(kind: TableKind, numeral: IndexKey) -> Self {
        Self { kind, numeral }
    }

    #[must_use]
    pub const fn kind(&self) -> TableKind {
        self.kind
    }

    /// The tag-stripped numeral as it is stored in the index.
    #[must_use]
    pub const fn numeral(&self) -> IndexKey {
        self.numeral
    }
}

impl FromStr for EntityKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let tag = chars.next().ok_or_else(|| KeyError::MissingTypeTag {
            key: s.to_string(),
        })?;
        if tag.is_ascii_digit() {
            return Err(KeyError::MissingTypeTag { key: s.to_string() });
        }
        let kind = TableKind::from_tag(tag).ok_or_else(|| KeyError::UnknownTypeTag {
            key: s.to_string(),
            tag,
        })?;

        let digits = chars.as_str();
        let invalid = |reason| KeyError::InvalidNumeral {
            key: s.to_string(),
            reason,
        };
        if digits.is_empty() {
            return Err(invalid("numeral is empty"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("numeral contains non-digit characters"));
        }
        // "R007" and "R7" would share one index key, breaking the round trip.
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(invalid("numeral has leading zeros"));
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| invalid("numeral does not fit in 64 bits"))?;
        let numeral = IndexKey::new(value).ok_or_else(|| invalid("numeral is negative"))?;

        Ok(Self { kind, numeral })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.numeral)
    }
}

impl Serialize for EntityKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Static split of the integer key space between the two tables.
///
/// Keys at or above `review_threshold` belong to customer reviews, keys
/// below it to medical records. The index itself stores no type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPartition {
    review_threshold: i64,
}

impl KeyPartition {
    /// Creates a partition. The threshold must leave room for both ranges.
    pub fn new(review_threshold: i64) -> Result<Self, KeyError> {
        if review_threshold <= 0 {
            return Err(KeyError::InvalidThreshold {
                threshold: review_threshold,
            });
        }
        Ok(Self { review_threshold })
    }

    #[must_use]
    pub const fn review_threshold(&self) -> i64 {
        self.review_threshold
    }

    /// Which table an index key decodes into.
    #[must_use]
    pub fn kind_of(&self, key: IndexKey) -> TableKind {
        if key.get() >= self.review_threshold {
            TableKind::CustomerReview
        } else {
            TableKind::MedicalRecord
        }
    }

    /// Maps an entity key into the shared key space.
    ///
    /// Fails if the numeral would decode back into the other table.
    pub fn encode(&self, key: &EntityKey) -> Result<IndexKey, KeyError> {
        if self.kind_of(key.numeral()) != key.kind() {
            return Err(KeyError::PartitionViolation {
                key: key.to_string(),
                threshold: self.review_threshold,
            });
        }
        Ok(key.numeral())
    }

    /// Parses a raw key string and encodes it in one step.
    pub fn encode_str(&self, raw: &str) -> Result<IndexKey, KeyError> {
        self.encode(&raw.parse()?)
    }

    /// Like [`encode_str`](Self::encode_str), but the key must also carry
    /// the tag of `table`, the table the row was read from.
    pub fn encode_from(&self, table: TableKind, raw: &str) -> Result<IndexKey, KeyError> {
        let key: EntityKey = raw.parse()?;
        if key.kind() != table {
            return Err(KeyError::WrongTable {
                key: raw.to_string(),
                table,
            });
        }
        self.encode(&key)
    }

    /// Recovers the typed key for an index key.
    #[must_use]
    pub fn decode(&self, key: IndexKey) -> EntityKey {
        EntityKey::new(self.kind_of(key), key)
    }
}

impl Default for KeyPartition {
    fn default() -> Self {
        Self {
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
        }
    }
}
