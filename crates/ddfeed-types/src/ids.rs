//! Identifier types and the policy that produces them.
//!
//! A post or comment carries two identifiers. The [`ExternalId`] is what
//! clients see and send back; it is unique and immutable once assigned.
//! The [`InternalKey`] is the store's own `BIGSERIAL` primary key. It is
//! strictly increasing with insertion order and drives pagination, but it
//! is never exposed unless the [`IdentityScheme::Serial`] scheme makes the
//! two coincide.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-visible identifier of a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Wrap a raw identifier string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the inner [`String`].
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for ExternalId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// The store's primary/ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternalKey(pub i64);

impl InternalKey {
    /// Return the inner value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for InternalKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::str::FromStr for InternalKey {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

/// How external identifiers are produced.
///
/// Storage and cache-key formatting only ever see [`ExternalId`] strings,
/// so switching schemes changes nothing downstream except what new rows
/// are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityScheme {
    /// The external identifier is the decimal internal key.
    #[serde(rename = "serial")]
    Serial,
    /// A random (v4) UUID.
    #[default]
    #[serde(rename = "uuid_v4")]
    RandomUuid,
    /// A time-ordered (v7) UUID, sortable by creation time.
    #[serde(rename = "uuid_v7")]
    SortableUuid,
}

impl IdentityScheme {
    /// Pre-generate an external identifier for a new row.
    ///
    /// Returns `None` when the identifier can only be known once the store
    /// has assigned the internal key (see [`IdentityScheme::derive`]).
    pub fn mint(self) -> Option<ExternalId> {
        match self {
            Self::Serial => None,
            Self::RandomUuid => Some(ExternalId(Uuid::new_v4().to_string())),
            Self::SortableUuid => Some(ExternalId(Uuid::now_v7().to_string())),
        }
    }

    /// Produce the external identifier for a freshly assigned internal key,
    /// using `minted` when the scheme pre-generated one.
    pub fn derive(minted: Option<ExternalId>, key: InternalKey) -> ExternalId {
        minted.unwrap_or_else(|| ExternalId(key.to_string()))
    }

    /// Whether `raw` could have been produced by this scheme.
    ///
    /// Only the canonical spelling is recognized: decimal without leading
    /// zeros, or lowercase hyphenated UUIDs. Stored identifiers are
    /// compared as strings, so any other spelling could never match.
    pub fn recognizes(self, raw: &str) -> bool {
        match self {
            Self::Serial => raw
                .parse::<i64>()
                .is_ok_and(|n| n > 0 && n.to_string() == raw),
            Self::RandomUuid | Self::SortableUuid => {
                Uuid::try_parse(raw).is_ok_and(|uuid| uuid.hyphenated().to_string() == raw)
            }
        }
    }
}

impl core::fmt::Display for IdentityScheme {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Serial => "serial",
            Self::RandomUuid => "uuid_v4",
            Self::SortableUuid => "uuid_v7",
        };
        f.write_str(name)
    }
}
