//! Record identity model.
//!
//! # Responsibility
//! - Define the two identity flavors a record can carry (temporary, permanent).
//! - Define the live record handle that survives identity promotion.
//!
//! # Invariants
//! - A `TemporaryId` is scoped to the `ContextId` that minted it and is never
//!   persisted.
//! - Promotion is one-directional: a record never goes back to a temporary id.
//! - `RecordId` ordering is total and stable: permanent ids sort before
//!   temporary ids, permanents by value, temporaries by (context, sequence).

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identity of one in-memory store context (the transaction scope of
/// temporary ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Mints a fresh context identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // First group of the uuid is enough to tell contexts apart in logs.
        let text = self.0.simple().to_string();
        write!(f, "{}", &text[..8])
    }
}

/// Provisional identity assigned at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemporaryId {
    pub context: ContextId,
    pub seq: u64,
}

/// Stable, store-assigned identity. Valid across commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermanentId(i64);

impl PermanentId {
    /// Wraps a store-reserved primary key.
    ///
    /// Returns `None` for non-positive values, which the store never hands out.
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Opaque, comparable record identity.
///
/// Variant order defines the natural ordering used by fetches, so keep
/// `Permanent` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    Permanent(PermanentId),
    Temporary(TemporaryId),
}

impl RecordId {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub fn as_permanent(&self) -> Option<PermanentId> {
        match self {
            Self::Permanent(id) => Some(*id),
            Self::Temporary(_) => None,
        }
    }
}

impl From<PermanentId> for RecordId {
    fn from(value: PermanentId) -> Self {
        Self::Permanent(value)
    }
}

impl From<TemporaryId> for RecordId {
    fn from(value: TemporaryId) -> Self {
        Self::Temporary(value)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permanent(id) => write!(f, "perm/{}", id.0),
            Self::Temporary(id) => write!(f, "tmp/{}/{}", id.context, id.seq),
        }
    }
}

/// Live handle to a record managed by a store context.
///
/// Unlike `RecordId`, a handle does not change when the record is promoted;
/// read the current identity back through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordHandle(u64);

impl RecordHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for RecordHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

/// Validation errors for record kind names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKindError {
    Blank,
}

impl Display for RecordKindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "record kind must not be blank"),
        }
    }
}

impl Error for RecordKindError {}

/// Entity name of the homogeneous record collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKind(String);

impl RecordKind {
    /// Creates a kind from a non-blank name (surrounding whitespace trimmed).
    pub fn new(name: impl Into<String>) -> Result<Self, RecordKindError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RecordKindError::Blank);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
