//! Reconciliation configuration.
//!
//! # Responsibility
//! - Parse the JSON configuration surface of the record list.
//! - Validate values before any store or pipeline is built from them.
//!
//! # Invariants
//! - Unknown fields are rejected rather than ignored.
//! - `recordKind` must not be blank.

use crate::model::identity::{RecordKind, RecordKindError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_RECORD_KIND: &str = "Entity";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidKind(RecordKindError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidKind(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidKind(err) => Some(err),
        }
    }
}

/// Options of one record list pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ReconcileConfig {
    /// Promote new records right at insertion instead of leaving them
    /// temporary for the reconciler.
    pub eager_promotion_on_insert: bool,
    pub animate_differences: bool,
    pub record_kind: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            eager_promotion_on_insert: false,
            animate_differences: true,
            record_kind: DEFAULT_RECORD_KIND.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.record_kind()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&json)
    }

    /// Tracked record kind.
    pub fn record_kind(&self) -> Result<RecordKind, ConfigError> {
        RecordKind::new(self.record_kind.as_str()).map_err(ConfigError::InvalidKind)
    }
}
