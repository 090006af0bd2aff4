//! Strategy - Pick how a target list is pushed for an API version
//!
//! v3 only formats ordered collections consistently through a whole
//! collection write; v2 addresses rules one by one by index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Data Plane API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ApiVersion {
    V2,
    V3,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "v2",
            ApiVersion::V3 => "v3",
        }
    }

    pub fn strategy(&self) -> ApplyStrategy {
        match self {
            ApiVersion::V2 => ApplyStrategy::IncrementalIndexed,
            ApiVersion::V3 => ApplyStrategy::BulkReplace,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v2" => Ok(ApiVersion::V2),
            "v3" => Ok(ApiVersion::V3),
            other => Err(ReconcileError::StrategyUnsupported(other.to_string())),
        }
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ReconcileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// How a reconciled list is written to the remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStrategy {
    /// One whole-collection write
    BulkReplace,
    /// One delete or create per rule, addressed by remote index
    IncrementalIndexed,
}

impl fmt::Display for ApplyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyStrategy::BulkReplace => write!(f, "bulk replace"),
            ApplyStrategy::IncrementalIndexed => write!(f, "incremental indexed"),
        }
    }
}

/// Select the apply strategy for an API version string
///
/// Unknown versions fail closed.
pub fn select_strategy(api_version: &str) -> Result<ApplyStrategy, ReconcileError> {
    let version: ApiVersion = api_version.parse()?;
    Ok(version.strategy())
}
