//! Loading of the hapsync configuration file

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use hapsync_core::document::{DesiredState, ValidationIssue};
use hapsync_provider_dataplane::DataPlaneConfig;

pub const DEFAULT_FILE: &str = "hapsync.json";

/// Connection settings plus the desired rule collections
#[derive(Debug, Deserialize)]
pub struct HapsyncFile {
    pub dataplane: DataPlaneConfig,
    #[serde(flatten)]
    pub desired: DesiredState,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid dataplane settings: {0}")]
    Dataplane(String),

    #[error("{}", join_issues(.0))]
    Rules(Vec<ValidationIssue>),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl HapsyncFile {
    /// Load a file, applying environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut file: HapsyncFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        file.dataplane.apply_env_with(lookup);
        file.dataplane
            .validate()
            .map_err(ConfigError::Dataplane)?;
        Ok(file)
    }

    /// Check every managed collection against its schema
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.desired.validate().map_err(ConfigError::Rules)
    }
}
