use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Model-layer settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Treat descriptive metadata of a type with no registered schema as a
    /// validation issue.
    pub fail_if_no_descriptive_metadata_schema: bool,
    /// Working directory of the action log; no log when unset.
    pub log_directory: Option<PathBuf>,
    /// Container holding staged copies during AIP and representation swaps.
    pub staging_container: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fail_if_no_descriptive_metadata_schema: false,
            log_directory: None,
            staging_container: "staging".into(),
        }
    }
}

impl ModelConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
