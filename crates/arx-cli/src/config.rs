use std::path::{Path, PathBuf};

use anyhow::Context;
use arx_model::ModelConfig;
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "arx.toml";

/// Storage root used when neither `--root` nor the config file names one.
/// A dedicated directory, so containers never land among unrelated files.
pub const DEFAULT_STORAGE_ROOT: &str = "arx-data";

/// Settings of a filesystem-backed repository, read from `arx.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub storage_root: PathBuf,
    pub model: ModelConfig,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            model: ModelConfig::default(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `explicit` if given, else `./arx.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RepositoryConfig::default();
        assert_eq!(c.storage_root, PathBuf::from("arx-data"));
        assert_eq!(c.model, ModelConfig::default());
    }

    #[test]
    fn model_table_is_embedded() {
        let c = RepositoryConfig::from_toml(
            r#"
            storage_root = "/srv/arx"

            [model]
            fail_if_no_descriptive_metadata_schema = true
            log_directory = "/var/log/arx"
            "#,
        )
        .unwrap();
        assert_eq!(c.storage_root, PathBuf::from("/srv/arx"));
        assert!(c.model.fail_if_no_descriptive_metadata_schema);
        assert_eq!(c.model.log_directory, Some(PathBuf::from("/var/log/arx")));
        assert_eq!(c.model.staging_container, "staging");
    }

    #[test]
    fn config_without_root_uses_dedicated_directory() {
        let c = RepositoryConfig::from_toml("[model]\nstaging_container = \"tmp\"").unwrap();
        assert_eq!(c.storage_root, PathBuf::from(DEFAULT_STORAGE_ROOT));
        assert_ne!(c.storage_root, PathBuf::from("."));
        assert_eq!(c.model.staging_container, "tmp");
    }

    #[test]
    fn explicit_file_is_required_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RepositoryConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("arx.toml");
        std::fs::write(&path, "storage_root = \"repo\"").unwrap();
        let c = RepositoryConfig::load(Some(&path)).unwrap();
        assert_eq!(c.storage_root, PathBuf::from("repo"));
    }
}
