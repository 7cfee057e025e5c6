//! Tree configuration

use crate::store::WriteOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store directory used when none is given
pub const DEFAULT_TREE_DIRNAME: &str = "ctree.db";

/// Optional per-directory config file, read by [`TreeConfig::load`]
pub const CONFIG_FILE_NAME: &str = "ctree.json";

/// Settings for opening a [`crate::Database`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Directory holding the node log
    pub directory: PathBuf,
    /// fsync every flush batch before reporting success
    pub sync_writes: bool,
    /// zstd level for serialized nodes
    pub compression_level: i32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            directory: PathBuf::from(DEFAULT_TREE_DIRNAME),
            sync_writes: false,
            compression_level: 3,
        }
    }
}

impl TreeConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        TreeConfig {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Load `ctree.json` from `directory` if present, defaults otherwise.
    /// The directory argument always wins over a directory in the file.
    pub fn load(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        let config_path = directory.join(CONFIG_FILE_NAME);
        let mut config: TreeConfig = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.directory = directory.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Write this config to `ctree.json` inside its directory
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(self.directory.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression_level {} outside {}..={}",
                self.compression_level,
                levels.start(),
                levels.end()
            )));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Config("directory must not be empty".into()));
        }
        Ok(())
    }

    /// Write options used for flush batches
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            sync: self.sync_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.directory, PathBuf::from(DEFAULT_TREE_DIRNAME));
        assert!(!config.write_options().sync);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = TreeConfig::load(dir.path()).unwrap();
        assert_eq!(config, TreeConfig::new(dir.path()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        TreeConfig::new(dir.path())
            .with_sync_writes(true)
            .with_compression_level(9)
            .save()
            .unwrap();

        let loaded = TreeConfig::load(dir.path()).unwrap();
        assert!(loaded.sync_writes);
        assert_eq!(loaded.compression_level, 9);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"sync_writes": true}"#).unwrap();

        let loaded = TreeConfig::load(dir.path()).unwrap();
        assert!(loaded.sync_writes);
        assert_eq!(loaded.compression_level, 3);
        assert_eq!(loaded.directory, dir.path());
    }

    #[test]
    fn test_rejects_bad_compression_level() {
        let config = TreeConfig::default().with_compression_level(1000);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
