//! Config store for loading and saving skyhook.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{SkyhookConfig, parser, paths};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the per-user config directory.
    pub fn from_default_dir() -> anyhow::Result<Self> {
        Ok(Self::from_dir(&paths::default_config_dir()?))
    }

    pub fn from_dir(dir: &Path) -> Self {
        Self::from_path(paths::config_path_in(dir))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields the default configuration.
    pub fn load(&self) -> anyhow::Result<SkyhookConfig> {
        if !self.config_path.exists() {
            return Ok(SkyhookConfig::new());
        }
        parser::parse_skyhook_toml(&self.config_path)
    }

    pub fn save(&self, config: &SkyhookConfig) -> anyhow::Result<()> {
        config.validate()?;
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
