//! Configuration Loader
//!
//! Finds apkvin.toml and layers environment overrides on top of it.

use crate::settings::Settings;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the configuration file searched for
pub const CONFIG_FILE: &str = "apkvin.toml";

pub const ENV_MIRROR: &str = "APKVIN_MIRROR";
pub const ENV_OUTPUT_DIR: &str = "APKVIN_OUTPUT_DIR";
pub const ENV_DOWNLOAD_DIR: &str = "APKVIN_DOWNLOAD_DIR";
pub const ENV_JOBS: &str = "APKVIN_JOBS";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Defaults
/// 2. apkvin.toml
/// 3. Environment variables (APKVIN_*)
/// 4. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader;

/// Loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,

    /// File the settings came from, if any
    pub config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find apkvin.toml. Without one, the
    /// defaults apply.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (config_path, settings) = self.find_config(start_dir)?;
        let settings = self.apply_env_overrides(settings)?;

        Ok(Config {
            settings,
            config_path,
        })
    }

    /// Load configuration from a specific file, which must exist
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let settings = Settings::load_from_file(config_path)?;
        let settings = self.apply_env_overrides(settings)?;

        Ok(Config {
            settings,
            config_path: Some(config_path.to_path_buf()),
        })
    }

    fn find_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, Settings)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);

            if config_path.is_file() {
                let settings = Settings::load_from_file(&config_path)?;
                return Ok((Some(config_path), settings));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, Settings::default())),
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut settings: Settings) -> ConfigResult<Settings> {
        if let Some(mirror) = non_empty_var(ENV_MIRROR) {
            settings.mirror = Some(mirror);
        }

        if let Some(dir) = non_empty_var(ENV_OUTPUT_DIR) {
            settings.output_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = non_empty_var(ENV_DOWNLOAD_DIR) {
            settings.download_dir = Some(PathBuf::from(dir));
        }

        if let Some(jobs) = non_empty_var(ENV_JOBS) {
            let jobs = jobs.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                field: ENV_JOBS.to_string(),
                reason: e.to_string(),
            })?;
            settings.jobs = Some(jobs);
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

impl Config {
    /// Check if the settings came from a file
    pub fn from_file(&self) -> bool {
        self.config_path.is_some()
    }

    /// Directory holding the configuration file
    pub fn config_root(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }
}
