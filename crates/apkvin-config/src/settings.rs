//! Settings file (apkvin.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MIRROR: &str = "https://dl-cdn.alpinelinux.org/alpine";
pub const DEFAULT_RELEASE: &str = "v3.15";
pub const DEFAULT_ARCH: &str = "x86_64";
pub const DEFAULT_BRANCHES: [&str; 2] = ["main", "community"];
pub const DEFAULT_INSTALL_SCRIPT: &str = "../../scripts/install.sh";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Contents of apkvin.toml
///
/// Every field is optional; accessors fill in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Base URL repository tuples are expanded against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,

    /// Root of the generated manifest tree (default: ".")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Where package archives are downloaded to while hashing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Target of the install.sh link beside each manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_script: Option<String>,

    /// Worker threads for manifest synthesis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// HTTP timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Repositories to index, in order
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryConfig>,

    /// Stage command overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<CommandsConfig>,
}

/// One `[[repositories]]` entry: either a full `url`, or a
/// release/branch/arch tuple under the mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// e.g. "v3.15" or "edge" (default: v3.15)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    /// e.g. "main" or "community"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// (default: x86_64)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// `[commands]` overrides. Unset fields keep the built-in commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configure: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipenv: Option<bool>,
}

impl RepositoryConfig {
    /// Repository tuple under the mirror
    pub fn branch(release: &str, branch: &str, arch: &str) -> Self {
        Self {
            url: None,
            release: Some(release.to_string()),
            branch: Some(branch.to_string()),
            arch: Some(arch.to_string()),
        }
    }

    /// Base URL of the repository
    pub fn url(&self, mirror: &str) -> String {
        if let Some(url) = &self.url {
            return url.trim_end_matches('/').to_string();
        }

        format!(
            "{}/{}/{}/{}",
            mirror.trim_end_matches('/'),
            self.release.as_deref().unwrap_or(DEFAULT_RELEASE),
            self.branch.as_deref().unwrap_or_default(),
            self.arch.as_deref().unwrap_or(DEFAULT_ARCH),
        )
    }

    fn validate(&self, position: usize) -> ConfigResult<()> {
        let field = format!("repositories[{}]", position);
        let has_tuple = self.release.is_some() || self.branch.is_some() || self.arch.is_some();

        match (&self.url, has_tuple) {
            (Some(_), true) => Err(ConfigError::InvalidValue {
                field,
                reason: "url cannot be combined with release, branch, or arch".to_string(),
            }),
            (Some(url), false) if url.is_empty() => Err(ConfigError::InvalidValue {
                field,
                reason: "url cannot be empty".to_string(),
            }),
            (None, _) if self.branch.as_deref().map_or(true, str::is_empty) => {
                Err(ConfigError::InvalidValue {
                    field,
                    reason: "either url or branch is required".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(mirror) = &self.mirror {
            if mirror.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "mirror".to_string(),
                    reason: "mirror cannot be empty".to_string(),
                });
            }
        }

        if self.jobs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for (position, repository) in self.repositories.iter().enumerate() {
            repository.validate(position)?;
        }

        Ok(())
    }

    pub fn mirror(&self) -> &str {
        self.mirror.as_deref().unwrap_or(DEFAULT_MIRROR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Configured download directory, or `<cache dir>/apkvin`
    pub fn download_dir(&self) -> ConfigResult<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join("apkvin"))
                .ok_or(ConfigError::CacheDirNotFound),
        }
    }

    pub fn install_script(&self) -> &str {
        self.install_script
            .as_deref()
            .unwrap_or(DEFAULT_INSTALL_SCRIPT)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Repository base URLs in configuration order.
    ///
    /// With no `[[repositories]]`, main then community of the default
    /// release.
    pub fn repository_urls(&self) -> Vec<String> {
        let mirror = self.mirror();
        if self.repositories.is_empty() {
            return DEFAULT_BRANCHES
                .iter()
                .map(|branch| RepositoryConfig::branch(DEFAULT_RELEASE, branch, DEFAULT_ARCH).url(mirror))
                .collect();
        }

        self.repositories.iter().map(|r| r.url(mirror)).collect()
    }

    pub fn commands(&self) -> CommandsConfig {
        self.commands.clone().unwrap_or_default()
    }
}
