//! Settings as seen by the CLI
//!
//! Loads apkvin.toml (explicit path or upward search), then applies flag
//! overrides on top of the file and environment.

use anyhow::{Context, Result};
use apkvin_config::{CommandsConfig, ConfigLoader, Settings};
use apkvin_package::CommandTemplate;
use std::env;
use std::path::{Path, PathBuf};

/// Flag overrides; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub repositories: Vec<String>,
}

/// Resolved settings for a command
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    /// Explicit repository URLs from the command line
    repositories: Vec<String>,
}

impl Config {
    /// Load settings from `config_file`, or search upward from the
    /// current directory when none is given
    pub fn load(config_file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let loader = ConfigLoader::new();
        let loaded = match config_file {
            Some(path) => loader
                .load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let cwd = env::current_dir().context("Failed to read current directory")?;
                loader
                    .load_from_directory(&cwd)
                    .context("Failed to load apkvin.toml")?
            }
        };

        if let Some(path) = &loaded.config_path {
            tracing::info!("Using configuration {}", path.display());
        }

        let mut settings = loaded.settings;
        if let Some(dir) = overrides.output_dir {
            settings.output_dir = Some(dir);
        }
        if let Some(jobs) = overrides.jobs {
            settings.jobs = Some(jobs);
        }

        Ok(Self {
            settings,
            repositories: overrides.repositories,
        })
    }

    /// Repository base URLs to index, flags first
    pub fn repositories(&self) -> Vec<String> {
        if self.repositories.is_empty() {
            self.settings.repository_urls()
        } else {
            self.repositories
                .iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect()
        }
    }

    /// Stage commands with `[commands]` overrides applied
    pub fn command_template(&self) -> CommandTemplate {
        apply_commands(CommandTemplate::default(), self.settings.commands())
    }
}

fn apply_commands(mut template: CommandTemplate, overrides: CommandsConfig) -> CommandTemplate {
    if let Some(configure) = overrides.configure {
        template.configure = configure;
    }
    if let Some(compile) = overrides.compile {
        template.compile = compile;
    }
    if let Some(install) = overrides.install {
        template.install = install;
    }
    if let Some(working_dir) = overrides.working_dir {
        template.working_dir = working_dir;
    }
    if !overrides.patches.is_empty() {
        template.patches = overrides.patches;
    }
    if let Some(skipenv) = overrides.skipenv {
        template.skipenv = skipenv;
    }
    template
}
