//! vinyl install manifest (manifest.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of a manifest inside its `<name>/<version>` directory.
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Profile every generated manifest carries its dependencies in.
pub const DEFAULT_PROFILE: &str = "default";

/// Install manifest for one package version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Manifest {
    /// `<name>-<version>`, not persisted
    #[serde(skip)]
    pub id: String,
    pub provides: String,
    pub version: String,
    pub checksum: String,
    pub licence: String,
    pub tarball: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub meta: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_directory: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub commands: Commands,
}

impl Manifest {
    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut manifest: Self = toml::from_str(content)?;
        manifest.id = format!("{}-{}", manifest.provides, manifest.version);
        Ok(manifest)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Directory holding the manifest for `name` at `version`.
    pub fn dir_for(output_dir: &Path, name: &str, version: &str) -> PathBuf {
        output_dir.join(name).join(version)
    }

    /// Dependencies of the default profile.
    pub fn default_deps(&self) -> &[Dep] {
        self.profiles
            .get(DEFAULT_PROFILE)
            .map(|p| p.deps.as_slice())
            .unwrap_or(&[])
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A `(package, version)` pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dep(pub String, pub String);

/// A named group of dependencies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Profile {
    #[serde(default)]
    pub deps: Vec<Dep>,
}

/// Stage commands: configure, compile, install
///
/// Empty stages fall back to the installer's defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Commands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipenv: bool,
}
