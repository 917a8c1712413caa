//! Manifest synthesis: turn a package and its resolved dependencies into a
//! manifest on disk.
//!
//! Synthesis is idempotent. If a manifest already exists for the package's
//! name and version nothing is fetched or written.

use crate::fetch::{checksum, ArtifactFetcher};
use crate::manifest::{Commands, Dep, Manifest, Profile, DEFAULT_PROFILE, MANIFEST_FILE};
use crate::package::Package;
use crate::{PackageError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the install script link placed next to every manifest.
pub const INSTALL_LINK: &str = "install.sh";

/// Relative target of the install script link.
pub const DEFAULT_INSTALL_SCRIPT: &str = "../../scripts/install.sh";

/// Stage commands written into every manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    pub configure: String,
    pub compile: String,
    pub install: String,
    pub working_dir: String,
    pub patches: Vec<String>,
    pub skipenv: bool,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self {
            configure: "echo".to_string(),
            compile: "echo".to_string(),
            install: "{{ .ManifestDir }}/install.sh".to_string(),
            working_dir: ".".to_string(),
            patches: Vec::new(),
            skipenv: false,
        }
    }
}

impl CommandTemplate {
    fn to_commands(&self) -> Commands {
        Commands {
            configure: Some(self.configure.clone()),
            compile: Some(self.compile.clone()),
            install: Some(self.install.clone()),
            working_dir: self.working_dir.clone(),
            patches: self.patches.clone(),
            skipenv: self.skipenv,
        }
    }
}

/// Outcome of a successful synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// A new manifest was written at the given path
    Written(PathBuf),
    /// A manifest for this name and version already existed
    AlreadyPresent(PathBuf),
}

/// Builds and persists manifests under an output directory.
pub struct Synthesizer<F> {
    output_dir: PathBuf,
    install_script: String,
    commands: CommandTemplate,
    fetcher: F,
}

impl<F: ArtifactFetcher> Synthesizer<F> {
    pub fn new(output_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            output_dir: output_dir.into(),
            install_script: DEFAULT_INSTALL_SCRIPT.to_string(),
            commands: CommandTemplate::default(),
            fetcher,
        }
    }

    /// Override the stage commands.
    pub fn with_commands(mut self, commands: CommandTemplate) -> Self {
        self.commands = commands;
        self
    }

    /// Override the relative target of the install script link.
    pub fn with_install_script(mut self, target: impl Into<String>) -> Self {
        self.install_script = target.into();
        self
    }

    /// Where the manifest for `package` lives.
    pub fn manifest_path(&self, package: &Package) -> PathBuf {
        Manifest::dir_for(&self.output_dir, &package.name, &package.version.to_string())
            .join(MANIFEST_FILE)
    }

    /// Build and write the manifest for `package`.
    ///
    /// `deps` is the resolver output in declaration order; `None` entries
    /// (anti-dependencies) are dropped.
    pub fn synthesize(
        &self,
        package: &Package,
        deps: &[Option<&Arc<Package>>],
    ) -> Result<Synthesis> {
        let path = self.manifest_path(package);
        if path.exists() {
            debug!("{} exists, skipping", path.display());
            return Ok(Synthesis::AlreadyPresent(path));
        }

        let version = package.version.to_string();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            DEFAULT_PROFILE.to_string(),
            Profile {
                deps: dedupe(deps)
                    .into_iter()
                    .map(|dep| Dep(dep.name.clone(), dep.version.to_string()))
                    .collect(),
            },
        );

        let artifact = self.fetcher.fetch(package)?;
        let checksum = checksum(artifact.path()).map_err(|source| PackageError::Checksum {
            path: artifact.path().to_path_buf(),
            source,
        })?;
        drop(artifact);

        let manifest = Manifest {
            id: format!("{}-{}", package.name, version),
            provides: package.name.clone(),
            version,
            checksum,
            licence: package.licence.clone(),
            tarball: package.tarball_url(),
            meta: false,
            service_directory: None,
            profiles,
            commands: self.commands.to_commands(),
        };

        self.write(&manifest, &path)?;
        Ok(Synthesis::Written(path))
    }

    /// Persist `manifest` at `path` and link the install script beside it.
    fn write(&self, manifest: &Manifest, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "manifest path has no parent"))?;
        fs::create_dir_all(dir)?;

        let content = manifest.to_string()?;

        // The link goes first: once the manifest exists later runs skip the
        // package, so nothing would ever retry a missing link.
        self.link_install_script(dir)?;

        // Write beside the target and rename, so an interrupted run never
        // leaves a partial manifest that later runs would skip.
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged.persist(path).map_err(|e| e.error)?;

        Ok(())
    }

    /// Link the install script into `dir` unless an entry of that name
    /// exists. Versions that normalise to one directory may race here.
    fn link_install_script(&self, dir: &Path) -> io::Result<()> {
        match symlink(Path::new(&self.install_script), &dir.join(INSTALL_LINK)) {
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => Err(e),
            _ => Ok(()),
        }
    }
}

/// Keep the first resolved package per name, dropping empty slots.
fn dedupe<'a>(deps: &[Option<&'a Arc<Package>>]) -> Vec<&'a Arc<Package>> {
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut unique = Vec::new();
    for dep in deps.iter().copied().flatten() {
        if seen.insert(dep.name.as_str()) {
            unique.push(dep);
        }
    }
    unique
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
