//! Package archive fetching and checksumming.

use crate::package::Package;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to store download: {0}")]
    Io(#[from] io::Error),
}

/// A downloaded archive on local disk.
///
/// The file is removed when the handle is dropped, whichever way the
/// caller exits.
#[derive(Debug)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    /// Take ownership of the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Retrieves a package archive to local storage.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError>;
}

impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for &T {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError> {
        (**self).fetch(package)
    }
}

impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for Box<T> {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError> {
        (**self).fetch(package)
    }
}

/// Downloads archives from their repository over HTTP.
pub struct HttpArtifactFetcher {
    client: reqwest::blocking::Client,
    download_dir: PathBuf,
}

impl HttpArtifactFetcher {
    pub fn new(download_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, FetchError> {
        let download_dir = download_dir.into();
        fs::create_dir_all(&download_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            download_dir,
        })
    }
}

impl ArtifactFetcher for HttpArtifactFetcher {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError> {
        let url = package.tarball_url();
        debug!("Downloading {}", url);

        let mut file = staging_file(&self.download_dir, package)?;
        let mut response = self.client.get(&url).send()?.error_for_status()?;
        response.copy_to(file.as_file_mut())?;

        keep(file)
    }
}

/// Copies archives out of a mirror on local disk.
///
/// The package's repository is read as a directory path.
pub struct FileArtifactFetcher {
    download_dir: PathBuf,
}

impl FileArtifactFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let download_dir = download_dir.into();
        fs::create_dir_all(&download_dir)?;
        Ok(Self { download_dir })
    }
}

impl ArtifactFetcher for FileArtifactFetcher {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError> {
        let source = Path::new(&package.repository).join(package.archive_name());
        debug!("Copying {}", source.display());

        let mut input = File::open(&source)?;
        let mut file = staging_file(&self.download_dir, package)?;
        io::copy(&mut input, file.as_file_mut())?;

        keep(file)
    }
}

/// Unique name so concurrent fetches never share a file.
fn staging_file(dir: &Path, package: &Package) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&format!("{}-", package.archive_name()))
        .tempfile_in(dir)
}

/// Hand cleanup over from the temp file to a [`LocalArtifact`].
fn keep(file: NamedTempFile) -> Result<LocalArtifact, FetchError> {
    let path = file.into_temp_path().keep().map_err(|e| e.error)?;
    Ok(LocalArtifact::new(path))
}

/// Hex-encoded BLAKE3 digest of a file's contents, as vinyl verifies it.
pub fn checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apkindex::RawPackage;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_known_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello");
        fs::write(&path, "hello").unwrap();

        assert_eq!(
            checksum(&path).unwrap(),
            "ea8f163db38682925e4491c5e58d4bb3506ef8c14eb78a86e908c5624a67200f"
        );
    }

    #[test]
    fn test_checksum_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(checksum(&temp.path().join("absent")).is_err());
    }

    #[test]
    fn test_local_artifact_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pkg.apk");
        fs::write(&path, b"data").unwrap();

        {
            let artifact = LocalArtifact::new(&path);
            assert!(artifact.path().exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_file_fetcher_copies_from_mirror() {
        let mirror = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        fs::write(mirror.path().join("musl-1.2.2-r7.apk"), b"archive").unwrap();

        let raw = RawPackage {
            name: "musl".to_string(),
            version: "1.2.2-r7".to_string(),
            ..Default::default()
        };
        let package = Package::from_raw(&raw, mirror.path().to_str().unwrap()).unwrap();

        let fetcher = FileArtifactFetcher::new(downloads.path()).unwrap();
        let artifact = fetcher.fetch(&package).unwrap();
        assert!(artifact.path().starts_with(downloads.path()));
        assert_eq!(fs::read(artifact.path()).unwrap(), b"archive");

        let copy = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!copy.exists());
        assert!(mirror.path().join("musl-1.2.2-r7.apk").exists());
    }

    #[test]
    fn test_file_fetcher_missing_archive() {
        let mirror = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        let raw = RawPackage {
            name: "absent".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        };
        let package = Package::from_raw(&raw, mirror.path().to_str().unwrap()).unwrap();

        let fetcher = FileArtifactFetcher::new(downloads.path()).unwrap();
        assert!(matches!(fetcher.fetch(&package), Err(FetchError::Io(_))));
        assert_eq!(fs::read_dir(downloads.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_local_artifact_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        drop(LocalArtifact::new(temp.path().join("never-created")));
    }
}
