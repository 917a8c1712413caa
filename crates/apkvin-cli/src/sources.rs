//! Route repositories to HTTP or local-disk backends
//!
//! A repository whose base starts with `http://` or `https://` is fetched
//! over the network; anything else is a mirror directory on disk.

use anyhow::{Context, Result};
use apkvin_package::{
    ArtifactFetcher, FetchError, FileArtifactFetcher, FileIndexSource, HttpArtifactFetcher,
    HttpIndexSource, IndexError, IndexSource, LocalArtifact, Package, RawPackage,
};
use std::path::Path;
use std::time::Duration;

fn is_remote(repository: &str) -> bool {
    repository.starts_with("http://") || repository.starts_with("https://")
}

pub struct Indexes {
    http: HttpIndexSource,
    file: FileIndexSource,
}

impl Indexes {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpIndexSource::new(timeout).context("Failed to create HTTP client")?,
            file: FileIndexSource::new(),
        })
    }
}

impl IndexSource for Indexes {
    fn fetch_index(&self, repository: &str) -> Result<Vec<RawPackage>, IndexError> {
        if is_remote(repository) {
            self.http.fetch_index(repository)
        } else {
            self.file.fetch_index(repository)
        }
    }
}

pub struct Fetchers {
    http: HttpArtifactFetcher,
    file: FileArtifactFetcher,
}

impl Fetchers {
    pub fn new(download_dir: &Path, timeout: Duration) -> Result<Self> {
        let context = || format!("Failed to prepare {}", download_dir.display());
        Ok(Self {
            http: HttpArtifactFetcher::new(download_dir, timeout).with_context(context)?,
            file: FileArtifactFetcher::new(download_dir).with_context(context)?,
        })
    }
}

impl ArtifactFetcher for Fetchers {
    fn fetch(&self, package: &Package) -> Result<LocalArtifact, FetchError> {
        if is_remote(&package.repository) {
            self.http.fetch(package)
        } else {
            self.file.fetch(package)
        }
    }
}
