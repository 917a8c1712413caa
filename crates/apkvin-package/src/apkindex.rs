//! Repository index sources.
//!
//! An APK repository publishes `APKINDEX.tar.gz` at its base URL. The file
//! is a concatenation of gzip members (signature, then index), and the
//! index member holds a plain-text `APKINDEX` file made of blank-line
//! separated stanzas:
//!
//! ```text
//! P:busybox
//! V:1.34.1-r3
//! L:GPL-2.0-only
//! D:so:libc.musl-x86_64.so.1
//! p:cmd:busybox=1.34.1-r3 /bin/sh
//! ```

use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the index member inside `APKINDEX.tar.gz`.
pub const INDEX_MEMBER: &str = "APKINDEX";

/// Name of the index archive under a repository base URL.
pub const INDEX_ARCHIVE: &str = "APKINDEX.tar.gz";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read index: {0}")]
    Io(#[from] std::io::Error),

    #[error("no {INDEX_MEMBER} entry in index archive for {0}")]
    MissingIndex(String),

    #[error("no local index configured for repository {0}")]
    UnknownRepository(String),
}

/// One package record as it appears in the upstream index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPackage {
    pub name: String,
    pub version: String,
    pub licence: String,
    pub dependencies: Vec<String>,
    pub provides: Vec<String>,
}

/// Something that can list the packages of a repository.
pub trait IndexSource: Send + Sync {
    fn fetch_index(&self, repository: &str) -> Result<Vec<RawPackage>, IndexError>;
}

/// Downloads `APKINDEX.tar.gz` over HTTP.
pub struct HttpIndexSource {
    client: reqwest::blocking::Client,
}

impl HttpIndexSource {
    pub fn new(timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl IndexSource for HttpIndexSource {
    fn fetch_index(&self, repository: &str) -> Result<Vec<RawPackage>, IndexError> {
        let url = format!("{}/{}", repository.trim_end_matches('/'), INDEX_ARCHIVE);
        info!("Downloading index {}", url);

        let response = self.client.get(&url).send()?.error_for_status()?;
        read_index_archive(response)?.ok_or_else(|| IndexError::MissingIndex(url))
    }
}

/// Reads index archives from disk.
///
/// A repository registered with [`FileIndexSource::with_archive`] is read
/// from that file; any other repository is taken to be a local mirror
/// directory holding `APKINDEX.tar.gz`.
#[derive(Debug, Default, Clone)]
pub struct FileIndexSource {
    archives: HashMap<String, PathBuf>,
}

impl FileIndexSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `repository` from the archive at `path`.
    pub fn with_archive(mut self, repository: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.archives.insert(repository.into(), path.into());
        self
    }
}

impl IndexSource for FileIndexSource {
    fn fetch_index(&self, repository: &str) -> Result<Vec<RawPackage>, IndexError> {
        let path = match self.archives.get(repository) {
            Some(path) => path.clone(),
            None => {
                let path = Path::new(repository).join(INDEX_ARCHIVE);
                if !path.is_file() {
                    return Err(IndexError::UnknownRepository(repository.to_string()));
                }
                path
            }
        };
        info!("Reading index {}", path.display());

        let file = File::open(&path)?;
        read_index_archive(BufReader::new(file))?
            .ok_or_else(|| IndexError::MissingIndex(repository.to_string()))
    }
}

/// Decompress an index archive and parse its `APKINDEX` member.
///
/// Returns `Ok(None)` if the archive has no such member.
pub fn read_index_archive<R: Read>(reader: R) -> Result<Option<Vec<RawPackage>>, IndexError> {
    let mut archive = Archive::new(MultiGzDecoder::new(reader));
    archive.set_ignore_zeros(true);

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?;
        if path.to_str() != Some(INDEX_MEMBER) {
            debug!("Skipping archive member {}", path.display());
            continue;
        }

        return Ok(Some(parse_index(BufReader::new(entry))?));
    }

    Ok(None)
}

/// Parse the text of an `APKINDEX` file.
pub fn parse_index<R: BufRead>(reader: R) -> std::io::Result<Vec<RawPackage>> {
    let mut packages = Vec::new();
    let mut current = RawPackage::default();
    let mut in_record = false;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();

        if line.is_empty() {
            if in_record {
                packages.push(std::mem::take(&mut current));
                in_record = false;
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        in_record = true;

        match key {
            "P" => current.name = value.to_string(),
            "V" => current.version = value.to_string(),
            "L" => current.licence = value.to_string(),
            "D" => current.dependencies = split_list(value),
            "p" => current.provides = split_list(value),
            _ => {}
        }
    }

    if in_record {
        packages.push(current);
    }

    Ok(packages)
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
