//! apkvin package engine
//!
//! Turns APK repository metadata into vinyl install manifests: version and
//! constraint parsing, the package model, the provides index, dependency
//! resolution, and manifest synthesis.

pub mod apkindex;
pub mod constraint;
pub mod fetch;
pub mod index;
pub mod manifest;
pub mod package;
pub mod pipeline;
pub mod resolver;
pub mod synthesize;
pub mod trigger;
pub mod version;

pub use apkindex::{FileIndexSource, HttpIndexSource, IndexError, IndexSource, RawPackage};
pub use constraint::{Comparator, Constraint, Op, Provides, VersionReq};
pub use fetch::{
    checksum, ArtifactFetcher, FetchError, FileArtifactFetcher, HttpArtifactFetcher, LocalArtifact,
};
pub use index::{ProvidesIndex, ProvidesIndexBuilder};
pub use manifest::{Commands, Dep, Manifest, Profile, DEFAULT_PROFILE, MANIFEST_FILE};
pub use package::Package;
pub use pipeline::{
    load_index, LoadedIndex, NoProgress, Pipeline, PipelineError, Progress, RunReport,
};
pub use resolver::{ResolveError, Resolver};
pub use synthesize::{CommandTemplate, Synthesis, Synthesizer};
pub use trigger::{has_trigger, TRIGGER_FILE};
pub use version::Version;

/// Errors from parsing a single package record's metadata.
///
/// Any of these drops the whole record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid version '{raw}': {reason}")]
    InvalidVersion { raw: String, reason: String },

    #[error("malformed constraint '{raw}': {reason}")]
    MalformedConstraint { raw: String, reason: String },

    #[error("unable to process provides string '{0}'")]
    MalformedProvides(String),

    #[error("package record has no name")]
    EmptyName,
}

/// Per-package errors. None of these abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to fetch artifact: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to checksum {path}: {source}")]
    Checksum {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackageError>;
