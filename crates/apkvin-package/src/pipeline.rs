//! End-to-end run: load repository indexes, resolve every package, write
//! manifests.
//!
//! Loading is sequential and produces a frozen [`ProvidesIndex`]. The
//! per-package pass only reads the index and can run on a rayon pool.
//! A failing package never stops the others; every outcome lands in the
//! returned [`RunReport`].

use crate::apkindex::{IndexSource, RawPackage};
use crate::fetch::ArtifactFetcher;
use crate::index::{ProvidesIndex, ProvidesIndexBuilder};
use crate::package::Package;
use crate::resolver::Resolver;
use crate::synthesize::{Synthesis, Synthesizer};
use crate::{PackageError, ParseError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

type Outcome = (String, Result<Synthesis, PackageError>);

/// Conditions that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no package data could be loaded from {0} configured repositories")]
    NoIndexData(usize),
}

/// Observer for the per-package pass.
///
/// Called from worker threads.
pub trait Progress: Sync {
    fn start(&self, total: usize);
    fn advance(&self, package: &str);
    fn finish(&self);
}

/// Ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _total: usize) {}
    fn advance(&self, _package: &str) {}
    fn finish(&self) {}
}

/// Frozen index plus the records that could not enter it.
#[derive(Debug, Default)]
pub struct LoadedIndex {
    pub index: ProvidesIndex,
    /// Record key to the reason it was dropped
    pub dropped: BTreeMap<String, ParseError>,
    /// Repositories whose index could not be loaded
    pub unreachable: Vec<String>,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Manifests written this run
    pub written: usize,
    /// Manifests that already existed
    pub skipped: usize,
    /// Index records rejected at load time, keyed `name-version`
    pub dropped: BTreeMap<String, ParseError>,
    /// Packages that got no manifest, keyed `name-version`
    pub failures: BTreeMap<String, PackageError>,
}

impl RunReport {
    /// Packages processed in the synthesis pass.
    pub fn processed(&self) -> usize {
        self.written + self.skipped + self.failures.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.dropped.is_empty() || !self.failures.is_empty()
    }
}

pub struct Pipeline<S, F> {
    source: S,
    synthesizer: Synthesizer<F>,
    jobs: usize,
}

impl<S: IndexSource, F: ArtifactFetcher> Pipeline<S, F> {
    pub fn new(source: S, synthesizer: Synthesizer<F>) -> Self {
        Self {
            source,
            synthesizer,
            jobs: 1,
        }
    }

    /// Number of worker threads for the synthesis pass. `0` and `1` both
    /// mean sequential.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Load every repository through this pipeline's source.
    pub fn build_index(&self, repositories: &[String]) -> Result<LoadedIndex, PipelineError> {
        load_index(&self.source, repositories)
    }

    /// Resolve and synthesize a manifest for every indexed package.
    pub fn run(&self, loaded: &LoadedIndex, progress: &dyn Progress) -> RunReport {
        let packages = loaded.index.packages();
        progress.start(packages.len());

        let outcomes: Vec<Outcome> = if self.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    packages
                        .par_iter()
                        .map(|package| self.process(&loaded.index, package, progress))
                        .collect()
                }),
                Err(e) => {
                    warn!("Falling back to a single worker: {}", e);
                    self.process_all(&loaded.index, packages, progress)
                }
            }
        } else {
            self.process_all(&loaded.index, packages, progress)
        };

        progress.finish();

        let mut report = RunReport {
            dropped: loaded.dropped.clone(),
            ..Default::default()
        };
        for (key, outcome) in outcomes {
            match outcome {
                Ok(Synthesis::Written(_)) => report.written += 1,
                Ok(Synthesis::AlreadyPresent(_)) => report.skipped += 1,
                Err(e) => {
                    warn!("{}: {}", key, e);
                    report.failures.insert(key, e);
                }
            }
        }

        info!(
            "Wrote {} manifests, {} already present, {} failed",
            report.written,
            report.skipped,
            report.failures.len()
        );
        report
    }

    /// Load the index and run over it.
    pub fn generate(
        &self,
        repositories: &[String],
        progress: &dyn Progress,
    ) -> Result<RunReport, PipelineError> {
        let loaded = self.build_index(repositories)?;
        Ok(self.run(&loaded, progress))
    }

    fn process_all(
        &self,
        index: &ProvidesIndex,
        packages: &[Arc<Package>],
        progress: &dyn Progress,
    ) -> Vec<Outcome> {
        packages
            .iter()
            .map(|package| self.process(index, package, progress))
            .collect()
    }

    fn process(
        &self,
        index: &ProvidesIndex,
        package: &Package,
        progress: &dyn Progress,
    ) -> Outcome {
        let result = Resolver::new(index)
            .resolve_dependencies(package)
            .map_err(PackageError::from)
            .and_then(|deps| self.synthesizer.synthesize(package, &deps));
        progress.advance(&package.name);
        (format!("{}-{}", package.name, package.raw_version), result)
    }
}

/// Load every repository, in order, into a frozen index.
///
/// Unreachable repositories and malformed records are skipped. Fails
/// only when no repository contributed a single record.
pub fn load_index<S: IndexSource + ?Sized>(
    source: &S,
    repositories: &[String],
) -> Result<LoadedIndex, PipelineError> {
    let mut builder = ProvidesIndexBuilder::new();
    let mut loaded = LoadedIndex::default();
    let mut records = 0;

    for repository in repositories {
        let raw_packages = match source.fetch_index(repository) {
            Ok(raw_packages) => raw_packages,
            Err(e) => {
                error!("Skipping repository {}: {}", repository, e);
                loaded.unreachable.push(repository.clone());
                continue;
            }
        };

        info!("{}: {} records", repository, raw_packages.len());
        records += raw_packages.len();

        for raw in &raw_packages {
            match Package::from_raw(raw, repository) {
                Ok(package) => {
                    builder.register(package);
                }
                Err(e) => {
                    warn!("Dropping {} from {}: {}", record_key(raw), repository, e);
                    loaded.dropped.insert(record_key(raw), e);
                }
            }
        }
    }

    if records == 0 {
        return Err(PipelineError::NoIndexData(repositories.len()));
    }

    loaded.index = builder.finish();
    info!(
        "Indexed {} packages under {} names",
        loaded.index.len(),
        loaded.index.name_count()
    );
    Ok(loaded)
}

fn record_key(raw: &RawPackage) -> String {
    let name = if raw.name.is_empty() {
        "<unnamed>"
    } else {
        raw.name.as_str()
    };
    format!("{}-{}", name, raw.version)
}
