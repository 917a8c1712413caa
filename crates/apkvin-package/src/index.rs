//! Name to candidate-package lookup.
//!
//! Building happens through [`ProvidesIndexBuilder`]; once every repository
//! is registered the builder is frozen into a [`ProvidesIndex`], which only
//! offers reads and can be shared across worker threads.

use crate::package::Package;
use std::collections::HashMap;
use std::sync::Arc;

/// Write phase of the index.
#[derive(Debug, Default)]
pub struct ProvidesIndexBuilder {
    buckets: HashMap<String, Vec<Arc<Package>>>,
    packages: Vec<Arc<Package>>,
}

impl ProvidesIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package under its own name and every name it provides.
    ///
    /// Buckets keep registration order. No de-duplication happens here, so a
    /// package that provides its own name appears twice in that bucket.
    pub fn register(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);

        self.buckets
            .entry(package.name.clone())
            .or_default()
            .push(Arc::clone(&package));

        for provides in &package.provides {
            if provides.name.is_empty() {
                continue;
            }
            self.buckets
                .entry(provides.name.clone())
                .or_default()
                .push(Arc::clone(&package));
        }

        self.packages.push(Arc::clone(&package));
        package
    }

    /// End the build phase.
    pub fn finish(self) -> ProvidesIndex {
        ProvidesIndex {
            buckets: self.buckets,
            packages: self.packages,
        }
    }
}

/// Read-only phase of the index.
#[derive(Debug, Default)]
pub struct ProvidesIndex {
    buckets: HashMap<String, Vec<Arc<Package>>>,
    packages: Vec<Arc<Package>>,
}

impl ProvidesIndex {
    /// Every package able to satisfy `name`, in registration order.
    pub fn lookup(&self, name: &str) -> &[Arc<Package>] {
        self.buckets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every registered package, in repository scan order.
    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    /// Number of distinct names known to the index.
    pub fn name_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
