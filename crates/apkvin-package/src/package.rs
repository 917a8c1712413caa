//! The package model: a raw index record plus its parsed metadata.

use crate::apkindex::RawPackage;
use crate::constraint::{Constraint, Provides};
use crate::version::Version;
use crate::ParseError;

/// A package whose version, provides, and dependencies all parsed.
///
/// Built once per index record and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    /// Version string exactly as published upstream
    pub raw_version: String,
    pub version: Version,
    pub licence: String,
    /// Base URL of the repository the record came from
    pub repository: String,
    pub provides: Vec<Provides>,
    pub dependencies: Vec<Constraint>,
}

impl Package {
    /// Lift a raw record into the model.
    ///
    /// The first unparseable field fails the whole record.
    pub fn from_raw(raw: &RawPackage, repository: &str) -> Result<Self, ParseError> {
        if raw.name.is_empty() {
            return Err(ParseError::EmptyName);
        }

        let version = Version::parse(&raw.version)?;

        let dependencies = raw
            .dependencies
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| Constraint::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        let provides = raw
            .provides
            .iter()
            .map(|p| Provides::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: raw.name.clone(),
            raw_version: raw.version.clone(),
            version,
            licence: raw.licence.clone(),
            repository: repository.to_string(),
            provides,
            dependencies,
        })
    }

    /// Remote location of the package archive.
    pub fn tarball_url(&self) -> String {
        format!(
            "{}/{}-{}.apk",
            self.repository.trim_end_matches('/'),
            self.name,
            self.raw_version
        )
    }

    /// File name of the package archive.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.apk", self.name, self.raw_version)
    }

    /// Provided entries registered under `name`.
    pub fn provided_as<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Provides> + 'a {
        self.provides.iter().filter(move |p| p.name == name)
    }
}
