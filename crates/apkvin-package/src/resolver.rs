use crate::constraint::Constraint;
use crate::index::ProvidesIndex;
use crate::package::Package;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    #[error("could not match {0}")]
    NoMatchingVersion(Constraint),
}

pub type ResolverResult<T> = Result<T, ResolveError>;

/// Picks one concrete package for a dependency constraint.
///
/// This is a single-step matcher, not a solver: each constraint is resolved
/// on its own against the frozen index.
pub struct Resolver<'a> {
    index: &'a ProvidesIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a ProvidesIndex) -> Self {
        Self { index }
    }

    /// Resolve one constraint.
    ///
    /// `Ok(None)` means the constraint produces no install edge, which is
    /// the case for every `!name` anti-dependency.
    pub fn resolve(&self, constraint: &Constraint) -> ResolverResult<Option<&'a Arc<Package>>> {
        if constraint.negated {
            return Ok(None);
        }

        let candidates = self.index.lookup(&constraint.name);
        match candidates {
            [] => return Err(ResolveError::UnknownDependency(constraint.name.clone())),
            // A lone candidate is returned without checking the requirement.
            [only] => return Ok(Some(only)),
            _ => {}
        }

        let mut ordered: Vec<&'a Arc<Package>> = candidates.iter().collect();
        ordered.sort_by(|a, b| b.version.cmp(&a.version));

        for candidate in ordered {
            if constraint.matches(&candidate.version) {
                return Ok(Some(candidate));
            }

            for provided in candidate.provided_as(&constraint.name) {
                match &provided.version {
                    Some(version) if constraint.matches(version) => return Ok(Some(candidate)),
                    Some(_) => {}
                    None => debug!(
                        "{} provides {} without a version, skipping",
                        candidate.name, constraint.name
                    ),
                }
            }
        }

        Err(ResolveError::NoMatchingVersion(constraint.clone()))
    }

    /// Resolve every dependency of `package`, in declaration order.
    ///
    /// Stops at the first failure. Anti-dependencies come back as `None`.
    pub fn resolve_dependencies(
        &self,
        package: &Package,
    ) -> ResolverResult<Vec<Option<&'a Arc<Package>>>> {
        package
            .dependencies
            .iter()
            .map(|dep| self.resolve(dep))
            .collect()
    }
}
