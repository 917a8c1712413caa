//! Dependency constraint and "provides" parsing.
//!
//! Dependency strings follow this grammar:
//!
//! ```text
//! constraint  = [ "!" ] name [ requirement ]
//! name        = 1*( ALPHA / DIGIT / "." / ":" / "/" / "-" / "+" / "_" )
//! requirement = comparator { "," comparator }
//! comparator  = [ op ] version
//! op          = "=" / "==" / "!=" / ">" / ">=" / "<" / "<=" / "~"
//! ```
//!
//! A requirement that starts with `~` is read as `=`. Each comparator's
//! version drops everything from its first `_`, as for versions.

use crate::version::{strip_build_suffix, Version};
use crate::ParseError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CONSTRAINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(!)?([a-zA-Z0-9.:/+_-]+)(.*)$").expect("constraint grammar is a valid regex")
});

/// Comparison operator of a single comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::NotEq => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
        }
    }
}

/// One `op version` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Eq => version == &self.version,
            Op::NotEq => version != &self.version,
            Op::Gt => version > &self.version,
            Op::Ge => version >= &self.version,
            Op::Lt => version < &self.version,
            Op::Le => version <= &self.version,
        }
    }
}

/// A conjunction of comparators. Every comparator must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    pub comparators: Vec<Comparator>,
}

impl VersionReq {
    /// Parse requirement text such as `>=1.2, <2`.
    ///
    /// Each comparator's version is cut at its own first `_`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let text = raw.trim();
        if text.is_empty() {
            return Err("empty requirement".to_string());
        }

        let comparators = text
            .split(',')
            .map(|part| parse_comparator(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { comparators })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }
}

fn parse_comparator(part: &str) -> Result<Comparator, String> {
    // Two-character operators first so `>=` is not read as `>`.
    const OPS: [(&str, Op); 7] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Eq),
        ("!=", Op::NotEq),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ];

    let (op, rest) = OPS
        .iter()
        .find_map(|(prefix, op)| part.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((Op::Eq, part));

    let version = Version::parse(strip_build_suffix(rest).trim()).map_err(|e| e.to_string())?;
    Ok(Comparator { op, version })
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .comparators
            .iter()
            .map(|c| format!("{}{}", c.op.as_str(), c.version))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// A parsed dependency string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Set for `!name` anti-dependencies
    pub negated: bool,
    pub name: String,
    /// `None` means any version satisfies
    pub requirement: Option<VersionReq>,
}

impl Constraint {
    /// Parse a raw dependency string like `so:libc.musl-x86_64.so.1` or
    /// `libbar>=1.0`.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let malformed = |reason: String| ParseError::MalformedConstraint {
            raw: raw.to_string(),
            reason,
        };

        let caps = CONSTRAINT_RE
            .captures(raw)
            .ok_or_else(|| malformed("does not match constraint grammar".to_string()))?;

        let negated = caps.get(1).is_some();
        let name = caps[2].to_string();
        let rest = caps.get(3).map_or("", |m| m.as_str());

        let requirement = if rest.is_empty() {
            None
        } else {
            let text = match rest.strip_prefix('~') {
                Some(fuzzy) => format!("={fuzzy}"),
                None => rest.to_string(),
            };
            Some(VersionReq::parse(&text).map_err(malformed)?)
        };

        Ok(Self {
            negated,
            name,
            requirement,
        })
    }

    /// Whether `version` satisfies the requirement. No requirement matches
    /// everything.
    pub fn matches(&self, version: &Version) -> bool {
        self.requirement
            .as_ref()
            .map_or(true, |req| req.matches(version))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(req) = &self.requirement {
            write!(f, "{req}")?;
        }
        Ok(())
    }
}

/// A name a package claims to satisfy besides its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provides {
    /// Empty for an empty raw string; registration skips it
    pub name: String,
    pub version: Option<Version>,
}

impl Provides {
    /// Parse `name` or `name=version`.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = raw.split('=').collect();
        match parts.as_slice() {
            [name] => Ok(Self {
                name: name.to_string(),
                version: None,
            }),
            [name, version] => Ok(Self {
                name: name.to_string(),
                version: Some(Version::parse(version)?),
            }),
            _ => Err(ParseError::MalformedProvides(raw.to_string())),
        }
    }
}
