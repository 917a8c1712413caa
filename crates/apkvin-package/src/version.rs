//! APK version parsing and comparison.
//!
//! Upstream versions look like `1.2.3`, `1.1.1l-r7` or `2.0_rc1-r0`. Anything
//! from the first `_` onward is a build suffix and is discarded before
//! parsing, so `2.0_rc1-r0` and `2.0` compare equal.
//!
//! Grammar of the remainder:
//!
//! ```text
//! version  = ["v"] number { "." number } [ letters ] [ "-r" number ]
//! number   = digit { digit }
//! letters  = lowercase { lowercase }
//! ```

use crate::ParseError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed, comparable package version.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    /// Numeric segments (e.g. `[1, 2, 3]` for `1.2.3`)
    pub segments: Vec<u64>,
    /// Letter qualifier directly after the last segment (`l` in `1.1.1l`)
    pub qualifier: Option<String>,
    /// Package release (`7` in `-r7`)
    pub release: Option<u64>,
}

impl Version {
    /// Parse a raw version string, ignoring any `_` build suffix.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let invalid = |reason: &str| ParseError::InvalidVersion {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let cleaned = strip_build_suffix(raw).trim();
        let body = cleaned.strip_prefix('v').unwrap_or(cleaned);
        if body.is_empty() {
            return Err(invalid("empty version"));
        }

        let (body, release) = match body.split_once("-r") {
            Some((head, rel)) => {
                let rel = rel
                    .parse::<u64>()
                    .map_err(|_| invalid("release must be numeric"))?;
                (head, Some(rel))
            }
            None => (body, None),
        };

        let letters_at = body
            .find(|c: char| c.is_ascii_lowercase())
            .unwrap_or(body.len());
        let (numeric, letters) = body.split_at(letters_at);
        if !letters.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(invalid("unexpected characters after qualifier"));
        }

        let segments = numeric
            .split('.')
            .map(|s| {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("segments must be numeric"));
                }
                s.parse::<u64>().map_err(|_| invalid("segment out of range"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            segments,
            qualifier: (!letters.is_empty()).then(|| letters.to_string()),
            release,
        })
    }
}

/// Return everything before the first `_`.
pub fn strip_build_suffix(raw: &str) -> &str {
    raw.split('_').next().unwrap_or(raw)
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("."))?;
        if let Some(q) = &self.qualifier {
            write!(f, "{q}")?;
        }
        if let Some(r) = self.release {
            write!(f, "-r{r}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        self.qualifier
            .cmp(&other.qualifier)
            .then_with(|| self.release.unwrap_or(0).cmp(&other.release.unwrap_or(0)))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
