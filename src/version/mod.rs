// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! This module provides RPM version comparison (`rpmvercmp`), parsing of
//! epoch:version-release strings, and the range-overlap rules rpm applies
//! when matching a requirement against a provide.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Compare two version (or release) strings with rpm's segment algorithm
///
/// Strings are split into alternating numeric and alphabetic runs; any other
/// character is a separator. Numeric runs compare numerically and always
/// beat alphabetic runs. `~` sorts before everything (even the end of the
/// string), `^` sorts after the end of the string but before any other
/// segment. Non-ASCII input falls back to plain lexical comparison.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if !a.is_ascii() || !b.is_ascii() {
        return a.cmp(b);
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        // Tilde: pre-release marker
        if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
            if one.first() != Some(&b'~') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret: post-release snapshot marker
        if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if one[0] != b'^' {
                return Ordering::Greater;
            }
            if two[0] != b'^' {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg1, rest1) = take_segment(one, numeric);
        let (seg2, rest2) = take_segment(two, numeric);

        // Segments of different kinds: numeric is newer
        if seg2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            compare_numeric(seg1, seg2)
        } else {
            seg1.cmp(seg2)
        };
        if ord != Ordering::Equal {
            return ord;
        }

        one = rest1;
        two = rest2;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|c| c.is_ascii_alphanumeric() || *c == b'~' || *c == b'^')
        .unwrap_or(s.len());
    &s[start..]
}

fn take_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|c| *c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// A parsed RPM version with epoch, version, and release components
///
/// Equality and hashing follow [`rpmvercmp`], so `1.01` and `1.1` are the
/// same version.
#[derive(Debug, Clone)]
pub struct RpmVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Build a version from already separated components
    pub fn new(epoch: u64, version: impl Into<String>, release: Option<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release,
        }
    }

    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (epoch_str, rest) = match s.find(':') {
            Some(colon_pos) => (&s[..colon_pos], &s[colon_pos + 1..]),
            None => ("", s),
        };

        let epoch = if epoch_str.is_empty() {
            0 // Empty epoch (e.g., ":1.0.0") defaults to 0
        } else {
            epoch_str.parse::<u64>().map_err(|e| {
                Error::ParseError(format!("Invalid epoch in version '{}': {}", s, e))
            })?
        };

        let (version, release) = match rest.rfind('-') {
            Some(dash_pos) => (
                rest[..dash_pos].to_string(),
                Some(rest[dash_pos + 1..].to_string()),
            ),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release: release.filter(|r| !r.is_empty()),
        })
    }

    /// Compare two RPM versions
    ///
    /// Epoch first, then version, then release. A missing release sorts
    /// before any present release so the order stays total.
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            })
    }

    /// Compare the way rpm does when matching dependency ranges
    ///
    /// Releases only take part when both sides carry one.
    pub fn compare_for_match(&self, other: &RpmVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RpmVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RpmVersion {}

impl Hash for RpmVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        hash_segments(&self.version, state);
        self.release.is_some().hash(state);
        if let Some(release) = &self.release {
            hash_segments(release, state);
        }
    }
}

/// Feed the segments `rpmvercmp` looks at, skipping separators and
/// leading zeros
fn hash_segments<H: Hasher>(s: &str, state: &mut H) {
    if !s.is_ascii() {
        s.hash(state);
        return;
    }
    let mut rest = s.as_bytes();
    loop {
        rest = skip_separators(rest);
        let Some(&first) = rest.first() else {
            break;
        };
        if first == b'~' || first == b'^' {
            first.hash(state);
            rest = &rest[1..];
            continue;
        }
        let numeric = first.is_ascii_digit();
        let (segment, tail) = take_segment(rest, numeric);
        numeric.hash(state);
        if numeric {
            strip_leading_zeros(segment).hash(state);
        } else {
            segment.hash(state);
        }
        rest = tail;
    }
}

/// Relational operator of a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    /// Parse an rpm-md `flags` attribute (LT, LE, EQ, GE, GT)
    pub fn from_flags(flags: &str) -> Option<Self> {
        match flags {
            "LT" => Some(Comparison::Less),
            "LE" => Some(Comparison::LessOrEqual),
            "EQ" => Some(Comparison::Equal),
            "GE" => Some(Comparison::GreaterOrEqual),
            "GT" => Some(Comparison::Greater),
            _ => None,
        }
    }

    /// Parse an operator as written in specs and rich dependencies
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "<" => Some(Comparison::Less),
            "<=" | "=<" => Some(Comparison::LessOrEqual),
            "=" | "==" => Some(Comparison::Equal),
            ">=" | "=>" => Some(Comparison::GreaterOrEqual),
            ">" => Some(Comparison::Greater),
            _ => None,
        }
    }

    fn less(self) -> bool {
        matches!(self, Comparison::Less | Comparison::LessOrEqual)
    }

    fn equal(self) -> bool {
        matches!(
            self,
            Comparison::LessOrEqual | Comparison::Equal | Comparison::GreaterOrEqual
        )
    }

    fn greater(self) -> bool {
        matches!(self, Comparison::Greater | Comparison::GreaterOrEqual)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Greater => ">",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single relational constraint such as `>= 1.2-3`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    pub op: Comparison,
    pub version: RpmVersion,
}

impl VersionConstraint {
    pub fn new(op: Comparison, version: RpmVersion) -> Self {
        Self { op, version }
    }

    /// Parse a constraint string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "< 2.0.0" → Less(2.0.0)
    /// - "= 1.5.0" → Equal(1.5.0)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(s.len());
        let (op, rest) = s.split_at(split);
        let op = Comparison::from_operator(op).ok_or_else(|| {
            Error::ParseError(format!("Invalid version constraint operator in '{}'", s))
        })?;
        Ok(Self::new(op, RpmVersion::parse(rest)?))
    }

    /// Check whether a concrete package version satisfies this constraint
    pub fn satisfies(&self, version: &RpmVersion) -> bool {
        self.overlaps(&VersionConstraint::new(Comparison::Equal, version.clone()))
    }

    /// Check whether two ranges share at least one version
    ///
    /// This mirrors rpm's dependency range comparison: `self` is the provide
    /// side, `other` the requirement side, but the relation is symmetric.
    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        match self.version.compare_for_match(&other.version) {
            Ordering::Less => self.op.greater() || other.op.less(),
            Ordering::Greater => self.op.less() || other.op.greater(),
            Ordering::Equal => {
                (self.op.equal() && other.op.equal())
                    || (self.op.less() && other.op.less())
                    || (self.op.greater() && other.op.greater())
            }
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}
