// src/packages/mod.rs

//! Package records loaded from repository metadata
//!
//! A [`Package`] is immutable once parsed. Besides the descriptive fields
//! reported by `dump`, it carries the capability lists the resolver works
//! with (provides, requires, recommends, conflicts, obsoletes, files).

pub mod arch;
pub mod capability;

pub use arch::ArchPolicy;
pub use capability::{Capability, Dependency};

use crate::checksum::Checksum;
use crate::version::{Comparison, RpmVersion};
use chrono::DateTime;

/// A binary or source package available from a repository
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub evr: RpmVersion,
    pub arch: String,
    pub summary: String,
    pub description: String,
    pub url: Option<String>,
    pub license: String,
    pub sourcerpm: Option<String>,
    /// Build time in seconds since the Unix epoch
    pub buildtime: i64,
    pub repo_id: String,
    /// Path of the package file relative to the repository root
    pub location: String,
    /// Resolved download URL
    pub remote_location: String,
    pub checksum: Checksum,
    pub provides: Vec<Capability>,
    pub requires: Vec<Dependency>,
    pub recommends: Vec<Dependency>,
    pub conflicts: Vec<Capability>,
    pub obsoletes: Vec<Capability>,
    /// Files listed in the primary index (binaries and /etc only)
    pub files: Vec<String>,
}

impl Package {
    pub fn epoch(&self) -> u64 {
        self.evr.epoch
    }

    pub fn version(&self) -> &str {
        &self.evr.version
    }

    pub fn release(&self) -> &str {
        self.evr.release.as_deref().unwrap_or("")
    }

    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    /// Build time rendered as RFC3339 UTC (`2024-01-31T12:00:00Z`)
    pub fn buildtime_rfc3339(&self) -> String {
        DateTime::from_timestamp(self.buildtime, 0)
            .unwrap_or_default()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }

    /// The implicit `name = epoch:version-release` provide
    pub fn self_provide(&self) -> Capability {
        Capability::versioned(self.name.clone(), Comparison::Equal, self.evr.clone())
    }

    /// Whether this package satisfies a capability through its name,
    /// explicit provides, or listed files
    pub fn satisfies(&self, required: &Capability) -> bool {
        if required.is_file() && self.files.iter().any(|f| f == &required.name) {
            return true;
        }
        self.self_provide().provides(required) || self.provides.iter().any(|p| p.provides(required))
    }

    /// Whether this package's own name and version fall within `cap`
    pub fn matches_name_and_version(&self, cap: &Capability) -> bool {
        if self.name != cap.name {
            return false;
        }
        match &cap.constraint {
            Some(constraint) => constraint.satisfies(&self.evr),
            None => true,
        }
    }

    /// Explain why this package cannot be installed alongside `other`, if it cannot
    pub fn clash_with(&self, other: &Package) -> Option<String> {
        if self.name == other.name && self.evr != other.evr {
            return Some(format!(
                "cannot install both {} and {}",
                other.nevra(),
                self.nevra()
            ));
        }
        if let Some(cap) = self.conflicts.iter().find(|c| other.satisfies(c)) {
            return Some(format!(
                "package {} conflicts with {} provided by {}",
                self.nevra(),
                cap,
                other.nevra()
            ));
        }
        if let Some(cap) = other.conflicts.iter().find(|c| self.satisfies(c)) {
            return Some(format!(
                "package {} conflicts with {} provided by {}",
                other.nevra(),
                cap,
                self.nevra()
            ));
        }
        if self.name != other.name {
            if let Some(cap) = self.obsoletes.iter().find(|c| other.matches_name_and_version(c)) {
                return Some(format!(
                    "package {} obsoletes {} provided by {}",
                    self.nevra(),
                    cap,
                    other.nevra()
                ));
            }
            if let Some(cap) = other.obsoletes.iter().find(|c| self.matches_name_and_version(c)) {
                return Some(format!(
                    "package {} obsoletes {} provided by {}",
                    other.nevra(),
                    cap,
                    self.nevra()
                ));
            }
        }
        None
    }
}
