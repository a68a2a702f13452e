// src/checksum.rs

//! Content checksums for repository metadata and packages
//!
//! Provides the `algorithm:hex` checksum type reported for packages, the
//! hashing helpers used to verify downloaded metadata, and the per-request
//! repository checksum map that witnesses which metadata snapshot a dump or
//! depsolve result was computed from.

use crate::error::{Error, Result};
use crate::repository::RepositoryHandle;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use tracing::debug;

/// A checksum as advertised by repository metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub algorithm: String,
    pub value: String,
}

impl Checksum {
    /// Create a checksum, normalising legacy algorithm names (`sha` is SHA-1)
    pub fn new(algorithm: &str, value: &str) -> Self {
        let algorithm = match algorithm.to_ascii_lowercase().as_str() {
            "sha" => "sha1".to_string(),
            other => other.to_string(),
        };
        Self {
            algorithm,
            value: value.trim().to_ascii_lowercase(),
        }
    }

    /// SHA-256 checksum of a byte slice
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            value: sha256_hex(data),
        }
    }

    /// Compute the digest of `data` with this checksum's algorithm
    ///
    /// Returns `None` for algorithms we do not implement.
    pub fn compute(&self, data: &[u8]) -> Option<String> {
        match self.algorithm.as_str() {
            "sha256" => Some(sha256_hex(data)),
            "sha512" => Some(format!("{:x}", Sha512::digest(data))),
            _ => None,
        }
    }

    /// Verify `data` against this checksum
    ///
    /// Unsupported algorithms are accepted; the caller decides whether to log.
    pub fn verify(&self, data: &[u8]) -> Result<bool> {
        match self.compute(data) {
            Some(actual) if actual == self.value => Ok(true),
            Some(actual) => Err(Error::ChecksumMismatch {
                expected: self.to_string(),
                actual: format!("{}:{}", self.algorithm, actual),
            }),
            None => Ok(false),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compute `repo id -> "sha256:<hex>"` for every loaded repository
///
/// The checksum is taken over the `repomd.xml` the handle's catalog was
/// built from. A missing or unreadable file aborts the request, as does a
/// file whose content changed since the handle loaded it.
pub fn repo_checksums(handles: &[RepositoryHandle]) -> Result<BTreeMap<String, String>> {
    let mut checksums = BTreeMap::new();

    for handle in handles {
        let path = handle.repomd_path();
        let repomd = fs::read(&path).map_err(|e| {
            Error::repo(
                handle.id(),
                Error::ParseError(format!("Failed to read {}: {}", path.display(), e)),
            )
        })?;

        let digest = sha256_hex(&repomd);
        if digest != handle.repomd_sha256() {
            return Err(Error::repo(
                handle.id(),
                Error::ChecksumMismatch {
                    expected: format!("sha256:{}", handle.repomd_sha256()),
                    actual: format!("sha256:{}", digest),
                },
            ));
        }

        debug!("Checksum for repository {}: sha256:{}", handle.id(), digest);
        checksums.insert(handle.id().to_string(), format!("sha256:{}", digest));
    }

    Ok(checksums)
}
