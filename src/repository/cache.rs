// src/repository/cache.rs

//! On-disk metadata cache
//!
//! Each repository owns `{cachedir}/{id}-{hash}/`, laid out like the
//! remote repository (`repodata/repomd.xml`, `repodata/*-primary.xml.gz`).
//! Downloads are staged under the request's persist directory and moved
//! into place with a rename, so a reader never sees a partial file.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const REPODATA_DIR: &str = "repodata";

pub const REPOMD_LOCATION: &str = "repodata/repomd.xml";

/// Cache directory of one repository
#[derive(Debug, Clone)]
pub struct RepoCache {
    dir: PathBuf,
    staging: PathBuf,
}

impl RepoCache {
    pub fn new(cachedir: &Path, persistdir: &Path, dir_name: &str) -> Self {
        Self {
            dir: cachedir.join(dir_name),
            staging: persistdir.join(dir_name),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repomd_path(&self) -> PathBuf {
        self.path_for(REPOMD_LOCATION)
    }

    /// Cache path of a metadata-relative location
    pub fn path_for(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }

    /// Whether every `required` file exists and `repomd.xml` is younger
    /// than `max_age`
    pub fn is_fresh(&self, max_age: Duration, required: &[PathBuf]) -> bool {
        let modified = match fs::metadata(self.repomd_path()).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        // A timestamp in the future counts as fresh
        let young = modified.elapsed().map(|age| age < max_age).unwrap_or(true);
        young && required.iter().all(|p| p.is_file())
    }

    /// Write `data` to the cache at `relative`, staging it first
    pub fn store(&self, relative: &str, data: &[u8]) -> Result<PathBuf> {
        let staged = self.staging.join(relative);
        let dest = self.path_for(relative);

        for path in [&staged, &dest] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create directory {}: {}", parent.display(), e),
                    ))
                })?;
            }
        }

        fs::write(&staged, data)?;

        // Copy next to the destination, then rename: the persist directory
        // may be on another filesystem than the cache
        let temp = dest.with_extension("tmp");
        fs::copy(&staged, &temp)?;
        fs::rename(&temp, &dest).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to move {} to {}: {}",
                    temp.display(),
                    dest.display(),
                    e
                ),
            ))
        })?;

        debug!("Cached {} ({} bytes)", dest.display(), data.len());
        Ok(dest)
    }

    /// Remove files under `repodata/` other than the `keep` locations
    ///
    /// Returns the number of files removed.
    pub fn prune(&self, keep: &[&str]) -> Result<usize> {
        let repodata = self.path_for(REPODATA_DIR);
        let keep: Vec<PathBuf> = keep.iter().map(|k| normalized(&self.path_for(k))).collect();

        let mut removed = 0;
        for entry in fs::read_dir(&repodata)? {
            let path = entry?.path();
            if path.is_file() && !keep.contains(&normalized(&path)) {
                fs::remove_file(&path)?;
                debug!("Removed stale {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_freshness() {
        let cache_root = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        let cache = RepoCache::new(cache_root.path(), persist.path(), "fedora-0123456789abcdef");

        assert!(!cache.is_fresh(Duration::from_secs(3600), &[]));

        let primary = cache.store("repodata/p-primary.xml.gz", b"gz").unwrap();
        cache.store(REPOMD_LOCATION, b"<repomd/>").unwrap();

        assert_eq!(fs::read(cache.repomd_path()).unwrap(), b"<repomd/>");
        assert!(cache.is_fresh(Duration::from_secs(3600), &[primary.clone()]));
        assert!(!cache.is_fresh(Duration::ZERO, &[primary]));
        assert!(!cache.is_fresh(
            Duration::from_secs(3600),
            &[cache.path_for("repodata/missing.xml.gz")]
        ));
        assert!(!cache.dir().join("repodata/repomd.tmp").exists());
    }

    #[test]
    fn test_prune_keeps_current_metadata() {
        let cache_root = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        let cache = RepoCache::new(cache_root.path(), persist.path(), "updates-0123456789abcdef");

        cache.store("repodata/old-primary.xml.gz", b"old").unwrap();
        cache.store("repodata/new-primary.xml.gz", b"new").unwrap();
        cache.store(REPOMD_LOCATION, b"<repomd/>").unwrap();
        cache.store("mirrorlist", b"file:///mirror").unwrap();

        let removed = cache
            .prune(&[REPOMD_LOCATION, "./repodata/new-primary.xml.gz"])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!cache.path_for("repodata/old-primary.xml.gz").exists());
        assert!(cache.path_for("repodata/new-primary.xml.gz").is_file());
        assert!(cache.repomd_path().is_file());
        assert!(cache.path_for("mirrorlist").is_file());
    }

    #[test]
    fn test_store_reports_directory_failure_as_io() {
        let cache_root = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        let blocker = cache_root.path().join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let cache = RepoCache::new(&blocker, persist.path(), "r-0123456789abcdef");
        let err = cache.store(REPOMD_LOCATION, b"<repomd/>").unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err:?}");
        assert!(err.to_string().contains("Failed to create directory"));
    }
}
