// src/config.rs

//! Request-scoped configuration
//!
//! A [`Config`] is built once per request from the request arguments and
//! the command-line [`Options`], then passed by reference to every
//! component. Nothing mutates it afterwards.

use crate::packages::arch::{detect_architecture, ArchPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// dnf's default `metadata_expire` (48 hours)
pub const DEFAULT_METADATA_EXPIRE: Duration = Duration::from_secs(48 * 60 * 60);

/// Process-level options that are not part of the request envelope
#[derive(Debug, Clone)]
pub struct Options {
    /// Base architecture override (defaults to the host)
    pub arch: Option<String>,
    /// How long cached metadata stays valid
    pub metadata_expire: Duration,
    /// Whether to pull in weak (`Recommends`) dependencies
    pub install_weak_deps: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            arch: None,
            metadata_expire: DEFAULT_METADATA_EXPIRE,
            install_weak_deps: true,
        }
    }
}

/// Immutable configuration threaded through one request
#[derive(Debug, Clone)]
pub struct Config {
    pub cachedir: PathBuf,
    pub module_platform_id: String,
    /// Scratch directory for this request; removed when the request ends
    pub persistdir: PathBuf,
    pub arch: ArchPolicy,
    pub metadata_expire: Duration,
    pub install_weak_deps: bool,
}

impl Config {
    pub fn new(
        cachedir: impl Into<PathBuf>,
        module_platform_id: impl Into<String>,
        persistdir: &Path,
        options: &Options,
    ) -> Self {
        let arch = options.arch.clone().unwrap_or_else(detect_architecture);
        Self {
            cachedir: cachedir.into(),
            module_platform_id: module_platform_id.into(),
            persistdir: persistdir.to_path_buf(),
            arch: ArchPolicy::new(&arch),
            metadata_expire: options.metadata_expire,
            install_weak_deps: options.install_weak_deps,
        }
    }
}
