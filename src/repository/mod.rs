// src/repository/mod.rs

//! Repository loading
//!
//! This module provides functionality for:
//! - Validating repository descriptors from a request
//! - Locating each repository's cache directory
//! - Synchronizing rpm-md metadata when the cache is missing or expired
//! - Loading the primary package index into memory
//!
//! Repositories are loaded in parallel; results keep request order.

pub mod cache;
pub mod client;
pub mod mirrors;
pub mod parsers;

pub use cache::RepoCache;
pub use client::{RepositoryClient, Transport};

use crate::checksum::sha256_hex;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::packages::Package;
use cache::REPOMD_LOCATION;
use client::join_url;
use mirrors::{parse_metalink, parse_mirrorlist, MirrorSet};
use parsers::{decompress, PrimaryParser, RepoMd};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File the metalink is kept under inside the cache directory
const METALINK_FILE: &str = "metalink.xml";

/// File the mirrorlist is kept under inside the cache directory
const MIRRORLIST_FILE: &str = "mirrorlist";

/// A repository as described in the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub baseurl: Option<Vec<String>>,
    #[serde(default)]
    pub metalink: Option<String>,
    #[serde(default)]
    pub mirrorlist: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default, alias = "ignore_tls_verify")]
    pub ignoressl: bool,
}

/// The single metadata source a repository is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    BaseUrl(Vec<String>),
    Metalink(String),
    Mirrorlist(String),
}

impl MetadataSource {
    /// Validate a descriptor and pick its metadata source
    ///
    /// Exactly one of `baseurl`, `metalink` and `mirrorlist` must be set.
    pub fn from_descriptor(descriptor: &RepositoryDescriptor) -> Result<Self> {
        let id = &descriptor.id;
        if id.is_empty() || id.contains('/') || id == "." || id == ".." {
            return Err(Error::ConfigError(format!(
                "Invalid repository id '{}'",
                id
            )));
        }

        let source = match (&descriptor.baseurl, &descriptor.metalink, &descriptor.mirrorlist) {
            (Some(urls), None, None) => {
                if urls.is_empty() || urls.iter().any(|u| u.trim().is_empty()) {
                    return Err(Error::ConfigError(format!(
                        "Repository '{}' has an empty baseurl",
                        id
                    )));
                }
                MetadataSource::BaseUrl(urls.clone())
            }
            (None, Some(url), None) => MetadataSource::Metalink(url.clone()),
            (None, None, Some(url)) => MetadataSource::Mirrorlist(url.clone()),
            _ => {
                return Err(Error::ConfigError(format!(
                    "Repository '{}' must set exactly one of baseurl, metalink or mirrorlist",
                    id
                )))
            }
        };

        if source.primary_url().trim().is_empty() {
            return Err(Error::ConfigError(format!(
                "Repository '{}' has an empty metadata URL",
                id
            )));
        }
        Ok(source)
    }

    /// The URL that identifies the repository's cache directory
    pub fn primary_url(&self) -> &str {
        match self {
            MetadataSource::BaseUrl(urls) => urls.first().map(String::as_str).unwrap_or_default(),
            MetadataSource::Metalink(url) | MetadataSource::Mirrorlist(url) => url,
        }
    }

    /// Cached copy of the mirror document, if this source uses one
    fn mirror_file(&self) -> Option<&'static str> {
        match self {
            MetadataSource::BaseUrl(_) => None,
            MetadataSource::Metalink(_) => Some(METALINK_FILE),
            MetadataSource::Mirrorlist(_) => Some(MIRRORLIST_FILE),
        }
    }

    fn parse_mirrors(&self, body: &[u8]) -> Result<MirrorSet> {
        match self {
            MetadataSource::BaseUrl(urls) => Ok(MirrorSet {
                mirrors: urls.clone(),
                repomd_hashes: Vec::new(),
            }),
            MetadataSource::Metalink(_) => parse_metalink(body),
            MetadataSource::Mirrorlist(_) => parse_mirrorlist(body),
        }
    }
}

/// Cache directory name: `{id}-{first 16 hex digits of sha256(url)}`
pub fn cache_dir_name(id: &str, primary_url: &str) -> String {
    let digest = sha256_hex(primary_url.as_bytes());
    format!("{}-{}", id, &digest[..16])
}

/// A loaded repository: its descriptor, cache location and packages
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    descriptor: RepositoryDescriptor,
    cache_dir: PathBuf,
    repomd_sha256: String,
    revision: Option<String>,
    packages: Vec<Package>,
}

impl RepositoryHandle {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn repomd_path(&self) -> PathBuf {
        self.cache_dir.join(REPOMD_LOCATION)
    }

    /// Hex SHA-256 of the `repomd.xml` the packages were loaded from
    pub fn repomd_sha256(&self) -> &str {
        &self.repomd_sha256
    }

    /// The `<revision>` of the loaded repomd.xml
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Packages in primary.xml order
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }
}

/// Validate every descriptor, then load all repositories in parallel
///
/// Configuration errors are reported before any I/O happens. Load
/// failures are wrapped as repository errors; the first failing
/// repository in request order wins.
pub fn load_all(
    descriptors: &[RepositoryDescriptor],
    config: &Config,
    transport: &dyn Transport,
) -> Result<Vec<RepositoryHandle>> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        MetadataSource::from_descriptor(descriptor)?;
        if !seen.insert(descriptor.id.as_str()) {
            return Err(Error::ConfigError(format!(
                "Duplicate repository id '{}'",
                descriptor.id
            )));
        }
    }

    info!("Loading {} repositories", descriptors.len());

    let results: Vec<Result<RepositoryHandle>> = descriptors
        .par_iter()
        .map(|descriptor| {
            load(descriptor, config, transport).map_err(|e| Error::repo(&descriptor.id, e))
        })
        .collect();

    results.into_iter().collect()
}

/// Load one repository, synchronizing its cache first when needed
pub fn load(
    descriptor: &RepositoryDescriptor,
    config: &Config,
    transport: &dyn Transport,
) -> Result<RepositoryHandle> {
    let source = MetadataSource::from_descriptor(descriptor)?;
    let dir_name = cache_dir_name(&descriptor.id, source.primary_url());
    let cache = RepoCache::new(&config.cachedir, &config.persistdir, &dir_name);

    let mirrors = match cached_mirrors(&cache, &source, config) {
        Some(mirrors) => {
            info!("Using cached metadata for repository {}", descriptor.id);
            mirrors
        }
        None => {
            info!("Synchronizing repository {}", descriptor.id);
            sync(&source, &cache, transport, !descriptor.ignoressl)?
        }
    };

    let repomd_bytes = fs::read(cache.repomd_path())?;
    let repomd = RepoMd::parse(&repomd_bytes)?;
    let primary = repomd.primary()?;
    let primary_raw = fs::read(cache.path_for(&primary.location))?;
    let primary_xml = decompress(&primary_raw, &primary.location)?;

    let base_url = mirrors.mirrors.first().map(String::as_str).unwrap_or_default();
    let packages = PrimaryParser::new(&descriptor.id, base_url).parse(&primary_xml)?;

    info!(
        "Loaded {} packages from repository {}",
        packages.len(),
        descriptor.id
    );

    Ok(RepositoryHandle {
        descriptor: descriptor.clone(),
        cache_dir: cache.dir().to_path_buf(),
        repomd_sha256: sha256_hex(&repomd_bytes),
        revision: repomd.revision.clone(),
        packages,
    })
}

/// Mirrors of a usable cache, or `None` when the cache must be refreshed
fn cached_mirrors(cache: &RepoCache, source: &MetadataSource, config: &Config) -> Option<MirrorSet> {
    let repomd = fs::read(cache.repomd_path()).ok()?;
    let primary = match RepoMd::parse(&repomd) {
        Ok(repomd) => cache.path_for(&repomd.primary().ok()?.location),
        Err(e) => {
            warn!("Ignoring unreadable cached {}: {}", cache.repomd_path().display(), e);
            return None;
        }
    };

    let mut required = vec![primary];
    if let Some(file) = source.mirror_file() {
        required.push(cache.path_for(file));
    }
    if !cache.is_fresh(config.metadata_expire, &required) {
        debug!("Cache {} is missing files or expired", cache.dir().display());
        return None;
    }

    let body = match source.mirror_file() {
        Some(file) => fs::read(cache.path_for(file)).ok()?,
        None => Vec::new(),
    };
    source.parse_mirrors(&body).ok()
}

/// Download repomd.xml and the primary index into the cache
///
/// The primary index is installed before repomd.xml so that a cached
/// repomd.xml always refers to a file that is present.
fn sync(
    source: &MetadataSource,
    cache: &RepoCache,
    transport: &dyn Transport,
    verify_tls: bool,
) -> Result<MirrorSet> {
    let mirrors = match source.mirror_file() {
        Some(file) => {
            let body = transport.fetch(source.primary_url(), verify_tls)?;
            let mirrors = source.parse_mirrors(&body)?;
            cache.store(file, &body)?;
            mirrors
        }
        None => source.parse_mirrors(&[])?,
    };

    if mirrors.mirrors.is_empty() {
        return Err(Error::DownloadError(format!(
            "No usable mirrors in {}",
            source.primary_url()
        )));
    }

    let repomd_bytes = fetch_from_mirrors(
        &mirrors.mirrors,
        REPOMD_LOCATION,
        transport,
        verify_tls,
        |data| mirrors.verify_repomd(data),
    )?;
    let repomd = RepoMd::parse(&repomd_bytes)?;
    let primary = repomd.primary()?;

    let primary_bytes = fetch_from_mirrors(
        &mirrors.mirrors,
        &primary.location,
        transport,
        verify_tls,
        |data| {
            if let Some(checksum) = &primary.checksum {
                if !checksum.verify(data)? {
                    warn!(
                        "Cannot verify {} checksum of {}",
                        checksum.algorithm, primary.location
                    );
                }
            }
            Ok(())
        },
    )?;

    cache.store(&primary.location, &primary_bytes)?;
    cache.store(REPOMD_LOCATION, &repomd_bytes)?;

    // Superseded revisions leave their primary index behind
    if let Err(e) = cache.prune(&[REPOMD_LOCATION, primary.location.as_str()]) {
        warn!("Failed to prune {}: {}", cache.dir().display(), e);
    }
    Ok(mirrors)
}

/// Try each mirror in order until one serves content that validates
fn fetch_from_mirrors(
    mirrors: &[String],
    relative: &str,
    transport: &dyn Transport,
    verify_tls: bool,
    validate: impl Fn(&[u8]) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut last_err = None;
    for mirror in mirrors {
        let url = join_url(mirror, relative);
        match transport.fetch(&url, verify_tls).and_then(|data| {
            validate(&data)?;
            Ok(data)
        }) {
            Ok(data) => return Ok(data),
            Err(e) => {
                warn!("Mirror {} failed: {}", url, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::DownloadError(format!("No mirror served {}", relative))))
}
