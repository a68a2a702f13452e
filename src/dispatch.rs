// src/dispatch.rs

//! Request dispatcher
//!
//! Maps one request envelope to `dump` or `depsolve`, and builds the
//! response envelope. Every failure surfaces as a single [`Error`]; the
//! binary turns it into the `{kind, reason}` error envelope.

use crate::catalog::PackageCatalog;
use crate::checksum::repo_checksums;
use crate::config::{Config, Options};
use crate::error::{Error, Result};
use crate::packages::Package;
use crate::repository::{self, RepositoryDescriptor, Transport};
use crate::resolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Request envelope read from the caller
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub command: String,
    pub arguments: Arguments,
}

impl Request {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub repos: Repos,
    pub cachedir: PathBuf,
    pub module_platform_id: String,
    #[serde(rename = "package-specs", default)]
    pub package_specs: Option<Vec<String>>,
    #[serde(rename = "exclude-specs", default)]
    pub exclude_specs: Vec<String>,
}

/// Repositories as a list (request order) or a map keyed by id (key order)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Repos {
    List(Vec<RepositoryDescriptor>),
    Map(BTreeMap<String, RepositoryDescriptor>),
}

impl Default for Repos {
    fn default() -> Self {
        Repos::List(Vec::new())
    }
}

impl Repos {
    /// Descriptors in enablement order
    pub fn descriptors(&self) -> Result<Vec<RepositoryDescriptor>> {
        match self {
            Repos::List(list) => Ok(list.clone()),
            Repos::Map(map) => map
                .iter()
                .map(|(key, descriptor)| {
                    if !descriptor.id.is_empty() && &descriptor.id != key {
                        return Err(Error::ConfigError(format!(
                            "Repository key '{}' does not match its id '{}'",
                            key, descriptor.id
                        )));
                    }
                    Ok(RepositoryDescriptor {
                        id: key.clone(),
                        ..descriptor.clone()
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Dump,
    Depsolve,
}

impl Command {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "dump" => Ok(Command::Dump),
            "depsolve" => Ok(Command::Depsolve),
            other => Err(Error::InvalidRequest(format!("Unknown command '{}'", other))),
        }
    }
}

/// One entry of the `dump` package list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpPackage {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub url: Option<String>,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub buildtime: String,
    pub license: String,
}

impl From<&Package> for DumpPackage {
    fn from(pkg: &Package) -> Self {
        Self {
            name: pkg.name.clone(),
            summary: pkg.summary.clone(),
            description: pkg.description.clone(),
            url: pkg.url.clone(),
            epoch: pkg.epoch(),
            version: pkg.version().to_string(),
            release: pkg.release().to_string(),
            arch: pkg.arch.clone(),
            buildtime: pkg.buildtime_rfc3339(),
            license: pkg.license.clone(),
        }
    }
}

/// One entry of the `depsolve` dependency list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEntry {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub repo_id: String,
    pub path: String,
    pub remote_location: String,
    pub checksum: String,
}

impl From<&Package> for DependencyEntry {
    fn from(pkg: &Package) -> Self {
        Self {
            name: pkg.name.clone(),
            epoch: pkg.epoch(),
            version: pkg.version().to_string(),
            release: pkg.release().to_string(),
            arch: pkg.arch.clone(),
            repo_id: pkg.repo_id.clone(),
            path: pkg.location.clone(),
            remote_location: pkg.remote_location.clone(),
            checksum: pkg.checksum.to_string(),
        }
    }
}

/// Success envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Dump {
        checksums: BTreeMap<String, String>,
        packages: Vec<DumpPackage>,
    },
    Depsolve {
        checksums: BTreeMap<String, String>,
        dependencies: Vec<DependencyEntry>,
    },
}

/// Error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub reason: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            reason: err.reason(),
        }
    }
}

/// Run one request end to end
///
/// The request is validated before any I/O. The per-request persist
/// directory is removed when this function returns, on every path.
pub fn handle(request: &Request, options: &Options, transport: &dyn Transport) -> Result<Response> {
    let command = Command::parse(&request.command)?;
    let args = &request.arguments;
    let descriptors = args.repos.descriptors()?;

    let specs = match (command, &args.package_specs) {
        (Command::Depsolve, None) => {
            return Err(Error::InvalidRequest(
                "'package-specs' is required for depsolve".to_string(),
            ))
        }
        (_, specs) => specs.clone().unwrap_or_default(),
    };

    let persistdir = tempfile::Builder::new().prefix("depsolve-").tempdir()?;
    let config = Config::new(
        &args.cachedir,
        &args.module_platform_id,
        persistdir.path(),
        options,
    );
    info!(
        "Handling {:?} with {} repositories (arch {}, platform '{}')",
        command,
        descriptors.len(),
        config.arch.base(),
        config.module_platform_id
    );

    let handles = repository::load_all(&descriptors, &config, transport)?;
    for handle in &handles {
        debug!(
            "Repository {} at revision {} ({} packages, cached in {})",
            handle.id(),
            handle.revision().unwrap_or("unknown"),
            handle.packages().len(),
            handle.cache_dir().display()
        );
    }
    let catalog = PackageCatalog::build(&handles);

    let response = match command {
        Command::Dump => {
            let packages = catalog
                .available()
                .map(|(_, pkg)| DumpPackage::from(pkg))
                .collect();
            Response::Dump {
                checksums: repo_checksums(&handles)?,
                packages,
            }
        }
        Command::Depsolve => {
            let transaction = resolver::resolve(&catalog, &specs, &args.exclude_specs, &config)?;
            let dependencies = transaction.packages().map(DependencyEntry::from).collect();
            Response::Depsolve {
                checksums: repo_checksums(&handles)?,
                dependencies,
            }
        }
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::tests::package;

    struct NoNetwork;

    impl Transport for NoNetwork {
        fn fetch(&self, url: &str, _verify_tls: bool) -> Result<Vec<u8>> {
            panic!("unexpected fetch of {}", url);
        }
    }

    fn request(json: &str) -> Request {
        Request::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_repos_as_list_and_map() {
        let list = request(
            r#"{"command":"dump","arguments":{"cachedir":"/c","module_platform_id":"platform:f40",
                "repos":[{"id":"b","baseurl":["http://b"]},{"id":"a","baseurl":["http://a"]}]}}"#,
        );
        let ids: Vec<String> = list
            .arguments
            .repos
            .descriptors()
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        let map = request(
            r#"{"command":"dump","arguments":{"cachedir":"/c","module_platform_id":"platform:f40",
                "repos":{"z":{"baseurl":["http://z"]},"m":{"id":"m","metalink":"http://m"}}}}"#,
        );
        let descriptors = map.arguments.repos.descriptors().unwrap();
        assert_eq!(descriptors[0].id, "m");
        assert_eq!(descriptors[1].id, "z");

        let mismatch = request(
            r#"{"command":"dump","arguments":{"cachedir":"/c","module_platform_id":"platform:f40",
                "repos":{"z":{"id":"y","baseurl":["http://z"]}}}}"#,
        );
        assert!(matches!(
            mismatch.arguments.repos.descriptors(),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_requests_fail_before_io() {
        let options = Options::default();

        let unknown = request(
            r#"{"command":"install","arguments":{"cachedir":"/c","module_platform_id":"p","repos":[]}}"#,
        );
        let err = handle(&unknown, &options, &NoNetwork).unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");

        let no_specs = request(
            r#"{"command":"depsolve","arguments":{"cachedir":"/c","module_platform_id":"p",
                "repos":[{"id":"r","baseurl":["http://r"]}]}}"#,
        );
        let err = handle(&no_specs, &options, &NoNetwork).unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
        assert_eq!(err.exit_code(), 1);

        let ambiguous = request(
            r#"{"command":"dump","arguments":{"cachedir":"/c","module_platform_id":"p",
                "repos":[{"id":"r","baseurl":["http://x/repo"],"metalink":"http://m"}]}}"#,
        );
        let err = handle(&ambiguous, &options, &NoNetwork).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_malformed_json_is_invalid_request() {
        let err = Request::from_slice(b"{\"command\": ").unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[test]
    fn test_argument_defaults() {
        let no_platform = Request::from_slice(br#"{"command":"dump","arguments":{"cachedir":"/c"}}"#);
        assert_eq!(no_platform.unwrap_err().kind(), "InvalidRequest");

        let cache = tempfile::TempDir::new().unwrap();
        let no_repos = Request {
            command: "dump".to_string(),
            arguments: Arguments {
                repos: Repos::default(),
                cachedir: cache.path().to_path_buf(),
                module_platform_id: "platform:f40".to_string(),
                package_specs: None,
                exclude_specs: Vec::new(),
            },
        };
        let parsed = request(
            r#"{"command":"dump","arguments":{"cachedir":"/c","module_platform_id":"platform:f40"}}"#,
        );
        assert!(parsed.arguments.repos.descriptors().unwrap().is_empty());
        assert!(parsed.arguments.exclude_specs.is_empty());

        let response = handle(&no_repos, &Options::default(), &NoNetwork).unwrap();
        assert_eq!(
            response,
            Response::Dump {
                checksums: BTreeMap::new(),
                packages: Vec::new(),
            }
        );
    }

    #[test]
    fn test_entries_from_package() {
        let mut pkg = package("foo", "2:1.0-1.fc40", "x86_64");
        pkg.buildtime = 0;
        pkg.url = Some("https://foo.example".to_string());

        let dump = DumpPackage::from(&pkg);
        assert_eq!(dump.epoch, 2);
        assert_eq!(dump.buildtime, "1970-01-01T00:00:00Z");
        assert_eq!(dump.url.as_deref(), Some("https://foo.example"));

        let dep = DependencyEntry::from(&pkg);
        assert_eq!(dep.path, "Packages/foo-2:1.0-1.fc40.x86_64.rpm");
        assert_eq!(dep.checksum, "sha256:00");
        assert_eq!(dep.repo_id, "test");
    }

    #[test]
    fn test_error_envelope() {
        let err = Error::MarkingError {
            specs: vec!["foo >= 2.0".to_string()],
        };
        let envelope = ErrorResponse::from(&err);
        assert_eq!(envelope.kind, "MarkingErrors");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({
                "kind": "MarkingErrors",
                "reason": "Error occurred when marking packages for installation: No match for argument: foo >= 2.0"
            })
        );
    }
}
