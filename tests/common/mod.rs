// tests/common/mod.rs

//! Shared fixtures: on-disk rpm-md repositories served over `file://`

#![allow(dead_code)]

use depsolve::config::Options;
use depsolve::dispatch::{self, Request, Response};
use depsolve::repository::RepositoryClient;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;
use url::Url;

/// One package of a fixture repository
///
/// Dependency entries use the request syntax: `name`, `name >= 1.0`,
/// `name = 1:2.0-3`, or a rich expression in parentheses.
#[derive(Debug, Clone)]
pub struct Pkg {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub buildtime: i64,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub recommends: Vec<String>,
    pub conflicts: Vec<String>,
    pub obsoletes: Vec<String>,
    pub files: Vec<String>,
}

impl Pkg {
    pub fn new(name: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: 0,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            buildtime: 1_700_000_000,
            provides: Vec::new(),
            requires: Vec::new(),
            recommends: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn provides(mut self, entry: &str) -> Self {
        self.provides.push(entry.to_string());
        self
    }

    pub fn requires(mut self, entry: &str) -> Self {
        self.requires.push(entry.to_string());
        self
    }

    pub fn recommends(mut self, entry: &str) -> Self {
        self.recommends.push(entry.to_string());
        self
    }

    pub fn conflicts(mut self, entry: &str) -> Self {
        self.conflicts.push(entry.to_string());
        self
    }

    pub fn obsoletes(mut self, entry: &str) -> Self {
        self.obsoletes.push(entry.to_string());
        self
    }

    pub fn file(mut self, path: &str) -> Self {
        self.files.push(path.to_string());
        self
    }

    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            self.name, self.version, self.release, self.arch
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn flags(op: &str) -> &'static str {
    match op {
        "<" => "LT",
        "<=" => "LE",
        "=" | "==" => "EQ",
        ">=" => "GE",
        ">" => "GT",
        other => panic!("unknown operator {other}"),
    }
}

fn entry_xml(entry: &str) -> String {
    if entry.starts_with('(') {
        return format!(r#"<rpm:entry name="{}"/>"#, escape(entry));
    }
    let parts: Vec<&str> = entry.split_whitespace().collect();
    match parts.as_slice() {
        [name] => format!(r#"<rpm:entry name="{}"/>"#, escape(name)),
        [name, op, evr] => {
            let (epoch, rest) = match evr.split_once(':') {
                Some((e, rest)) => (e, rest),
                None => ("0", *evr),
            };
            let (ver, rel) = match rest.split_once('-') {
                Some((v, r)) => (v, Some(r)),
                None => (rest, None),
            };
            let rel = rel
                .map(|r| format!(r#" rel="{}""#, escape(r)))
                .unwrap_or_default();
            format!(
                r#"<rpm:entry name="{}" flags="{}" epoch="{}" ver="{}"{}/>"#,
                escape(name),
                flags(op),
                epoch,
                escape(ver),
                rel
            )
        }
        _ => panic!("bad dependency entry {entry}"),
    }
}

fn section(out: &mut String, tag: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    writeln!(out, "      <rpm:{tag}>").unwrap();
    for entry in entries {
        writeln!(out, "        {}", entry_xml(entry)).unwrap();
    }
    writeln!(out, "      </rpm:{tag}>").unwrap();
}

/// Render a primary.xml document
pub fn primary_xml(packages: &[Pkg]) -> String {
    let mut out = String::new();
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(
        out,
        r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="{}">"#,
        packages.len()
    )
    .unwrap();
    for pkg in packages {
        let checksum = format!("{:x}", Sha256::digest(pkg.filename().as_bytes()));
        writeln!(out, r#"  <package type="rpm">"#).unwrap();
        writeln!(out, "    <name>{}</name>", escape(&pkg.name)).unwrap();
        writeln!(out, "    <arch>{}</arch>", pkg.arch).unwrap();
        writeln!(
            out,
            r#"    <version epoch="{}" ver="{}" rel="{}"/>"#,
            pkg.epoch, pkg.version, pkg.release
        )
        .unwrap();
        writeln!(out, r#"    <checksum type="sha256" pkgid="YES">{checksum}</checksum>"#).unwrap();
        writeln!(out, "    <summary>{} summary</summary>", escape(&pkg.name)).unwrap();
        writeln!(out, "    <description>{} description</description>", escape(&pkg.name)).unwrap();
        writeln!(out, "    <url>https://{}.example.org</url>", escape(&pkg.name)).unwrap();
        writeln!(out, r#"    <time file="{0}" build="{0}"/>"#, pkg.buildtime).unwrap();
        writeln!(out, r#"    <location href="Packages/{}"/>"#, escape(&pkg.filename())).unwrap();
        writeln!(out, "    <format>").unwrap();
        writeln!(out, "      <rpm:license>MIT</rpm:license>").unwrap();
        let mut provides = vec![format!(
            "{} = {}:{}-{}",
            pkg.name, pkg.epoch, pkg.version, pkg.release
        )];
        provides.extend(pkg.provides.iter().cloned());
        section(&mut out, "provides", &provides);
        section(&mut out, "requires", &pkg.requires);
        section(&mut out, "recommends", &pkg.recommends);
        section(&mut out, "conflicts", &pkg.conflicts);
        section(&mut out, "obsoletes", &pkg.obsoletes);
        for file in &pkg.files {
            writeln!(out, "      <file>{}</file>", escape(file)).unwrap();
        }
        writeln!(out, "    </format>").unwrap();
        writeln!(out, "  </package>").unwrap();
    }
    writeln!(out, "</metadata>").unwrap();
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Write an rpm-md repository into `dir` and return its `file://` URL
pub fn write_repo(dir: &Path, packages: &[Pkg]) -> String {
    write_repo_revision(dir, packages, "1")
}

/// Like [`write_repo`] with an explicit `<revision>`
pub fn write_repo_revision(dir: &Path, packages: &[Pkg], revision: &str) -> String {
    let repodata = dir.join("repodata");
    fs::create_dir_all(&repodata).unwrap();

    let primary = gzip(primary_xml(packages).as_bytes());
    let primary_sha = sha256(&primary);
    let primary_href = format!("repodata/{primary_sha}-primary.xml.gz");
    fs::write(dir.join(&primary_href), &primary).unwrap();

    let repomd = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>{revision}</revision>
  <data type="primary">
    <checksum type="sha256">{primary_sha}</checksum>
    <location href="{primary_href}"/>
    <timestamp>1700000000</timestamp>
    <size>{size}</size>
  </data>
</repomd>
"#,
        size = primary.len()
    );
    fs::write(repodata.join("repomd.xml"), repomd).unwrap();

    file_url(dir)
}

/// Write a metalink next to a repository, pointing at `repo_url`
pub fn write_metalink(path: &Path, repo_url: &str, repomd: &[u8]) -> String {
    let metalink = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<metalink version="3.0" xmlns="http://www.metalinker.org/" xmlns:mm0="http://fedorahosted.org/mirrormanager">
 <files>
  <file name="repomd.xml">
   <verification>
    <hash type="sha256">{}</hash>
   </verification>
   <resources maxconnections="1">
    <url protocol="file" type="file" location="US" preference="100">{}/repodata/repomd.xml</url>
   </resources>
  </file>
 </files>
</metalink>
"#,
        sha256(repomd),
        repo_url
    );
    fs::write(path, metalink).unwrap();
    file_url(path)
}

/// Write a plain-text mirrorlist listing `mirrors` in order
pub fn write_mirrorlist(path: &Path, mirrors: &[&str]) -> String {
    let mut body = String::from("# repo = test arch = x86_64 country = US\n");
    for mirror in mirrors {
        writeln!(body, "{mirror}/repodata/repomd.xml").unwrap();
    }
    fs::write(path, body).unwrap();
    file_url(path)
}

pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path)
        .unwrap()
        .as_str()
        .trim_end_matches('/')
        .to_string()
}

/// A request with one `baseurl` repository per `(id, url)` pair
pub fn request(
    command: &str,
    repos: &[(&str, &str)],
    cachedir: &Path,
    specs: Option<&[&str]>,
    excludes: &[&str],
) -> Request {
    let repos: Vec<serde_json::Value> = repos
        .iter()
        .map(|(id, url)| serde_json::json!({"id": id, "baseurl": [url]}))
        .collect();
    let mut arguments = serde_json::json!({
        "repos": repos,
        "cachedir": cachedir,
        "module_platform_id": "platform:f40",
        "exclude-specs": excludes,
    });
    if let Some(specs) = specs {
        arguments["package-specs"] = serde_json::json!(specs);
    }
    request_from_json(serde_json::json!({"command": command, "arguments": arguments}))
}

pub fn request_from_json(value: serde_json::Value) -> Request {
    Request::from_slice(value.to_string().as_bytes()).unwrap()
}

pub fn options() -> Options {
    Options {
        arch: Some("x86_64".to_string()),
        ..Options::default()
    }
}

/// Run a request against `file://` repositories
pub fn run(request: &Request) -> depsolve::Result<Response> {
    run_with(request, &options())
}

pub fn run_with(request: &Request, options: &Options) -> depsolve::Result<Response> {
    let transport = RepositoryClient::new()?;
    dispatch::handle(request, options, &transport)
}

/// `name-[epoch:]version-release.arch` of every depsolve result entry
pub fn resolved(response: &Response) -> Vec<String> {
    match response {
        Response::Depsolve { dependencies, .. } => dependencies
            .iter()
            .map(|d| {
                let epoch = if d.epoch > 0 {
                    format!("{}:", d.epoch)
                } else {
                    String::new()
                };
                format!("{}-{}{}-{}.{}", d.name, epoch, d.version, d.release, d.arch)
            })
            .collect(),
        other => panic!("expected a depsolve response, got {other:?}"),
    }
}
