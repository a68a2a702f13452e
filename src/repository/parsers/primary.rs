// src/repository/parsers/primary.rs

//! primary.xml parser
//!
//! Turns the `<package type="rpm">` records of an rpm-md primary index
//! into [`Package`] values, including the `rpm:` dependency sections and
//! the file entries that primary carries.

use super::{attribute, relative_location};
use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::packages::{Capability, Dependency, Package};
use crate::version::{Comparison, RpmVersion};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// Dependency section currently being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Provides,
    Requires,
    Recommends,
    Conflicts,
    Obsoletes,
    /// Suggests, supplements, enhances: parsed past, not used
    Ignored,
}

impl Section {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"provides" => Some(Section::Provides),
            b"requires" => Some(Section::Requires),
            b"recommends" => Some(Section::Recommends),
            b"conflicts" => Some(Section::Conflicts),
            b"obsoletes" => Some(Section::Obsoletes),
            b"suggests" | b"supplements" | b"enhances" => Some(Section::Ignored),
            _ => None,
        }
    }
}

/// Parser for one repository's primary index
pub struct PrimaryParser<'a> {
    repo_id: &'a str,
    /// Base URL used for `remote_location` when a package has no `xml:base`
    base_url: &'a str,
}

impl<'a> PrimaryParser<'a> {
    pub fn new(repo_id: &'a str, base_url: &'a str) -> Self {
        Self { repo_id, base_url }
    }

    /// Parse decompressed primary.xml content
    pub fn parse(&self, xml: &[u8]) -> Result<Vec<Package>> {
        // Text is kept as written; free-form fields keep their whitespace
        let mut reader = Reader::from_reader(xml);

        let mut packages = Vec::new();
        let mut buf = Vec::new();
        let mut text = String::new();
        let mut current: Option<PackageBuilder> = None;
        let mut section: Option<Section> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    text.clear();
                    if e.local_name().as_ref() == b"package" {
                        current = Some(PackageBuilder::default());
                    } else if let Some(pkg) = current.as_mut() {
                        if let Some(s) = Section::from_tag(e.local_name().as_ref()) {
                            section = Some(s);
                        } else {
                            pkg.start_element(&e, section)?;
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    if let Some(pkg) = current.as_mut() {
                        pkg.start_element(&e, section)?;
                    }
                }
                Ok(Event::Text(e)) => {
                    let unescaped = e.unescape().map_err(|e| {
                        Error::ParseError(format!("Invalid text in primary.xml: {}", e))
                    })?;
                    text.push_str(&unescaped);
                }
                Ok(Event::CData(e)) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::End(e)) => {
                    let tag = e.local_name();
                    if tag.as_ref() == b"package" {
                        if let Some(builder) = current.take() {
                            packages.push(builder.build(self.repo_id, self.base_url)?);
                        }
                    } else if Section::from_tag(tag.as_ref()).is_some() {
                        section = None;
                    } else if let Some(pkg) = current.as_mut() {
                        pkg.end_element(tag.as_ref(), std::mem::take(&mut text));
                    }
                    text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::ParseError(format!(
                        "Failed to parse primary.xml at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        debug!(
            "Parsed {} packages from primary.xml of {}",
            packages.len(),
            self.repo_id
        );
        Ok(packages)
    }
}

/// Accumulates one `<package>` record
#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    epoch: Option<String>,
    ver: Option<String>,
    rel: Option<String>,
    arch: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    license: Option<String>,
    sourcerpm: Option<String>,
    buildtime: Option<i64>,
    checksum: Option<String>,
    checksum_type: Option<String>,
    location: Option<String>,
    location_base: Option<String>,
    provides: Vec<Capability>,
    requires: Vec<Dependency>,
    recommends: Vec<Dependency>,
    conflicts: Vec<Capability>,
    obsoletes: Vec<Capability>,
    files: Vec<String>,
}

impl PackageBuilder {
    /// Handle attributes of a start or empty element inside `<package>`
    fn start_element(&mut self, e: &BytesStart, section: Option<Section>) -> Result<()> {
        match (e.local_name().as_ref(), section) {
            (b"entry", Some(section)) => self.add_entry(e, section)?,
            (b"version", None) => {
                self.epoch = attribute(e, b"epoch")?;
                self.ver = attribute(e, b"ver")?;
                self.rel = attribute(e, b"rel")?;
            }
            (b"checksum", None) => self.checksum_type = attribute(e, b"type")?,
            (b"time", None) => {
                self.buildtime = attribute(e, b"build")?.and_then(|t| t.parse().ok());
            }
            (b"location", None) => {
                self.location = attribute(e, b"href")?;
                self.location_base = attribute(e, b"xml:base")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle the text content of a closing element inside `<package>`
    fn end_element(&mut self, tag: &[u8], text: String) {
        match tag {
            b"summary" => self.summary = Some(text),
            b"description" => self.description = Some(text),
            _ => self.end_identifier(tag, text.trim().to_string()),
        }
    }

    fn end_identifier(&mut self, tag: &[u8], text: String) {
        match tag {
            b"name" => self.name = Some(text),
            b"arch" => self.arch = Some(text),
            b"url" if !text.is_empty() => self.url = Some(text),
            b"checksum" => self.checksum = Some(text),
            b"license" => self.license = Some(text),
            b"sourcerpm" if !text.is_empty() => self.sourcerpm = Some(text),
            b"file" if !text.is_empty() => self.files.push(text),
            _ => {}
        }
    }

    fn add_entry(&mut self, e: &BytesStart, section: Section) -> Result<()> {
        let Some(name) = attribute(e, b"name")? else {
            return Ok(());
        };

        if name.starts_with('(') {
            let dep = match Dependency::parse_rich(&name) {
                Ok(dep) => dep,
                Err(err) => {
                    warn!("Skipping unparsable dependency '{}': {}", name, err);
                    return Ok(());
                }
            };
            match section {
                Section::Requires => self.requires.push(dep),
                Section::Recommends => self.recommends.push(dep),
                _ => debug!("Ignoring boolean expression '{}' outside requires", name),
            }
            return Ok(());
        }

        let op = attribute(e, b"flags")?.and_then(|f| Comparison::from_flags(&f));
        let cap = match (op, attribute(e, b"ver")?) {
            (Some(op), Some(ver)) => {
                let epoch = attribute(e, b"epoch")?
                    .map(|ep| {
                        ep.parse::<u64>().map_err(|_| {
                            Error::ParseError(format!("Invalid epoch '{}' for {}", ep, name))
                        })
                    })
                    .transpose()?
                    .unwrap_or(0);
                let rel = attribute(e, b"rel")?.filter(|r| !r.is_empty());
                Capability::versioned(name, op, RpmVersion::new(epoch, ver, rel))
            }
            _ => Capability::unversioned(name),
        };

        match section {
            Section::Provides => self.provides.push(cap),
            Section::Requires => self.requires.push(cap.into()),
            Section::Recommends => self.recommends.push(cap.into()),
            Section::Conflicts => self.conflicts.push(cap),
            Section::Obsoletes => self.obsoletes.push(cap),
            Section::Ignored => {}
        }
        Ok(())
    }

    fn build(self, repo_id: &str, base_url: &str) -> Result<Package> {
        let name = self
            .name
            .ok_or_else(|| Error::ParseError("Missing package name".to_string()))?;
        let missing = |field: &str| Error::ParseError(format!("Missing {} for package {}", field, name));

        let ver = self.ver.ok_or_else(|| missing("version"))?;
        let epoch = match self.epoch.as_deref() {
            None | Some("") => 0,
            Some(epoch) => epoch
                .parse()
                .map_err(|_| Error::ParseError(format!("Invalid epoch '{}' for {}", epoch, name)))?,
        };
        let evr = RpmVersion::new(epoch, ver, self.rel.filter(|r| !r.is_empty()));

        let arch = self.arch.ok_or_else(|| missing("arch"))?;
        let checksum = self.checksum.ok_or_else(|| missing("checksum"))?;
        let checksum = Checksum::new(self.checksum_type.as_deref().unwrap_or("sha256"), &checksum);

        let location = self.location.ok_or_else(|| missing("location"))?;
        let location = relative_location(&location)?.to_string();
        let base = self.location_base.as_deref().unwrap_or(base_url);
        let remote_location = format!("{}/{}", base.trim_end_matches('/'), location);

        Ok(Package {
            name,
            evr,
            arch,
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            url: self.url,
            license: self.license.unwrap_or_default(),
            sourcerpm: self.sourcerpm,
            buildtime: self.buildtime.unwrap_or(0),
            repo_id: repo_id.to_string(),
            location,
            remote_location,
            checksum,
            provides: self.provides,
            requires: self.requires,
            recommends: self.recommends,
            conflicts: self.conflicts,
            obsoletes: self.obsoletes,
            files: self.files,
        })
    }
}
