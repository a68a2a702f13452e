// src/repository/mirrors.rs

//! Metalink and mirrorlist documents
//!
//! Both resolve to an ordered list of mirror base URLs. A metalink also
//! carries the expected hashes of `repomd.xml`, which are checked before
//! any downloaded copy is trusted.

use super::parsers::attribute;
use crate::checksum::Checksum;
use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

const REPOMD_SUFFIX: &str = "repodata/repomd.xml";

/// Mirrors resolved from a metalink or mirrorlist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorSet {
    /// Repository base URLs, most preferred first
    pub mirrors: Vec<String>,
    /// Expected `repomd.xml` hashes (metalink only)
    pub repomd_hashes: Vec<Checksum>,
}

impl MirrorSet {
    /// Check `repomd.xml` content against the advertised hashes
    ///
    /// Passes when no usable hash is advertised, and when any one matches.
    pub fn verify_repomd(&self, data: &[u8]) -> Result<()> {
        let mut last_err = None;
        for hash in &self.repomd_hashes {
            match hash.verify(data) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Parse a metalink document
pub fn parse_metalink(xml: &[u8]) -> Result<MirrorSet> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_repomd = false;
    let mut hash_type: Option<String> = None;
    let mut url_preference = 100u32;
    let mut url_protocol: Option<String> = None;
    let mut ranked: Vec<(u32, String)> = Vec::new();
    let mut hashes = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                text.clear();
                match e.local_name().as_ref() {
                    b"file" => {
                        in_repomd = attribute(&e, b"name")?.as_deref() == Some("repomd.xml");
                    }
                    b"hash" => hash_type = attribute(&e, b"type")?,
                    b"url" => {
                        url_preference = attribute(&e, b"preference")?
                            .and_then(|p| p.parse().ok())
                            .unwrap_or(100);
                        url_protocol = attribute(&e, b"protocol")?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| Error::ParseError(format!("Invalid text in metalink: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"file" => in_repomd = false,
                    b"hash" if in_repomd => {
                        let algo = hash_type.take().unwrap_or_default();
                        if matches!(algo.as_str(), "sha256" | "sha512") {
                            hashes.push(Checksum::new(&algo, &text));
                        }
                    }
                    b"url" if in_repomd => {
                        let url = text.trim().to_string();
                        let protocol = url_protocol
                            .take()
                            .unwrap_or_else(|| url.split(':').next().unwrap_or_default().to_string());
                        if matches!(protocol.as_str(), "http" | "https" | "file") {
                            ranked.push((url_preference, mirror_base(&url)));
                        } else {
                            debug!("Skipping {} mirror {}", protocol, url);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::ParseError(format!("Failed to parse metalink: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    // Stable: equal preferences keep document order
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(MirrorSet {
        mirrors: ranked.into_iter().map(|(_, url)| url).collect(),
        repomd_hashes: hashes,
    })
}

/// Parse a mirrorlist: one base URL per line, `#` comments
///
/// Some servers answer mirrorlist requests with a metalink document; that
/// is detected and parsed as such.
pub fn parse_mirrorlist(body: &[u8]) -> Result<MirrorSet> {
    let content = String::from_utf8_lossy(body);
    if content.trim_start().starts_with('<') {
        return parse_metalink(body);
    }

    let mirrors = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(mirror_base)
        .collect();

    Ok(MirrorSet {
        mirrors,
        repomd_hashes: Vec::new(),
    })
}

/// Strip a trailing `repodata/repomd.xml` to get the repository base
fn mirror_base(url: &str) -> String {
    url.strip_suffix(REPOMD_SUFFIX)
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}
