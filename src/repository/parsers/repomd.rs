// src/repository/parsers/repomd.rs

//! repomd.xml parser
//!
//! repomd.xml is the entry point of an rpm-md repository: it lists every
//! metadata file (primary, filelists, other, ...) with its location and
//! checksum.

use super::{attribute, relative_location};
use crate::checksum::Checksum;
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One `<data>` entry of repomd.xml
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMdRecord {
    pub data_type: String,
    pub location: String,
    /// Checksum of the file as stored (compressed)
    pub checksum: Option<Checksum>,
    /// Checksum of the decompressed content
    pub open_checksum: Option<Checksum>,
    pub timestamp: Option<i64>,
    pub size: Option<u64>,
}

/// Parsed repomd.xml
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMd {
    pub revision: Option<String>,
    pub records: Vec<RepoMdRecord>,
}

impl RepoMd {
    /// Parse repomd.xml content
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut repomd = RepoMd::default();
        let mut buf = Vec::new();
        let mut text = String::new();
        let mut current: Option<RepoMdRecord> = None;
        let mut checksum_type: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    text.clear();
                    match e.local_name().as_ref() {
                        b"data" => {
                            current = Some(RepoMdRecord {
                                data_type: attribute(&e, b"type")?.unwrap_or_default(),
                                ..RepoMdRecord::default()
                            });
                        }
                        b"checksum" | b"open-checksum" => {
                            checksum_type = attribute(&e, b"type")?;
                        }
                        b"location" => Self::read_location(&e, current.as_mut())?,
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() == b"location" {
                        Self::read_location(&e, current.as_mut())?;
                    }
                }
                Ok(Event::Text(e)) => {
                    let unescaped = e
                        .unescape()
                        .map_err(|e| Error::ParseError(format!("Invalid text in repomd.xml: {}", e)))?;
                    text.push_str(&unescaped);
                }
                Ok(Event::End(e)) => {
                    match (e.local_name().as_ref(), current.as_mut()) {
                        (b"data", _) => {
                            if let Some(record) = current.take() {
                                repomd.records.push(record);
                            }
                        }
                        (b"checksum", Some(record)) => {
                            let algo = checksum_type.take().unwrap_or_else(|| "sha256".to_string());
                            record.checksum = Some(Checksum::new(&algo, &text));
                        }
                        (b"open-checksum", Some(record)) => {
                            let algo = checksum_type.take().unwrap_or_else(|| "sha256".to_string());
                            record.open_checksum = Some(Checksum::new(&algo, &text));
                        }
                        (b"timestamp", Some(record)) => record.timestamp = text.trim().parse().ok(),
                        (b"size", Some(record)) => record.size = text.trim().parse().ok(),
                        (b"revision", None) => repomd.revision = Some(text.trim().to_string()),
                        _ => {}
                    }
                    text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::ParseError(format!(
                        "Failed to parse repomd.xml: {}",
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if repomd.records.is_empty() {
            return Err(Error::ParseError(
                "repomd.xml lists no metadata files".to_string(),
            ));
        }

        Ok(repomd)
    }

    fn read_location(element: &BytesStart, record: Option<&mut RepoMdRecord>) -> Result<()> {
        if let (Some(record), Some(href)) = (record, attribute(element, b"href")?) {
            record.location = relative_location(&href)?.to_string();
        }
        Ok(())
    }

    /// Find a metadata record by type
    pub fn record(&self, data_type: &str) -> Option<&RepoMdRecord> {
        self.records.iter().find(|r| r.data_type == data_type)
    }

    /// The primary package index record
    pub fn primary(&self) -> Result<&RepoMdRecord> {
        self.record("primary")
            .filter(|r| !r.location.is_empty())
            .ok_or_else(|| {
                Error::ParseError("Could not find primary data location in repomd.xml".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1712345678</revision>
  <data type="primary">
    <checksum type="sha256">AABBCC</checksum>
    <open-checksum type="sha256">ddeeff</open-checksum>
    <location href="repodata/aabbcc-primary.xml.gz"/>
    <timestamp>1712345600</timestamp>
    <size>1234</size>
  </data>
  <data type="filelists">
    <checksum type="sha">112233</checksum>
    <location href="repodata/112233-filelists.xml.gz"/>
  </data>
</repomd>"#;

    #[test]
    fn test_parse_repomd() {
        let repomd = RepoMd::parse(REPOMD.as_bytes()).unwrap();
        assert_eq!(repomd.revision.as_deref(), Some("1712345678"));
        assert_eq!(repomd.records.len(), 2);

        let primary = repomd.primary().unwrap();
        assert_eq!(primary.location, "repodata/aabbcc-primary.xml.gz");
        assert_eq!(primary.checksum.as_ref().unwrap().to_string(), "sha256:aabbcc");
        assert_eq!(primary.open_checksum.as_ref().unwrap().value, "ddeeff");
        assert_eq!(primary.timestamp, Some(1712345600));
        assert_eq!(primary.size, Some(1234));

        let filelists = repomd.record("filelists").unwrap();
        assert_eq!(filelists.checksum.as_ref().unwrap().algorithm, "sha1");
    }

    #[test]
    fn test_missing_primary() {
        let xml = r#"<repomd><data type="other"><location href="repodata/o.xml.gz"/></data></repomd>"#;
        let repomd = RepoMd::parse(xml.as_bytes()).unwrap();
        assert!(repomd.primary().is_err());
    }

    #[test]
    fn test_rejects_unsafe_location() {
        let xml = r#"<repomd><data type="primary"><location href="../../etc/shadow"/></data></repomd>"#;
        assert!(RepoMd::parse(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(RepoMd::parse(b"not xml at all").is_err());
        assert!(RepoMd::parse(b"<repomd><data type=\"primary\"></repomd>").is_err());
    }
}
