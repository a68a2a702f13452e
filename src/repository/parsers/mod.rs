// src/repository/parsers/mod.rs

//! Repository metadata parsers
//!
//! This module provides parsers for rpm-md repository metadata:
//! - repomd.xml: index of the metadata files and their checksums
//! - primary.xml: package records with dependency information
//!
//! Both are XML documents read with quick-xml's pull parser.

pub mod primary;
pub mod repomd;

pub use primary::PrimaryParser;
pub use repomd::{RepoMd, RepoMdRecord};

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use quick_xml::events::BytesStart;
use std::io::Read;
use tracing::debug;
use xz2::read::XzDecoder;

/// Decompress a metadata file, picking the codec from its file name
pub fn decompress(data: &[u8], location: &str) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();

    if location.ends_with(".gz") {
        debug!("Decompressing gzip-compressed {}", location);
        MultiGzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
    } else if location.ends_with(".zst") {
        debug!("Decompressing zstd-compressed {}", location);
        decompressed = zstd::decode_all(data)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
    } else if location.ends_with(".xz") {
        debug!("Decompressing xz-compressed {}", location);
        XzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
    } else if location.ends_with(".xml") {
        decompressed.extend_from_slice(data);
    } else {
        return Err(Error::ParseError(format!(
            "Unsupported compression for {}",
            location
        )));
    }

    debug!("Decompressed {}: {} bytes", location, decompressed.len());
    Ok(decompressed)
}

/// Read an attribute by its qualified name (e.g. `href`, `xml:base`)
pub(crate) fn attribute(element: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::ParseError(format!("Invalid XML attribute: {}", e)))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::ParseError(format!("Invalid XML attribute value: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Validate a metadata-relative path and return it unchanged
///
/// Locations come from remote metadata and are joined onto the cache
/// directory, so they must stay inside it.
pub fn relative_location(location: &str) -> Result<&str> {
    let escapes = location.starts_with('/')
        || location.contains('\\')
        || location.split('/').any(|part| part == "..");
    if location.is_empty() || escapes {
        return Err(Error::ParseError(format!(
            "Refusing unsafe metadata location '{}'",
            location
        )));
    }
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decompress_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<metadata/>").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress(&compressed, "repodata/abc-primary.xml.gz").unwrap();
        assert_eq!(out, b"<metadata/>");
    }

    #[test]
    fn test_decompress_zstd() {
        let compressed = zstd::encode_all(&b"<metadata/>"[..], 3).unwrap();
        let out = decompress(&compressed, "repodata/abc-primary.xml.zst").unwrap();
        assert_eq!(out, b"<metadata/>");
    }

    #[test]
    fn test_decompress_plain_and_unknown() {
        assert_eq!(decompress(b"<a/>", "primary.xml").unwrap(), b"<a/>");
        assert!(decompress(b"", "primary.xml.lz4").is_err());
    }

    #[test]
    fn test_relative_location() {
        assert!(relative_location("repodata/primary.xml.gz").is_ok());
        assert!(relative_location("Packages/f/foo-1.0-1.noarch.rpm").is_ok());
        assert!(relative_location("/etc/passwd").is_err());
        assert!(relative_location("repodata/../../etc/passwd").is_err());
        assert!(relative_location("").is_err());
    }
}
