//! Remote archive locator
//!
//! Only archives inside a `*-backups` bucket, ending in `.tar.gz`, are accepted.
//! Two spellings are recognised:
//!
//! ```text
//! s3://acme-backups/2026/10/tenant.tar.gz
//! https://acme-backups.s3.eu-west-1.amazonaws.com/2026/10/tenant.tar.gz
//! ```

use std::fmt;

use regex::Regex;

use super::errors::{ArchiveError, ArchiveResult};

const BUCKET: &str = r"(?P<bucket>[a-z0-9][a-z0-9.-]{0,53}-backups)";
const KEY: &str = r"(?P<key>(?:[A-Za-z0-9_.:=-]+/)*[A-Za-z0-9_.:=-]+\.tar\.gz)";

/// A validated pointer to a backup archive in the archive store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocator {
    pub bucket: String,
    pub key: String,
    pub region: Option<String>,
}

impl ArchiveLocator {
    /// Parse and validate an archive URL
    pub fn parse(url: &str) -> ArchiveResult<Self> {
        let s3 = compile(&format!("^s3://{}/{}$", BUCKET, KEY))?;
        let https = compile(&format!(
            r"^https://{}\.s3(?:[.-](?P<region>[a-z0-9-]+))?\.amazonaws\.com/{}$",
            BUCKET, KEY
        ))?;

        let captures = s3
            .captures(url)
            .or_else(|| https.captures(url))
            .ok_or_else(|| {
                ArchiveError::invalid_locator(format!(
                    "'{}' is not a .tar.gz object in a *-backups bucket",
                    url
                ))
            })?;

        let key = &captures["key"];
        if key.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(ArchiveError::invalid_locator(format!(
                "'{}' contains a relative path segment",
                url
            )));
        }

        Ok(Self {
            bucket: captures["bucket"].to_string(),
            key: key.to_string(),
            region: captures.name("region").map(|m| m.as_str().to_string()),
        })
    }

    /// Final path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ArchiveLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

fn compile(pattern: &str) -> ArchiveResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| ArchiveError::invalid_locator(format!("bad locator pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::errors::ArchiveErrorCode;

    #[test]
    fn test_parse_s3_url() {
        let locator = ArchiveLocator::parse("s3://acme-backups/2026/10/dump.tar.gz").unwrap();
        assert_eq!(locator.bucket, "acme-backups");
        assert_eq!(locator.key, "2026/10/dump.tar.gz");
        assert_eq!(locator.region, None);
        assert_eq!(locator.file_name(), "dump.tar.gz");
    }

    #[test]
    fn test_parse_https_url_with_region() {
        let locator = ArchiveLocator::parse(
            "https://acme-backups.s3.eu-west-1.amazonaws.com/tenant/dump.tar.gz",
        )
        .unwrap();
        assert_eq!(locator.bucket, "acme-backups");
        assert_eq!(locator.key, "tenant/dump.tar.gz");
        assert_eq!(locator.region.as_deref(), Some("eu-west-1"));
        assert_eq!(locator.to_string(), "s3://acme-backups/tenant/dump.tar.gz");
    }

    #[test]
    fn test_rejects_malformed_urls() {
        let bad = [
            "s3://acme-assets/dump.tar.gz",
            "s3://acme-backups/dump.zip",
            "s3://acme-backups/../dump.tar.gz",
            "http://acme-backups.s3.amazonaws.com/dump.tar.gz",
            "s3://acme-backups/dump.tar.gz?x=1",
            "",
        ];
        for url in bad {
            let err = ArchiveLocator::parse(url).unwrap_err();
            assert_eq!(err.code(), ArchiveErrorCode::InvalidLocator, "{}", url);
        }
    }
}
