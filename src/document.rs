//! Document header and end-of-document metadata shared by both codecs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FnfError, Result};

/// Textual date-time grammar: `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub const DEFAULT_NAMESPACE: &str = "http://www.ipdr.org/namespaces/ipdr";

/// Format a timestamp with millisecond precision
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a timestamp; the fraction and trailing `Z` are optional
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();
    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| Utc.from_utc_datetime(&t))
        .map_err(|_| FnfError::InvalidTimestamp(text.to_string()))
}

/// Milliseconds since the epoch, as carried by the binary codec
pub fn to_millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| FnfError::InvalidTimestamp(millis.to_string()))
}

/// Truncate to millisecond precision, the resolution both codecs preserve
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    from_millis(to_millis(&now)).unwrap_or(now)
}

/// Document format version, `major.minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocVersion {
    pub major: u32,
    pub minor: u32,
}

impl DocVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DocVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for DocVersion {
    type Err = FnfError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FnfError::InvalidValue {
            expected: "version".to_string(),
            text: s.to_string(),
        };
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Secondary namespace declared on the document root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// Schema location, paired with its namespace or bare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaLocation {
    pub namespace: Option<String>,
    pub uri: String,
}

/// Document-level metadata written before the first record
#[derive(Debug, Clone, PartialEq)]
pub struct DocHeader {
    pub version: DocVersion,
    pub doc_id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub recorder_info: String,
    pub default_namespace: String,
    pub other_namespaces: Vec<Namespace>,
    pub schema_locations: Vec<SchemaLocation>,
}

impl DocHeader {
    /// A fresh header with a random document id, created now
    pub fn new(version: DocVersion, recorder_info: impl Into<String>) -> Self {
        Self {
            version,
            doc_id: Uuid::new_v4(),
            creation_time: now_millis(),
            recorder_info: recorder_info.into(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            other_namespaces: Vec::new(),
            schema_locations: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.other_namespaces.push(Namespace {
            prefix: prefix.into(),
            uri: uri.into(),
        });
        self
    }

    pub fn with_schema_location(mut self, namespace: Option<String>, uri: impl Into<String>) -> Self {
        self.schema_locations.push(SchemaLocation {
            namespace,
            uri: uri.into(),
        });
        self
    }
}

/// End-of-document metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocEnd {
    pub count: u64,
    pub end_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_format() {
        let t = from_millis(1_700_000_000_123).unwrap();
        let text = format_time(&t);
        assert_eq!(text, "2023-11-14T22:13:20.123Z");
        assert_eq!(parse_time(&text).unwrap(), t);
    }

    #[test]
    fn test_parse_time_without_fraction() {
        let t = parse_time("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(to_millis(&t), 1_700_000_000_000);
        assert!(matches!(parse_time("yesterday"), Err(FnfError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_version_parse() {
        let v: DocVersion = "3.5".parse().unwrap();
        assert_eq!(v, DocVersion::new(3, 5));
        assert_eq!(v.to_string(), "3.5");
        assert!("3".parse::<DocVersion>().is_err());
    }
}
