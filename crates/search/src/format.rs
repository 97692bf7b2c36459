//! Output format negotiation.
//!
//! A format name decides three things about a request: the URL extension,
//! the `Accept` header and how response bodies are turned into items.

use std::{fmt, str::FromStr};

use cmr_types::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::QueryError;

static UMM_JSON_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^umm_json_v(\d+)_(\d+)$").expect("umm_json version regex should compile"));

/// A response representation supported by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
    Echo10,
    Iso,
    Iso19115,
    Csv,
    Atom,
    Kml,
    Native,
    Dif,
    Dif10,
    OpenData,
    UmmJson {
        version: Option<(u32, u32)>,
    },
}

/// How a response body becomes search items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// JSON envelope; records live at the given path.
    JsonRecords(&'static [&'static str]),
    /// Opaque body passed through as one page.
    RawPage,
}

impl OutputFormat {
    /// Parse a format name; an empty name means JSON.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let format = match normalized.as_str() {
            "" | "json" => Self::Json,
            "xml" => Self::Xml,
            "echo10" => Self::Echo10,
            "iso" => Self::Iso,
            "iso19115" => Self::Iso19115,
            "csv" => Self::Csv,
            "atom" => Self::Atom,
            "kml" => Self::Kml,
            "native" => Self::Native,
            "dif" => Self::Dif,
            "dif10" => Self::Dif10,
            "opendata" => Self::OpenData,
            "umm_json" => Self::UmmJson { version: None },
            other => {
                let captures = UMM_JSON_VERSION.captures(other)?;
                let major = captures.get(1)?.as_str().parse().ok()?;
                let minor = captures.get(2)?.as_str().parse().ok()?;
                Self::UmmJson {
                    version: Some((major, minor)),
                }
            }
        };
        Some(format)
    }

    /// Resolve a format name for an entity, failing before any request is built.
    pub fn negotiate(name: &str, entity: EntityKind) -> Result<Self, QueryError> {
        Self::parse(name)
            .filter(|format| format.is_supported_by(entity))
            .ok_or_else(|| QueryError::unsupported_format(name, entity))
    }

    pub fn is_supported_by(&self, entity: EntityKind) -> bool {
        match self {
            Self::Json
            | Self::Xml
            | Self::Echo10
            | Self::Iso
            | Self::Iso19115
            | Self::Csv
            | Self::Atom
            | Self::Kml
            | Self::Native => true,
            Self::UmmJson { version: None } => true,
            Self::Dif | Self::Dif10 | Self::OpenData | Self::UmmJson { version: Some(_) } => {
                entity != EntityKind::Granule
            }
        }
    }

    /// URL extension, e.g. `json` in `granules.json`.
    pub fn extension(&self) -> String {
        match self {
            Self::UmmJson { version: Some((major, minor)) } => format!("umm_json_v{major}_{minor}"),
            other => other.base_name().to_string(),
        }
    }

    fn base_name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Echo10 => "echo10",
            Self::Iso => "iso",
            Self::Iso19115 => "iso19115",
            Self::Csv => "csv",
            Self::Atom => "atom",
            Self::Kml => "kml",
            Self::Native => "native",
            Self::Dif => "dif",
            Self::Dif10 => "dif10",
            Self::OpenData => "opendata",
            Self::UmmJson { .. } => "umm_json",
        }
    }

    /// Value for the `Accept` header.
    pub fn accept(&self) -> String {
        match self {
            Self::Json => "application/json".into(),
            Self::Xml => "application/xml".into(),
            Self::Echo10 => "application/echo10+xml".into(),
            Self::Iso | Self::Iso19115 => "application/iso19115+xml".into(),
            Self::Csv => "text/csv".into(),
            Self::Atom => "application/atom+xml".into(),
            Self::Kml => "application/vnd.google-earth.kml+xml".into(),
            Self::Native => "application/metadata+xml".into(),
            Self::Dif => "application/dif+xml".into(),
            Self::Dif10 => "application/dif10+xml".into(),
            Self::OpenData => "application/opendata+json".into(),
            Self::UmmJson { version: None } => "application/vnd.nasa.cmr.umm_results+json".into(),
            Self::UmmJson {
                version: Some((major, minor)),
            } => format!("application/vnd.nasa.cmr.umm_results+json; version={major}.{minor}"),
        }
    }

    pub fn parse_strategy(&self, entity: EntityKind) -> ParseStrategy {
        match self {
            Self::Json => ParseStrategy::JsonRecords(json_record_path(entity)),
            _ => ParseStrategy::RawPage,
        }
    }
}

/// Where the JSON envelope keeps its records.
fn json_record_path(entity: EntityKind) -> &'static [&'static str] {
    match entity {
        EntityKind::Granule | EntityKind::Collection => &["feed", "entry"],
        EntityKind::Tool | EntityKind::Service | EntityKind::Variable => &["items"],
    }
}

/// Pull the record list out of a JSON body.
///
/// A missing list is only acceptable when the server reported no hits.
pub fn extract_records(body: &str, path: &[&str], reported_hits: u64) -> Result<Vec<Value>, QueryError> {
    let document: Value =
        serde_json::from_str(body).map_err(|error| QueryError::malformed(format!("response is not JSON: {error}")))?;
    let mut cursor = &document;
    for segment in path {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None if reported_hits == 0 => return Ok(Vec::new()),
            None => {
                return Err(QueryError::malformed(format!(
                    "missing '{}' in response envelope",
                    path.join(".")
                )));
            }
        }
    }
    match cursor {
        Value::Array(items) => Ok(items.clone()),
        Value::Null if reported_hits == 0 => Ok(Vec::new()),
        _ => Err(QueryError::malformed(format!("'{}' is not a list", path.join(".")))),
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown output format '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_means_json() {
        assert_eq!(OutputFormat::negotiate("", EntityKind::Granule).ok(), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::Json.extension(), "json");
    }

    #[test]
    fn granules_reject_collection_only_formats() {
        for name in ["dif", "dif10", "opendata", "umm_json_v1_17"] {
            assert!(matches!(
                OutputFormat::negotiate(name, EntityKind::Granule),
                Err(QueryError::UnsupportedFormat { .. })
            ));
            assert!(OutputFormat::negotiate(name, EntityKind::Collection).is_ok(), "{name}");
        }
        assert!(OutputFormat::negotiate("umm_json", EntityKind::Granule).is_ok());
        assert!(OutputFormat::negotiate("yaml", EntityKind::Tool).is_err());
    }

    #[test]
    fn versioned_umm_json_keeps_its_version() {
        let format = OutputFormat::negotiate("umm_json_v1_17", EntityKind::Collection).expect("format");
        assert_eq!(format.extension(), "umm_json_v1_17");
        assert!(format.accept().ends_with("version=1.17"));
        assert_eq!(format.parse_strategy(EntityKind::Collection), ParseStrategy::RawPage);
    }

    #[test]
    fn json_records_come_from_entity_envelopes() {
        assert_eq!(
            OutputFormat::Json.parse_strategy(EntityKind::Granule),
            ParseStrategy::JsonRecords(&["feed", "entry"])
        );
        let records = extract_records(r#"{"items":[{"name":"a"},{"name":"b"}]}"#, &["items"], 2).expect("records");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_envelope_is_malformed_unless_empty() {
        assert!(extract_records(r#"{"feed":{}}"#, &["feed", "entry"], 0).is_ok_and(|records| records.is_empty()));
        assert!(matches!(
            extract_records(r#"{"feed":{}}"#, &["feed", "entry"], 3),
            Err(QueryError::MalformedResponse { .. })
        ));
        assert!(matches!(
            extract_records("<feed/>", &["feed", "entry"], 0),
            Err(QueryError::MalformedResponse { .. })
        ));
    }
}
