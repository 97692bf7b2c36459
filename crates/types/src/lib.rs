//! Shared CMR search type definitions.
//!
//! These are plain values passed between the transport, the query builder and
//! the command line front end. Validation and wire encoding live in
//! `cmr-search`; this crate only knows the shapes and their names.

use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

mod geometry;
mod temporal;

pub use geometry::{Point, SpatialFilter};
pub use temporal::{TIMESTAMP_FORMAT, TemporalRange};

/// The category of record being searched.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Collection,
    Granule,
    Tool,
    Service,
    Variable,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [Self::Collection, Self::Granule, Self::Tool, Self::Service, Self::Variable];

    /// Search route appended to the environment's base URL.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Collection => "collections",
            Self::Granule => "granules",
            Self::Tool => "tools",
            Self::Service => "services",
            Self::Variable => "variables",
        }
    }

    /// Leading characters accepted in a `concept_id` filter for this entity.
    ///
    /// Granule searches also accept collection concept ids, which restrict the
    /// granules to the ones belonging to that collection.
    pub fn concept_id_prefixes(&self) -> &'static [char] {
        match self {
            Self::Collection => &['C'],
            Self::Granule => &['G', 'C'],
            Self::Tool => &['T'],
            Self::Service => &['S'],
            Self::Variable => &['V'],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Granule => "granule",
            Self::Tool => "tool",
            Self::Service => "service",
            Self::Variable => "variable",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| normalized == kind.as_str() || normalized == kind.route())
            .ok_or_else(|| ParseEntityKindError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEntityKindError(String);

impl fmt::Display for ParseEntityKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid entity type '{}'; expected one of collection, granule, tool, service, variable",
            self.0
        )
    }
}

impl Error for ParseEntityKindError {}

/// Deployment environment a query targets.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Ops, // https://cmr.earthdata.nasa.gov/search/
    Uat, // https://cmr.uat.earthdata.nasa.gov/search/
    Sit, // https://cmr.sit.earthdata.nasa.gov/search/
}

impl Environment {
    /// Search endpoint prefix, always ending with `/`.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Ops => "https://cmr.earthdata.nasa.gov/search/",
            Self::Uat => "https://cmr.uat.earthdata.nasa.gov/search/",
            Self::Sit => "https://cmr.sit.earthdata.nasa.gov/search/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ops => "ops",
            Self::Uat => "uat",
            Self::Sit => "sit",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ops" | "prod" | "production" => Ok(Self::Ops),
            "uat" => Ok(Self::Uat),
            "sit" => Ok(Self::Sit),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid environment '{}'; expected 'ops', 'uat' or 'sit'", self.0)
    }
}

impl Error for ParseEnvironmentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_parses_singular_and_route_names() {
        assert_eq!("granule".parse::<EntityKind>(), Ok(EntityKind::Granule));
        assert_eq!("Collections".parse::<EntityKind>(), Ok(EntityKind::Collection));
        assert_eq!(" variables ".parse::<EntityKind>(), Ok(EntityKind::Variable));
        assert!("dataset".parse::<EntityKind>().is_err());
    }

    #[test]
    fn granules_accept_collection_concept_ids() {
        assert_eq!(EntityKind::Granule.concept_id_prefixes(), &['G', 'C']);
        assert_eq!(EntityKind::Tool.concept_id_prefixes(), &['T']);
    }

    #[test]
    fn environment_base_urls_end_with_slash() {
        for environment in [Environment::Ops, Environment::Uat, Environment::Sit] {
            assert!(environment.base_url().ends_with("/search/"), "{environment}");
        }
        assert_eq!("UAT".parse::<Environment>(), Ok(Environment::Uat));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn environment_deserializes_from_lowercase_names() {
        let parsed: Environment = serde_json::from_str("\"sit\"").expect("parse environment");
        assert_eq!(parsed, Environment::Sit);
    }
}
