//! Error types for query construction and execution.

use cmr_api::TransportError;
use cmr_types::EntityKind;
use thiserror::Error;

/// Everything that can go wrong while building or running a query.
///
/// Validation variants are raised at the builder call site, before any
/// network I/O. `RemoteRequestFailed` and `MalformedResponse` come from the
/// executor.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid value for '{parameter}': {reason}")]
    InvalidParameterValue { parameter: String, reason: String },

    #[error("unknown parameter '{name}' for {entity} queries")]
    UnknownParameter { name: String, entity: EntityKind },

    #[error("invalid coordinate: {reason}")]
    InvalidCoordinate { reason: String },

    #[error("invalid polygon: {reason}")]
    InvalidPolygon { reason: String },

    #[error("invalid date '{value}': expected an ISO 8601 timestamp such as 2016-10-10T01:02:03Z")]
    InvalidDateFormat { value: String },

    #[error("unsupported format '{format}' for {entity} queries")]
    UnsupportedFormat { format: String, entity: EntityKind },

    #[error("spatial filters on {entity} queries must be paired with a collection filter (short_name or entry_title)")]
    MissingCollectionFilter { entity: EntityKind },

    #[error("remote request failed with HTTP {status}: {body}")]
    RemoteRequestFailed { status: u16, body: String },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl QueryError {
    /// Create an invalid parameter value error.
    pub fn invalid_value(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameterValue {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown parameter error.
    pub fn unknown_parameter(name: impl Into<String>, entity: EntityKind) -> Self {
        Self::UnknownParameter { name: name.into(), entity }
    }

    /// Create an invalid coordinate error.
    pub fn invalid_coordinate(reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate { reason: reason.into() }
    }

    /// Create an invalid polygon error.
    pub fn invalid_polygon(reason: impl Into<String>) -> Self {
        Self::InvalidPolygon { reason: reason.into() }
    }

    /// Create an invalid date error.
    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDateFormat { value: value.into() }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>, entity: EntityKind) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            entity,
        }
    }

    /// Create a malformed response error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse { reason: reason.into() }
    }

    /// True for failures detected locally, before any request was sent.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::RemoteRequestFailed { .. } | Self::MalformedResponse { .. } | Self::Transport(_)
        )
    }
}
