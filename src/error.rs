use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LoaderError {
    #[error("malformed unit conversion data at line {line}: {reason}")]
    MalformedReferenceData { line: usize, reason: String },

    #[error("missing entity identifier ({semantic_type}) for resource {resource}")]
    MissingIdentifierField {
        resource: String,
        semantic_type: String,
    },

    #[error("invalid entity identifier {value:?} on line {line} in resource {resource}")]
    InvalidEntityIdentifier {
        resource: String,
        line: usize,
        value: String,
    },

    #[error("error converting {raw_value:?} to number at field {field} in entity {entity_id}")]
    NumericParseError {
        field: String,
        raw_value: String,
        entity_id: String,
    },

    #[error(
        "mismatched coordinate values for entity {entity_id}: {latitudes} latitude(s), {longitudes} longitude(s)"
    )]
    CoordinateCountMismatch {
        entity_id: String,
        latitudes: usize,
        longitudes: usize,
    },

    #[error("invalid latitude value {value} for entity {entity_id}")]
    InvalidLatitude { entity_id: String, value: f64 },

    #[error("invalid longitude value {value} for entity {entity_id}")]
    InvalidLongitude { entity_id: String, value: f64 },

    #[error("missing campaign {field} for campaign {entity_id}")]
    MissingCampaignField { entity_id: String, field: String },

    #[error("sampling event not found ({event_id}) on line {line} in resource {resource}")]
    SamplingEventNotFound {
        resource: String,
        line: usize,
        event_id: String,
    },

    #[error("no {0} resources found in package")]
    MissingResourceType(String),

    #[error("row length mismatch on line {line} in resource {resource}: expected {expected} values, found {found}")]
    RowLength {
        resource: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("failed to read data package at {0}")]
    PackageRead(PathBuf),

    #[error("failed to parse data package descriptor: {0}")]
    PackageParse(String),

    #[error("failed to read resource {resource}: {message}")]
    ResourceRead { resource: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl LoaderError {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            LoaderError::MissingIdentifierField { .. } | LoaderError::MissingResourceType(_)
        )
    }

    pub fn is_data(&self) -> bool {
        matches!(
            self,
            LoaderError::InvalidEntityIdentifier { .. }
                | LoaderError::NumericParseError { .. }
                | LoaderError::CoordinateCountMismatch { .. }
                | LoaderError::InvalidLatitude { .. }
                | LoaderError::InvalidLongitude { .. }
                | LoaderError::RowLength { .. }
                | LoaderError::MissingCampaignField { .. }
                | LoaderError::SamplingEventNotFound { .. }
        )
    }
}
