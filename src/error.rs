//! Error types for harvest and conversion operations.
//!
//! This module provides the [`OaiError`] type for all library operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all harvest and conversion operations.
///
/// Transport and cursor errors are harvest-fatal; the harvester still closes
/// the output document before reporting them. Field-level parse problems are
/// handled locally by the parsers and never surface as this type.
#[derive(Error, Debug)]
pub enum OaiError {
    /// Caller supplied both or neither of collection URL / resumption token.
    #[error("Invalid request: provide either a collection URL or a resumption token, not {0}")]
    InvalidRequest(&'static str),

    /// HTTP failure while talking to the OAI-PMH endpoint.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP status from the OAI-PMH endpoint.
    #[error("HTTP status {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server.
        status: u16,
        /// URL of the failed request.
        url: String,
    },

    /// Response body or input file fails to parse as XML.
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// Resumption token does not match the expected shape.
    #[error("Malformed resumption token: {0}")]
    MalformedCursor(String),

    /// Neither the MARC21 nor the EDM namespace was detected.
    #[error("Cannot determine record format: expected MARC21XML or EDM records")]
    UnknownFormat,

    /// Collection key not present in the registry.
    #[error("Unknown collection '{key}' (available: {available})")]
    UnknownCollection {
        /// The key that was looked up.
        key: String,
        /// Comma-separated list of registered keys.
        available: String,
    },

    /// Harvest was interrupted; the output document was closed and is
    /// well-formed but holds only part of the collection.
    #[error("Harvest incomplete after {written} records: {source}")]
    IncompleteHarvest {
        /// Number of records written before the interruption.
        written: u64,
        /// What interrupted the harvest.
        #[source]
        source: Box<OaiError>,
    },

    /// Harvest cancelled by the operator.
    #[error("Harvest cancelled by operator")]
    Cancelled,

    /// Invalid URL for a collection endpoint.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing table output.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error writing JSON output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`OaiError`].
pub type Result<T> = std::result::Result<T, OaiError>;
