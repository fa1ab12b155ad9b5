//! Error types for division resolution and extraction.
//!
//! Resolution and engine failures are surfaced to the caller unchanged: they
//! mean either the location genuinely does not exist or the query/data needs
//! fixing. The only locally recovered failure is the release lookup, which
//! never produces an error (see [`crate::release`]).

use std::time::Duration;
use thiserror::Error;

pub use geoextract_core_common::EngineError;

/// Main error type for `geoextract` operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A geometry is empty or cannot be decoded
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of the geometry problem
        message: String,
    },

    /// A caller-supplied argument is out of range or malformed
    #[error("Invalid {argument} argument: {message}")]
    InvalidArgument {
        /// The argument name
        argument: String,
        /// Why it is invalid
        message: String,
    },

    /// No geocoding candidate, or no division matched
    #[error("Division \"{query}\" not found")]
    NotFound {
        /// The query text or identifier the user supplied
        query: String,
    },

    /// Query engine failures (bad statement, unreachable data, write failure)
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The geocoder did not answer within the caller's deadline
    #[error("Geocoding \"{query}\" timed out after {timeout:?}")]
    GeocodeTimeout {
        /// The query text
        query: String,
        /// The deadline that expired
        timeout: Duration,
    },

    /// The geocoder could not be reached or returned garbage
    #[error("Geocoding service unavailable for \"{query}\": {message}")]
    GeocodeUnavailable {
        /// The query text
        query: String,
        /// Description of the transport or decoding failure
        message: String,
    },
}

/// Type alias for Results using `ExtractError`.
pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    pub(crate) fn invalid_argument(argument: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Get a user-friendly error message.
    ///
    /// Resolution failures name the query or identifier exactly as the user
    /// typed it.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Engine(EngineError::DatasetUnavailable { location, .. }) => {
                format!("Dataset not found at {location}")
            },
            Self::Engine(e) => format!("Query error: {e}"),
            Self::NotFound { .. }
            | Self::InvalidGeometry { .. }
            | Self::InvalidArgument { .. }
            | Self::GeocodeTimeout { .. }
            | Self::GeocodeUnavailable { .. } => self.to_string(),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => Some(
                "Check the spelling, try a broader place name, or pass --division-id instead."
                    .to_string(),
            ),
            Self::GeocodeTimeout { .. } => {
                Some("Retry later or raise --geocode-timeout-secs.".to_string())
            },
            Self::GeocodeUnavailable { .. } => Some(
                "Check your network connection, or pass --division-id to skip geocoding."
                    .to_string(),
            ),
            Self::Engine(EngineError::DatasetUnavailable { .. }) => Some(
                "Check --theme, --type and --release; the partition must exist in that release."
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Check if retrying the same invocation could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GeocodeTimeout { .. } | Self::GeocodeUnavailable { .. }
        )
    }
}
