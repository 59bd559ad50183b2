//! Error types for Segment Config API operations.
//!
//! The Config API reports failures as a numeric code plus a message, and it
//! is not consistent about which code it uses: some sub-resources report a
//! missing object as a generic validation error (code 3) or an internal
//! error (code 13) instead of 404. [`ApiError::classify`] folds those
//! quirks into an [`ErrorClass`] so callers can decide whether local state
//! should be treated as gone.

use std::fmt;

use crate::names::NameError;

/// Result type alias for Config API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical not-found code.
pub const NOT_FOUND_CODE: i64 = 404;

/// Generic validation code, reused by the API for some missing filters.
pub const INVALID_ARGUMENT_CODE: i64 = 3;

/// Internal error code, reused by the API for permission checks on filters.
pub const INTERNAL_CODE: i64 = 13;

const FILTER_MISSING_MESSAGE: &str = "filter does not exist";
const PERMISSION_VALIDATION_MESSAGE: &str =
    "failed to validate permissions due to an internal error";

/// Semantic outcome of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote object does not exist.
    NotFound,
    /// Internal permission-validation failure seen on filter reads.
    ///
    /// Callers treat it like [`ErrorClass::NotFound`]; it is kept separate
    /// so the two can be told apart in logs.
    TransientValidationFailure,
    /// Anything else. Fatal for the calling operation.
    Other,
}

impl ErrorClass {
    /// Whether the caller should treat its local state as absent.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound | Self::TransientValidationFailure)
    }

    /// Get a user-friendly description of this error class.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Remote object not found",
            Self::TransientValidationFailure => "Transient permission validation failure",
            Self::Other => "Unexpected API error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Structured error returned by the Config API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Segment API error (code {code}): {message}")]
pub struct ApiError {
    /// Numeric error code (an HTTP status or an RPC status code).
    pub code: i64,
    /// Message reported by the API.
    pub message: String,
}

impl ApiError {
    /// Create an API error.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Canonical not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND_CODE, message)
    }

    /// Classify this error. Pure function of `(code, message)`.
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        classify(self.code, &self.message)
    }
}

/// Classify a `(code, message)` pair.
#[must_use]
pub fn classify(code: i64, message: &str) -> ErrorClass {
    match code {
        NOT_FOUND_CODE => ErrorClass::NotFound,
        INVALID_ARGUMENT_CODE if message.contains(FILTER_MISSING_MESSAGE) => ErrorClass::NotFound,
        INTERNAL_CODE if message.contains(PERMISSION_VALIDATION_MESSAGE) => {
            ErrorClass::TransientValidationFailure
        }
        _ => ErrorClass::Other,
    }
}

/// Errors that can occur while talking to the Config API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API answered with a structured error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never produced an API answer.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A resource name returned by the API had an unexpected shape.
    #[error(transparent)]
    Name(#[from] NameError),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Classify this error. Only structured API errors can be anything
    /// other than [`ErrorClass::Other`].
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Error::Api(api) => api.classify(),
            _ => ErrorClass::Other,
        }
    }

    /// Whether the caller should treat its local state as absent.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.classify().is_absent()
    }

    /// Whether the remote object is reported missing.
    ///
    /// Unlike [`Error::is_absent`], the filter permission quirk does not
    /// count.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.classify() == ErrorClass::NotFound
    }

    /// The structured API error, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
