//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Native
//! error codes are preserved on operational failures so callers can inspect
//! what the platform reported.

use thiserror::Error;

use crate::native::ErrorCode;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the application registry.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input: a malformed identifier, filter key or filter value.
    /// `code` is set when the native layer reported the rejection.
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        message: String,
        code: Option<ErrorCode>,
    },

    /// Filter criteria rejected before any native call (e.g. empty criteria).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A native call failed with the given platform code.
    #[error("operation failed ({code}): {message}")]
    OperationFailed { code: ErrorCode, message: String },

    /// Lookup by identifier yielded no match.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        code: Option<ErrorCode>,
    },

    /// Internal errors (worker join failures and similar).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Translate a native error code into a typed failure.
    ///
    /// `InvalidParameter` maps to an input-validation failure; every other
    /// code becomes an operational failure. Both keep the original code.
    pub fn from_native(code: ErrorCode, message: impl Into<String>) -> Self {
        match code {
            ErrorCode::InvalidParameter => Error::InvalidParameter {
                message: message.into(),
                code: Some(code),
            },
            code => Error::OperationFailed {
                code,
                message: message.into(),
            },
        }
    }

    /// Like [`Error::from_native`], but a `NoSuchApp` code becomes `NotFound`.
    ///
    /// Used by identifier lookups, where "no such app" is an expected outcome.
    pub fn from_native_lookup(code: ErrorCode, message: impl Into<String>) -> Self {
        match code {
            ErrorCode::NoSuchApp => Error::NotFound {
                message: message.into(),
                code: Some(code),
            },
            code => Self::from_native(code, message),
        }
    }

    /// The native code behind this error, if it came from the native layer.
    pub fn native_code(&self) -> Option<ErrorCode> {
        match self {
            Error::OperationFailed { code, .. } => Some(*code),
            Error::InvalidParameter { code, .. } | Error::NotFound { code, .. } => *code,
            _ => None,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: msg.into(),
            code: None,
        }
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
            code: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
