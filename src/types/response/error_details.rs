//! Represents error details utils for JSON-RPC responses

use serde::{Deserialize, Serialize};
use crate::error::{Error, ErrorCode};

/// Detailed error information
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Integer error code.
    pub code: ErrorCode,

    /// Short description of the error.
    pub message: String,

    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>
}

impl From<Error> for ErrorDetails {
    #[inline]
    fn from(err: Error) -> Self {
        Self {
            code: err.code,
            message: err.to_string(),
            data: err.data,
        }
    }
}

impl From<ErrorDetails> for Error {
    #[inline]
    fn from(details: ErrorDetails) -> Self {
        let err = Error::new(details.code, details.message);
        match details.data {
            Some(data) => err.with_data(data),
            None => err,
        }
    }
}
