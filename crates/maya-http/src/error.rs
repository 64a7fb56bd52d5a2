//! Internal error types for backend requests.
//!
//! These errors are internal to `maya-http` and are mapped to core
//! [`PortError`]s at the port boundary.

use maya_core::PortError;
use thiserror::Error;

/// Result type alias for backend operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors related to tutor backend requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed with a non-2xx HTTP status.
    #[error("Request to {url} failed with status {status}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Backend returned an invalid or unexpected response.
    #[error("Invalid response from backend: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading the local upload failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Map onto the synthesis port error.
    pub(crate) fn into_synthesis(self) -> PortError {
        match self {
            Self::Io(e) => PortError::Input(e.to_string()),
            other => PortError::SynthesisFailed(other.to_string()),
        }
    }

    /// Map onto the transcription port error.
    pub(crate) fn into_transcription(self) -> PortError {
        match self {
            Self::Io(e) => PortError::Input(e.to_string()),
            other => PortError::TranscriptionFailed(other.to_string()),
        }
    }

    /// Map onto the chat port error.
    pub(crate) fn into_chat(self) -> PortError {
        match self {
            Self::Io(e) => PortError::Input(e.to_string()),
            other => PortError::ChatFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_error_message() {
        let error = ApiError::RequestFailed {
            status: 500,
            url: "http://localhost:8000/tts/".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("/tts/"));
    }

    #[test]
    fn test_maps_to_matching_port_error() {
        let err = ApiError::InvalidResponse {
            message: "empty body".to_string(),
        };
        assert!(matches!(err.into_synthesis(), PortError::SynthesisFailed(m) if m.contains("empty body")));

        let err = ApiError::RequestFailed {
            status: 400,
            url: "u".to_string(),
        };
        assert!(matches!(err.into_transcription(), PortError::TranscriptionFailed(_)));

        let err = ApiError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err.into_chat(), PortError::Input(_)));
    }
}
