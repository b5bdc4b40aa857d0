//! Error types for rxfetch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::HttpResponse;

/// Why a response body could not be turned into the requested value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response body is empty")]
    EmptyBody,
}

/// Why validation rejected a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("unacceptable status code {0}")]
    StatusCode(u16),

    #[error("unacceptable content type {actual:?}, expected one of {acceptable:?}")]
    ContentType {
        actual: Option<String>,
        acceptable: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
        response: Option<Box<HttpResponse>>,
    },

    #[error("response validation failed: {reason}")]
    Validation {
        reason: ValidationFailure,
        response: Box<HttpResponse>,
    },

    #[error("failed to decode response: {source}")]
    Decode {
        #[source]
        source: DecodeError,
        response: Box<HttpResponse>,
    },

    #[error("cannot place download at {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("download destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid session configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("no tokio runtime available to drive the request")]
    NoRuntime,

    #[error("cannot block on a stream from inside an async runtime")]
    BlockingInRuntime,

    #[error("request task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn transport(source: reqwest::Error) -> Self {
        Error::Transport {
            source,
            response: None,
        }
    }

    pub(crate) fn transport_with(source: reqwest::Error, response: &HttpResponse) -> Self {
        Error::Transport {
            source,
            response: Some(Box::new(response.clone())),
        }
    }

    pub(crate) fn decode(source: DecodeError, response: &HttpResponse) -> Self {
        Error::Decode {
            source,
            response: Box::new(response.clone()),
        }
    }

    /// Response metadata received before the failure, if any.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Error::Transport { response, .. } => response.as_deref(),
            Error::Validation { response, .. } | Error::Decode { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Returns `true` if the failure happened below HTTP, e.g. connection
    /// refused or a timeout.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport { source, .. } if source.is_timeout())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self { Error::transport(e) }
}
