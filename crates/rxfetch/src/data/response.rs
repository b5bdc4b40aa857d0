use std::path::PathBuf;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{StatusCode, Url, Version};

use super::progress::RxProgress;

/// Metadata of a received HTTP response.
///
/// Captured before the body is read, so it is also available on errors that
/// happen while the body streams in.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code of the final response.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// URL of the final response, after redirects.
    pub url: Url,

    pub version: Version,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            version: response.version(),
        }
    }

    /// Numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The `Content-Type` header, if present and valid ASCII.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }
}

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadResponse<T = ()> {
    pub response: HttpResponse,

    /// Where the downloaded body was placed.
    pub file: PathBuf,

    /// Serialized body, or `()` for a plain download.
    pub value: T,
}

impl<T> DownloadResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DownloadResponse<U> {
        DownloadResponse {
            response: self.response,
            file: self.file,
            value: f(self.value),
        }
    }
}

/// An item of a progress stream.
///
/// Zero or more `Progress` items are followed by exactly one `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transfer<T> {
    Progress(RxProgress),
    Completed(T),
}

impl<T> Transfer<T> {
    pub fn progress(&self) -> Option<RxProgress> {
        match self {
            Transfer::Progress(p) => Some(*p),
            Transfer::Completed(_) => None,
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Transfer::Progress(_) => None,
            Transfer::Completed(value) => Some(value),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Transfer::Completed(_))
    }
}
