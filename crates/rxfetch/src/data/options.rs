use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::response::HttpResponse;

/// How request parameters are attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterEncoding {
    /// Query string for `GET`, `HEAD` and `DELETE`, form body otherwise.
    #[default]
    Url,

    /// Always the query string.
    QueryString,

    /// JSON body with `Content-Type: application/json`.
    Json,
}

/// Request parameters, keyed by name.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Which responses count as successful.
///
/// Requests carry no validation unless one is set, so every status code
/// reaches the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validation {
    /// Acceptable status codes. Empty means any.
    pub status_codes: Vec<u16>,

    /// Acceptable MIME types, `*` wildcards allowed. `None` derives them from
    /// the request's `Accept` header.
    pub content_types: Option<Vec<String>>,
}

impl Validation {
    /// Accepts `200..=299` and whatever the `Accept` header asks for.
    pub fn successful() -> Self {
        Self {
            status_codes: (200..300).collect(),
            content_types: None,
        }
    }

    #[must_use]
    pub fn status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.status_codes = codes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn content_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.content_types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

/// File handling applied when a download is moved to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadOptions {
    /// Create missing parent directories of the destination.
    pub create_intermediate_directories: bool,

    /// Replace a file already present at the destination.
    pub remove_previous_file: bool,
}

impl DownloadOptions {
    pub const fn new() -> Self {
        Self {
            create_intermediate_directories: false,
            remove_previous_file: false,
        }
    }

    #[must_use]
    pub const fn create_intermediate_directories(mut self, yes: bool) -> Self {
        self.create_intermediate_directories = yes;
        self
    }

    #[must_use]
    pub const fn remove_previous_file(mut self, yes: bool) -> Self {
        self.remove_previous_file = yes;
        self
    }
}

type DestinationFn = dyn Fn(&Path, &HttpResponse) -> (PathBuf, DownloadOptions) + Send + Sync;

/// Resolves where a finished download goes.
///
/// Called with the temporary file and the response metadata once the body
/// has been fully written.
#[derive(Clone)]
pub struct Destination(Arc<DestinationFn>);

impl Destination {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Path, &HttpResponse) -> (PathBuf, DownloadOptions) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A fixed path, whatever the response says.
    pub fn to(path: impl Into<PathBuf>, options: DownloadOptions) -> Self {
        let path = path.into();
        Self::new(move |_, _| (path.clone(), options))
    }

    pub fn resolve(&self, temporary: &Path, response: &HttpResponse) -> (PathBuf, DownloadOptions) {
        (self.0)(temporary, response)
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Destination").field(&"{ ... }").finish()
    }
}

/// Places downloads under `directory`, named after the last URL path
/// segment.
///
/// Falls back to `download` when the URL has no usable segment. Intermediate
/// directories are created and previous files replaced.
pub fn suggested_download_destination(directory: impl Into<PathBuf>) -> Destination {
    let directory = directory.into();
    Destination::new(move |_, response| {
        let name = response
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
            .to_string();
        (
            directory.join(name),
            DownloadOptions::new()
                .create_intermediate_directories(true)
                .remove_previous_file(true),
        )
    })
}
