use std::path::PathBuf;

use bytes::Bytes;
use once_cell::sync::Lazy;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::SessionConfig;
use crate::data::{Destination, DownloadResponse, HttpResponse};
use crate::effects::download::DownloadRequest;
use crate::effects::observable::Observable;
use crate::effects::request::DataRequest;
use crate::effects::transport::RequestParts;
use crate::effects::upload::{UploadRequest, UploadSource};
use crate::error::Result;

static DEFAULT_SESSION: Lazy<Session> = Lazy::new(|| {
    let client = SessionConfig::default().build().unwrap_or_else(|e| {
        warn!(error = %e, "default session configuration rejected, using a plain client");
        Client::new()
    });
    Session::from_client(client)
});

/// Shared session backing the free functions of this crate.
pub fn default_session() -> &'static Session {
    &DEFAULT_SESSION
}

/// Entry point for building requests.
///
/// Cheap to clone: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
}

impl Session {
    pub fn new() -> Result<Self> {
        Self::with_config(&SessionConfig::default())
    }

    pub fn with_config(config: &SessionConfig) -> Result<Self> {
        Ok(Self::from_client(config.build()?))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Describe a request whose body is read into memory.
    pub fn request(&self, method: Method, url: impl AsRef<str>) -> DataRequest {
        DataRequest::new(self.clone(), RequestParts::new(method, url.as_ref()))
    }

    /// Describe a request whose body is streamed to a file.
    pub fn download(&self, method: Method, url: impl AsRef<str>) -> DownloadRequest {
        DownloadRequest::new(self.clone(), RequestParts::new(method, url.as_ref()))
    }

    /// Describe a request that uploads `source` as its body.
    pub fn upload(
        &self,
        source: impl Into<UploadSource>,
        method: Method,
        url: impl AsRef<str>,
    ) -> UploadRequest {
        UploadRequest::new(self.clone(), RequestParts::new(method, url.as_ref()), source.into())
    }

    pub fn request_data(
        &self,
        method: Method,
        url: impl AsRef<str>,
    ) -> Observable<(HttpResponse, Bytes)> {
        self.request(method, url).response_data()
    }

    pub fn request_string(
        &self,
        method: Method,
        url: impl AsRef<str>,
    ) -> Observable<(HttpResponse, String)> {
        self.request(method, url).response_string()
    }

    pub fn request_json(
        &self,
        method: Method,
        url: impl AsRef<str>,
    ) -> Observable<(HttpResponse, Value)> {
        self.request(method, url).response_json()
    }

    pub fn request_decodable<T>(
        &self,
        method: Method,
        url: impl AsRef<str>,
    ) -> Observable<(HttpResponse, T)>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request(method, url).response_decodable()
    }
}

/// Request with the default session; emits the response and raw body.
pub fn request_data(method: Method, url: impl AsRef<str>) -> Observable<(HttpResponse, Bytes)> {
    default_session().request_data(method, url)
}

/// Request with the default session; emits the response and UTF-8 body.
pub fn request_string(method: Method, url: impl AsRef<str>) -> Observable<(HttpResponse, String)> {
    default_session().request_string(method, url)
}

/// Request with the default session; emits the response and parsed JSON.
pub fn request_json(method: Method, url: impl AsRef<str>) -> Observable<(HttpResponse, Value)> {
    default_session().request_json(method, url)
}

pub fn request_decodable<T>(method: Method, url: impl AsRef<str>) -> Observable<(HttpResponse, T)>
where
    T: DeserializeOwned + Send + 'static,
{
    default_session().request_decodable(method, url)
}

/// Body-only variant of [`request_data`].
pub fn data(method: Method, url: impl AsRef<str>) -> Observable<Bytes> {
    request_data(method, url).map(|(_, body)| body)
}

pub fn string(method: Method, url: impl AsRef<str>) -> Observable<String> {
    request_string(method, url).map(|(_, body)| body)
}

pub fn json(method: Method, url: impl AsRef<str>) -> Observable<Value> {
    request_json(method, url).map(|(_, body)| body)
}

pub fn decodable<T>(method: Method, url: impl AsRef<str>) -> Observable<T>
where
    T: DeserializeOwned + Send + 'static,
{
    request_decodable(method, url).map(|(_, body)| body)
}

/// Download with the default session.
///
/// Without a destination the file is kept at a temporary path.
pub fn download(
    method: Method,
    url: impl AsRef<str>,
    destination: Option<Destination>,
) -> Observable<DownloadResponse> {
    let request = default_session().download(method, url);
    match destination {
        Some(destination) => request.to(destination).response(),
        None => request.response(),
    }
}

/// Upload with the default session; emits the response and raw body.
pub fn upload(
    source: impl Into<UploadSource>,
    method: Method,
    url: impl AsRef<str>,
) -> Observable<(HttpResponse, Bytes)> {
    default_session().upload(source, method, url).response_data()
}

/// [`upload`] of an in-memory payload.
pub fn upload_data(
    data: impl Into<Bytes>,
    method: Method,
    url: impl AsRef<str>,
) -> Observable<(HttpResponse, Bytes)> {
    upload(UploadSource::Data(data.into()), method, url)
}

/// [`upload`] of a file, read from disk on every subscription.
pub fn upload_file(
    path: impl Into<PathBuf>,
    method: Method,
    url: impl AsRef<str>,
) -> Observable<(HttpResponse, Bytes)> {
    upload(UploadSource::File(path.into()), method, url)
}
