//! The single place that talks to `reqwest`.
//!
//! Builds requests from [`RequestParts`], sends them and drains response
//! bodies while reporting progress ticks.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Body, Client, Method, RequestBuilder, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::config::ConfigError;
use crate::core::{ParameterPlacement, placement, validate};
use crate::data::{HttpResponse, ParameterEncoding, Parameters, RxProgress, Validation};
use crate::error::{Error, Result};

/// Everything needed to issue a request, kept cloneable so each
/// subscription can rebuild it.
#[derive(Debug, Clone)]
pub(crate) struct RequestParts {
    pub(crate) method: Method,
    url: std::result::Result<Url, String>,
    headers: HeaderMap,
    invalid_header: Option<(String, String)>,
    parameters: Option<(Parameters, ParameterEncoding)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    validation: Option<Validation>,
}

impl RequestParts {
    pub(crate) fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: Url::parse(url).map_err(|e| format!("{url}: {e}")),
            headers: HeaderMap::new(),
            invalid_header: None,
            parameters: None,
            body: None,
            timeout: None,
            validation: None,
        }
    }

    pub(crate) fn header(&mut self, key: &str, value: &str) {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| e.to_string());
        let value = HeaderValue::from_str(value).map_err(|e| e.to_string());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(reason), _) | (_, Err(reason)) => {
                self.invalid_header.get_or_insert((key.to_string(), reason));
            }
        }
    }

    pub(crate) fn headers(&mut self, headers: HeaderMap) {
        self.headers.extend(headers);
    }

    pub(crate) fn parameters(&mut self, parameters: Parameters, encoding: ParameterEncoding) {
        self.parameters = Some((parameters, encoding));
    }

    pub(crate) fn body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    pub(crate) fn timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub(crate) fn validation(&mut self, validation: Validation) {
        self.validation = Some(validation);
    }

    pub(crate) fn url(&self) -> Result<&Url> {
        self.url.as_ref().map_err(|e| Error::InvalidUrl(e.clone()))
    }

    fn accept(&self) -> Option<&str> {
        self.headers.get(ACCEPT).and_then(|v| v.to_str().ok())
    }

    /// Build the `reqwest` request. `body` overrides any body set on the
    /// parts. With a body present, parameters are always sent in the query
    /// string and no `Content-Type` is implied.
    pub(crate) fn build(&self, client: &Client, body: Option<Body>) -> Result<RequestBuilder> {
        let url = self.url()?.clone();
        if let Some((name, reason)) = &self.invalid_header {
            return Err(ConfigError::Header {
                name: name.clone(),
                reason: reason.clone(),
            }
            .into());
        }

        let mut request = client.request(self.method.clone(), url).headers(self.headers.clone());

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let body = body.or_else(|| self.body.clone().map(Body::from));

        // Parameters never share the payload with an explicit body.
        if let Some((parameters, encoding)) = &self.parameters {
            let target = if body.is_some() {
                ParameterPlacement::QueryString
            } else {
                placement(&self.method, *encoding)
            };
            request = match target {
                ParameterPlacement::QueryString => request.query(&query_pairs(parameters)),
                ParameterPlacement::FormBody => request.form(&query_pairs(parameters)),
                ParameterPlacement::JsonBody => request.json(parameters),
            };
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        Ok(request)
    }

    /// Apply the configured validation, if any.
    pub(crate) fn validate(&self, response: &HttpResponse) -> Result<()> {
        let Some(validation) = &self.validation else {
            return Ok(());
        };
        validate(
            validation,
            response.status_code(),
            response.content_type(),
            self.accept(),
        )
        .map_err(|reason| Error::Validation {
            reason,
            response: Box::new(response.clone()),
        })
    }
}

/// Flatten parameters into name/value pairs for URL encoding.
///
/// Strings are used verbatim, `null` becomes an empty value, arrays repeat
/// the key and anything else uses its JSON text.
fn query_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(parameters.len());
    for (key, value) in parameters {
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    pairs.push((format!("{key}[]"), scalar(item)));
                }
            }
            other => pairs.push((key.clone(), scalar(other))),
        }
    }
    pairs
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Send the request and capture the response metadata.
pub(crate) async fn send(
    client: &Client,
    parts: &RequestParts,
    body: Option<Body>,
) -> Result<(reqwest::Response, HttpResponse)> {
    let request = parts.build(client, body)?;
    debug!(method = %parts.method, url = %parts.url()?, "sending request");

    let response = request.send().await?;
    let meta = HttpResponse::from_reqwest(&response);
    debug!(status = meta.status_code(), url = %meta.url, "received response");

    parts.validate(&meta)?;
    Ok((response, meta))
}

/// Drain the body into memory, reporting a tick per received chunk.
pub(crate) async fn read_body(
    response: reqwest::Response,
    meta: &HttpResponse,
    mut on_progress: impl FnMut(RxProgress),
) -> Result<Bytes> {
    let total = response.content_length();
    let mut buffer = BytesMut::with_capacity(total.unwrap_or(0).min(16 * 1024 * 1024) as usize);
    let mut stream = response.bytes_stream();
    let mut received = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::transport_with(e, meta))?;
        received += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);

        let progress = RxProgress::from_transport(received, total);
        trace!(%progress, "download progress");
        on_progress(progress);
    }

    Ok(buffer.freeze())
}

/// Stream the body into `file`, reporting a tick per written chunk.
///
/// Returns the number of bytes written.
pub(crate) async fn write_body(
    response: reqwest::Response,
    meta: &HttpResponse,
    file: &mut tokio::fs::File,
    mut on_progress: impl FnMut(RxProgress),
) -> Result<u64> {
    let total = response.content_length();
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::transport_with(e, meta))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        let progress = RxProgress::from_transport(written, total);
        trace!(%progress, "download progress");
        on_progress(progress);
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&params(json!({
            "q": "rust",
            "page": 2,
            "tags": ["a", "b"],
            "empty": null,
        })));
        assert!(pairs.contains(&("q".into(), "rust".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("tags[]".into(), "a".into())));
        assert!(pairs.contains(&("tags[]".into(), "b".into())));
        assert!(pairs.contains(&("empty".into(), String::new())));
    }

    #[test]
    fn test_invalid_url_is_deferred() {
        let parts = RequestParts::new(Method::GET, "not a url");
        assert!(matches!(parts.url(), Err(Error::InvalidUrl(_))));
        assert!(matches!(parts.build(&Client::new(), None), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_header_is_deferred() {
        let mut parts = RequestParts::new(Method::GET, "http://mywebservice.com");
        parts.header("bad header", "x");
        assert!(matches!(
            parts.build(&Client::new(), None),
            Err(Error::Config(ConfigError::Header { .. }))
        ));
    }

    #[test]
    fn test_query_parameters_reach_url() {
        let mut parts = RequestParts::new(Method::GET, "http://mywebservice.com/search");
        parts.parameters(params(json!({ "q": "rust" })), ParameterEncoding::Url);
        let request = parts.build(&Client::new(), None).unwrap().build().unwrap();
        assert_eq!(request.url().query(), Some("q=rust"));
    }

    #[test]
    fn test_json_parameters_become_body() {
        let mut parts = RequestParts::new(Method::POST, "http://mywebservice.com/items");
        parts.parameters(params(json!({ "hello": "world" })), ParameterEncoding::Json);
        let request = parts.build(&Client::new(), None).unwrap().build().unwrap();
        assert_eq!(request.url().query(), None);
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"hello":"world"}"#);
    }

    #[test]
    fn test_explicit_body_moves_parameters_to_query() {
        for encoding in [ParameterEncoding::Url, ParameterEncoding::Json] {
            let mut parts = RequestParts::new(Method::POST, "http://mywebservice.com/upload");
            parts.parameters(params(json!({ "token": "abc" })), encoding);
            let request = parts
                .build(&Client::new(), Some(Body::from("payload")))
                .unwrap()
                .build()
                .unwrap();

            assert_eq!(request.url().query(), Some("token=abc"));
            assert!(request.headers().get(reqwest::header::CONTENT_TYPE).is_none());
            assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b"payload"[..]));
        }
    }

    #[test]
    fn test_stored_body_moves_parameters_to_query() {
        let mut parts = RequestParts::new(Method::PUT, "http://mywebservice.com/items");
        parts.parameters(params(json!({ "hello": "world" })), ParameterEncoding::Json);
        parts.body(Bytes::from_static(b"raw"));
        let request = parts.build(&Client::new(), None).unwrap().build().unwrap();

        assert_eq!(request.url().query(), Some("hello=world"));
        assert!(request.headers().get(reqwest::header::CONTENT_TYPE).is_none());
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b"raw"[..]));
    }
}
