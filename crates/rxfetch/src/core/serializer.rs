use std::marker::PhantomData;

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::data::HttpResponse;
use crate::error::DecodeError;

/// Status codes whose responses may legitimately have no body.
pub const EMPTY_RESPONSE_CODES: [u16; 2] = [204, 205];

/// Turns a received body into a typed value.
///
/// Serializers are pure: they see the request method, the response metadata
/// and the complete body, and either produce a value or a [`DecodeError`].
pub trait ResponseSerializer: Send + Sync + 'static {
    type Output: Send + 'static;

    fn serialize(
        &self,
        method: &Method,
        response: &HttpResponse,
        body: Bytes,
    ) -> Result<Self::Output, DecodeError>;
}

/// Returns `true` if an empty body is acceptable for this exchange.
pub fn allows_empty_body(method: &Method, response: &HttpResponse) -> bool {
    *method == Method::HEAD || EMPTY_RESPONSE_CODES.contains(&response.status_code())
}

/// Raw body bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSerializer;

impl ResponseSerializer for DataSerializer {
    type Output = Bytes;

    fn serialize(&self, _: &Method, _: &HttpResponse, body: Bytes) -> Result<Bytes, DecodeError> {
        Ok(body)
    }
}

/// Body decoded as UTF-8 text.
///
/// A leading byte order mark is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl ResponseSerializer for StringSerializer {
    type Output = String;

    fn serialize(&self, _: &Method, _: &HttpResponse, body: Bytes) -> Result<String, DecodeError> {
        let text = std::str::from_utf8(&body)?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

/// Body parsed into a dynamic JSON value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl ResponseSerializer for JsonSerializer {
    type Output = Value;

    fn serialize(
        &self,
        method: &Method,
        response: &HttpResponse,
        body: Bytes,
    ) -> Result<Value, DecodeError> {
        if body.is_empty() {
            return if allows_empty_body(method, response) {
                Ok(Value::Null)
            } else {
                Err(DecodeError::EmptyBody)
            };
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Body deserialized into `T`.
///
/// Empty bodies where allowed deserialize `T` from `null`, so `Option<T>`
/// and `()` work for 204 responses.
pub struct DecodableSerializer<T>(PhantomData<fn() -> T>);

impl<T> DecodableSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DecodableSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DecodableSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DecodableSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DecodableSerializer")
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseSerializer for DecodableSerializer<T> {
    type Output = T;

    fn serialize(
        &self,
        method: &Method,
        response: &HttpResponse,
        body: Bytes,
    ) -> Result<T, DecodeError> {
        if body.is_empty() {
            return if allows_empty_body(method, response) {
                Ok(serde_json::from_value(Value::Null)?)
            } else {
                Err(DecodeError::EmptyBody)
            };
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
