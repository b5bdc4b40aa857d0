use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{
    DataSerializer, DecodableSerializer, JsonSerializer, ResponseSerializer, StringSerializer,
};
use crate::data::{HttpResponse, Transfer};
use crate::effects::observable::Observable;
use crate::effects::session::Session;
use crate::effects::transport::{self, RequestParts};
use crate::error::{Error, Result};

/// Builder methods shared by every request handle.
macro_rules! request_builder_methods {
    () => {
        /// Add a request header. Invalid names or values fail the request
        /// on subscription.
        #[must_use]
        pub fn header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
            self.parts.header(key.as_ref(), value.as_ref());
            self
        }

        #[must_use]
        pub fn headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
            self.parts.headers(headers);
            self
        }

        /// Attach parameters, placed according to `encoding`.
        ///
        /// When the request also carries a raw body or an upload source,
        /// parameters are sent in the query string whatever the encoding.
        #[must_use]
        pub fn parameters(
            mut self,
            parameters: $crate::data::Parameters,
            encoding: $crate::data::ParameterEncoding,
        ) -> Self {
            self.parts.parameters(parameters, encoding);
            self
        }

        /// Per-request timeout, overriding the session's.
        #[must_use]
        pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
            self.parts.timeout(timeout);
            self
        }

        /// Accept 2xx responses whose content type matches the `Accept`
        /// header.
        #[must_use]
        pub fn validate(mut self) -> Self {
            self.parts.validation($crate::data::Validation::successful());
            self
        }

        #[must_use]
        pub fn validate_with(mut self, validation: $crate::data::Validation) -> Self {
            self.parts.validation(validation);
            self
        }

        /// Accept only the given status codes.
        #[must_use]
        pub fn validate_status(self, codes: impl IntoIterator<Item = u16>) -> Self {
            self.validate_with($crate::data::Validation::default().status_codes(codes))
        }

        /// Accept only the given content types.
        #[must_use]
        pub fn validate_content_type<S: Into<String>>(
            self,
            types: impl IntoIterator<Item = S>,
        ) -> Self {
            self.validate_with($crate::data::Validation::default().content_types(types))
        }
    };
}

pub(crate) use request_builder_methods;

/// A request whose response body is read into memory.
///
/// The handle is a description only; every subscription to one of the
/// observables it produces sends the request again.
///
/// # Examples
///
/// ```no_run
/// use rxfetch::{Method, Session};
///
/// # async fn run() -> rxfetch::Result<()> {
/// let session = Session::new()?;
/// let (response, body) = session
///     .request(Method::GET, "https://example.com")
///     .validate()
///     .response_string()
///     .first()
///     .await?
///     .expect("single value");
/// println!("{} {}", response.status, body);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DataRequest {
    session: Session,
    parts: RequestParts,
}

impl DataRequest {
    pub(crate) fn new(session: Session, parts: RequestParts) -> Self {
        Self { session, parts }
    }

    request_builder_methods!();

    /// Raw request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.parts.body(body.into());
        self
    }

    /// Emits the response and the body run through `serializer`.
    pub fn response_serialized<S: ResponseSerializer>(
        &self,
        serializer: S,
    ) -> Observable<(HttpResponse, S::Output)> {
        let session = self.session.clone();
        let parts = self.parts.clone();
        let serializer = Arc::new(serializer);
        Observable::create(move |emitter| {
            let session = session.clone();
            let parts = parts.clone();
            let serializer = Arc::clone(&serializer);
            async move {
                let result = perform(&session, &parts, serializer.as_ref(), |_| {}).await?;
                emitter.next(result);
                Ok(())
            }
        })
    }

    pub fn response_data(&self) -> Observable<(HttpResponse, Bytes)> {
        self.response_serialized(DataSerializer)
    }

    pub fn response_string(&self) -> Observable<(HttpResponse, String)> {
        self.response_serialized(StringSerializer)
    }

    pub fn response_json(&self) -> Observable<(HttpResponse, Value)> {
        self.response_serialized(JsonSerializer)
    }

    pub fn response_decodable<T>(&self) -> Observable<(HttpResponse, T)>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.response_serialized(DecodableSerializer::<T>::new())
    }

    /// Like [`response_serialized`](Self::response_serialized), preceded by a
    /// progress item for every received chunk of the body.
    pub fn progress<S: ResponseSerializer>(
        &self,
        serializer: S,
    ) -> Observable<Transfer<(HttpResponse, S::Output)>> {
        let session = self.session.clone();
        let parts = self.parts.clone();
        let serializer = Arc::new(serializer);
        Observable::create(move |emitter| {
            let session = session.clone();
            let parts = parts.clone();
            let serializer = Arc::clone(&serializer);
            async move {
                let result = perform(&session, &parts, serializer.as_ref(), |p| {
                    emitter.next(Transfer::Progress(p));
                })
                .await?;
                emitter.next(Transfer::Completed(result));
                Ok(())
            }
        })
    }
}

async fn perform<S: ResponseSerializer>(
    session: &Session,
    parts: &RequestParts,
    serializer: &S,
    on_progress: impl FnMut(crate::data::RxProgress),
) -> Result<(HttpResponse, S::Output)> {
    let (response, meta) = transport::send(session.client(), parts, None).await?;
    let body = transport::read_body(response, &meta, on_progress).await?;
    let value = serializer
        .serialize(&parts.method, &meta, body)
        .map_err(|e| Error::decode(e, &meta))?;
    Ok((meta, value))
}
