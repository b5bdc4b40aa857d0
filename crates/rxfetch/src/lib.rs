//! Reactive streams over `reqwest`.
//!
//! Every request, download and upload is exposed as a cold [`Observable`]:
//! nothing happens until it is subscribed, each subscription issues one
//! request, and the stream ends after a single result or a single error.
//! Progress variants emit [`Transfer::Progress`] items before the result.
//!
//! # Architecture
//!
//! - [`data`] - Immutable values: progress, response metadata, options
//! - [`core`] - Pure transformations: validation and body serializers
//! - `effects` - The observable bridge, sessions and request handles
//!
//! # Example
//!
//! ```no_run
//! use rxfetch::Method;
//!
//! # async fn run() -> rxfetch::Result<()> {
//! if let Some((response, json)) = rxfetch::request_json(Method::GET, "https://example.com/api")
//!     .first()
//!     .await?
//! {
//!     println!("{} {}", response.status, json["hello"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod data;
mod effects;
mod error;

pub use config::{ConfigError, SessionConfig};
pub use crate::core::{
    DataSerializer, DecodableSerializer, JsonSerializer, ResponseSerializer, StringSerializer,
};
pub use data::{
    Destination, DownloadOptions, DownloadResponse, HttpResponse, ParameterEncoding, Parameters,
    RxProgress, Transfer, Validation, suggested_download_destination,
};
pub use effects::{
    BlockingObservable, BoxFuture, DataRequest, DownloadRequest, Emitter, Observable, Session,
    Subscription, SubscriptionState, UPLOAD_CHUNK_SIZE, UploadRequest, UploadSource, data,
    decodable, default_session, download, json, request_data, request_decodable, request_json,
    request_string, string, upload, upload_data, upload_file,
};
pub use error::{DecodeError, Error, Result, ValidationFailure};

pub use reqwest::{Method, StatusCode, Url};
