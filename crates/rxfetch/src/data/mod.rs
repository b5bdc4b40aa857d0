//! Immutable data types shared by the adapter.
//!
//! Progress values, response metadata, request options and download
//! placement rules. Nothing in here performs I/O.

pub mod options;
pub mod progress;
pub mod response;

pub use options::{
    Destination, DownloadOptions, ParameterEncoding, Parameters, Validation,
    suggested_download_destination,
};
pub use progress::RxProgress;
pub use response::{DownloadResponse, HttpResponse, Transfer};
