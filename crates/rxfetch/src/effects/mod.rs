//! Effectful side of the adapter.
//!
//! Everything that touches the network, the filesystem or the runtime lives
//! here: the observable bridge, the session and the request handles built
//! from it.

mod download;
mod observable;
mod request;
mod session;
mod transport;
mod upload;

pub use download::DownloadRequest;
pub use observable::{
    BlockingObservable, BoxFuture, Emitter, Observable, Subscription, SubscriptionState,
};
pub use request::DataRequest;
pub use session::{
    Session, data, decodable, default_session, download, json, request_data, request_decodable,
    request_json, request_string, string, upload, upload_data, upload_file,
};
pub use upload::{UPLOAD_CHUNK_SIZE, UploadRequest, UploadSource};
