use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use reqwest::Body;
use reqwest::header::CONTENT_LENGTH;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::core::{DataSerializer, JsonSerializer, ResponseSerializer, StringSerializer};
use crate::data::{HttpResponse, RxProgress, Transfer};
use crate::effects::observable::Observable;
use crate::effects::request::request_builder_methods;
use crate::effects::session::Session;
use crate::effects::transport::{self, RequestParts};
use crate::error::{Error, Result};

/// Size of the pieces an upload body is handed to the transport in.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

type BodyStream = futures_util::stream::BoxStream<'static, std::io::Result<Bytes>>;

/// What an upload sends.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Data(Bytes),

    /// Read from disk on every subscription.
    File(PathBuf),
}

impl From<Bytes> for UploadSource {
    fn from(data: Bytes) -> Self {
        UploadSource::Data(data)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(data: Vec<u8>) -> Self {
        UploadSource::Data(Bytes::from(data))
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::File(path)
    }
}

impl UploadSource {
    async fn open(&self) -> Result<(BodyStream, u64)> {
        match self {
            UploadSource::Data(data) => {
                let chunks: Vec<Bytes> = (0..data.len())
                    .step_by(UPLOAD_CHUNK_SIZE)
                    .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
                    .collect();
                let body = stream::iter(chunks.into_iter().map(Ok)).boxed();
                Ok((body, data.len() as u64))
            }
            UploadSource::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                let body = stream::unfold(file, |mut file| async move {
                    let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
                    match file.read(&mut buf).await {
                        Ok(0) => None,
                        Ok(n) => {
                            buf.truncate(n);
                            Some((Ok(Bytes::from(buf)), file))
                        }
                        Err(e) => Some((Err(e), file)),
                    }
                })
                .boxed();
                Ok((body, len))
            }
        }
    }
}

/// Forwards upload ticks until the response headers arrive.
///
/// The body stream is polled by the connection task, not the producer, so a
/// server that answers before reading the whole body can still pull chunks
/// after the response is in hand. Closing the gate drops the callback.
#[derive(Clone)]
struct ProgressGate {
    sink: Arc<Mutex<Option<ProgressSink>>>,
}

type ProgressSink = Box<dyn FnMut(RxProgress) + Send>;

impl ProgressGate {
    fn new(on_progress: impl FnMut(RxProgress) + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(Box::new(on_progress)))),
        }
    }

    fn tick(&self, progress: RxProgress) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_mut() {
            Some(on_progress) => on_progress(progress),
            None => trace!(%progress, "upload progress after response, dropped"),
        }
    }

    fn close(&self) {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Tick through `gate` for every chunk the transport takes.
fn counted(body: BodyStream, total: u64, gate: ProgressGate) -> BodyStream {
    let mut sent = 0u64;
    body.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            let progress = RxProgress::from_transport(sent, Some(total));
            trace!(%progress, "upload progress");
            gate.tick(progress);
        }
        chunk
    })
    .boxed()
}

/// A request that sends a body and reports upload progress.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    session: Session,
    parts: RequestParts,
    source: UploadSource,
}

impl UploadRequest {
    pub(crate) fn new(session: Session, parts: RequestParts, source: UploadSource) -> Self {
        Self {
            session,
            parts,
            source,
        }
    }

    request_builder_methods!();

    pub fn response_serialized<S: ResponseSerializer>(
        &self,
        serializer: S,
    ) -> Observable<(HttpResponse, S::Output)> {
        let request = self.clone();
        let serializer = Arc::new(serializer);
        Observable::create(move |emitter| {
            let request = request.clone();
            let serializer = Arc::clone(&serializer);
            async move {
                let result = request.perform(serializer.as_ref(), |_| {}).await?;
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

    /// Upload progress items for the request body, then the serialized
    /// response.
    ///
    /// Ticks stop once the response headers arrive. A server that replies
    /// before consuming the whole body therefore yields fewer ticks, and the
    /// last one may fall short of the total.
    pub fn progress<S: ResponseSerializer>(
        &self,
        serializer: S,
    ) -> Observable<Transfer<(HttpResponse, S::Output)>> {
        let request = self.clone();
        let serializer = Arc::new(serializer);
        Observable::create(move |emitter| {
            let request = request.clone();
            let serializer = Arc::clone(&serializer);
            let ticker = emitter.clone();
            async move {
                let result = request
                    .perform(serializer.as_ref(), move |p| {
                        ticker.next(Transfer::Progress(p));
                    })
                    .await?;
                emitter.next(Transfer::Completed(result));
                Ok(())
            }
        })
    }

    async fn perform<S: ResponseSerializer>(
        &self,
        serializer: &S,
        on_progress: impl FnMut(RxProgress) + Send + 'static,
    ) -> Result<(HttpResponse, S::Output)> {
        let (body, total) = self.source.open().await?;

        let mut parts = self.parts.clone();
        parts.header(CONTENT_LENGTH.as_str(), &total.to_string());

        let gate = ProgressGate::new(on_progress);
        let body = Body::wrap_stream(counted(body, total, gate.clone()));
        let sent = transport::send(self.session.client(), &parts, Some(body)).await;
        gate.close();
        let (response, meta) = sent?;
        let body = transport::read_body(response, &meta, |_| {}).await?;
        let value = serializer
            .serialize(&parts.method, &meta, body)
            .map_err(|e| Error::decode(e, &meta))?;
        Ok((meta, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_data_source_chunks() {
        let data = Bytes::from(vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10]);
        let (body, total) = UploadSource::Data(data.clone()).open().await.unwrap();
        assert_eq!(total, data.len() as u64);

        let chunks: Vec<Bytes> = body.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 10);
    }

    #[tokio::test]
    async fn test_empty_data_source() {
        let (body, total) = UploadSource::Data(Bytes::new()).open().await.unwrap();
        assert_eq!(total, 0);
        assert_eq!(body.count().await, 0);
    }

    #[tokio::test]
    async fn test_file_source_reads_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, vec![1u8; UPLOAD_CHUNK_SIZE + 1]).unwrap();

        let (body, total) = UploadSource::File(path).open().await.unwrap();
        assert_eq!(total, UPLOAD_CHUNK_SIZE as u64 + 1);
        let read: usize = body
            .map(|c| c.unwrap().len())
            .fold(0, |a, n| async move { a + n })
            .await;
        assert_eq!(read, UPLOAD_CHUNK_SIZE + 1);
    }

    #[tokio::test]
    async fn test_ticks_stop_when_gate_closes() {
        let data = Bytes::from(vec![3u8; UPLOAD_CHUNK_SIZE * 3]);
        let (body, total) = UploadSource::Data(data).open().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let gate = ProgressGate::new(move |p| sink.lock().unwrap().push(p));
        let mut body = counted(body, total, gate.clone());

        assert!(body.next().await.is_some());
        gate.close();
        assert_eq!(body.count().await, 2);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![RxProgress::new(UPLOAD_CHUNK_SIZE as i64, total as i64)]);
    }

    #[tokio::test]
    async fn test_missing_file_source() {
        let result = UploadSource::File(PathBuf::from("/definitely/not/here.bin")).open().await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
