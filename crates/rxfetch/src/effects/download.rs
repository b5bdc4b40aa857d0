use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::core::ResponseSerializer;
use crate::data::{Destination, DownloadOptions, DownloadResponse, RxProgress, Transfer};
use crate::effects::observable::Observable;
use crate::effects::request::request_builder_methods;
use crate::effects::session::Session;
use crate::effects::transport::{self, RequestParts};
use crate::error::{Error, Result};

/// A request whose body is streamed to disk.
///
/// The body is written to a temporary file first. Once complete, the
/// [`Destination`] decides where it goes; without one the temporary file is
/// kept and its path reported.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    session: Session,
    parts: RequestParts,
    destination: Option<Destination>,
}

impl DownloadRequest {
    pub(crate) fn new(session: Session, parts: RequestParts) -> Self {
        Self {
            session,
            parts,
            destination: None,
        }
    }

    request_builder_methods!();

    /// Where the finished file is moved.
    #[must_use]
    pub fn to(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Emits the response and the final file location.
    pub fn response(&self) -> Observable<DownloadResponse> {
        let request = self.clone();
        Observable::create(move |emitter| {
            let request = request.clone();
            async move {
                let result = request.perform(|_| {}).await?;
                emitter.next(result);
                Ok(())
            }
        })
    }

    /// Downloads, then reads the placed file back through `serializer`.
    pub fn response_serialized<S: ResponseSerializer>(
        &self,
        serializer: S,
    ) -> Observable<DownloadResponse<S::Output>> {
        let request = self.clone();
        let serializer = Arc::new(serializer);
        Observable::create(move |emitter| {
            let request = request.clone();
            let serializer = Arc::clone(&serializer);
            async move {
                let download = request.perform(|_| {}).await?;
                let body = Bytes::from(tokio::fs::read(&download.file).await?);
                let value = serializer
                    .serialize(&request.parts.method, &download.response, body)
                    .map_err(|e| Error::decode(e, &download.response))?;
                emitter.next(download.map(|()| value));
                Ok(())
            }
        })
    }

    /// Like [`response`](Self::response), preceded by a progress item for
    /// every chunk written to disk.
    pub fn progress(&self) -> Observable<Transfer<DownloadResponse>> {
        let request = self.clone();
        Observable::create(move |emitter| {
            let request = request.clone();
            async move {
                let result = request
                    .perform(|p| {
                        emitter.next(Transfer::Progress(p));
                    })
                    .await?;
                emitter.next(Transfer::Completed(result));
                Ok(())
            }
        })
    }

    async fn perform(&self, on_progress: impl FnMut(RxProgress)) -> Result<DownloadResponse> {
        let (response, meta) = transport::send(self.session.client(), &self.parts, None).await?;

        let staging = tempfile::Builder::new()
            .prefix("rxfetch-")
            .suffix(".download")
            .tempfile()?;
        let mut file = tokio::fs::File::from_std(staging.reopen()?);
        let temp_path = staging.into_temp_path();

        let written = transport::write_body(response, &meta, &mut file, on_progress).await?;
        drop(file);
        debug!(bytes = written, path = %temp_path.display(), "download staged");

        let file = match &self.destination {
            Some(destination) => {
                let (path, options) = destination.resolve(&temp_path, &meta);
                place(temp_path, &path, options).await?;
                path
            }
            None => temp_path.keep().map_err(|e| Error::Destination {
                path: e.path.to_path_buf(),
                source: e.error,
            })?,
        };

        debug!(path = %file.display(), "download placed");
        Ok(DownloadResponse {
            response: meta,
            file,
            value: (),
        })
    }
}

/// Move a staged download to `destination`, honouring `options`.
///
/// Falls back to copying when the staging area and the destination live on
/// different filesystems. The staged file is removed either way once
/// `staged` drops.
async fn place(staged: TempPath, destination: &Path, options: DownloadOptions) -> Result<()> {
    let destination_error = |source: std::io::Error| Error::Destination {
        path: destination.to_path_buf(),
        source,
    };

    if options.create_intermediate_directories
        && let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await.map_err(destination_error)?;
    }

    if tokio::fs::try_exists(destination).await.map_err(destination_error)? {
        if !options.remove_previous_file {
            return Err(Error::DestinationExists(destination.to_path_buf()));
        }
        tokio::fs::remove_file(destination).await.map_err(destination_error)?;
    }

    let staged_path: PathBuf = staged.to_path_buf();
    if let Err(e) = tokio::fs::rename(&staged_path, destination).await {
        warn!(error = %e, "rename failed, copying download instead");
        tokio::fs::copy(&staged_path, destination).await.map_err(destination_error)?;
    }
    drop(staged);
    Ok(())
}
