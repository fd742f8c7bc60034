use crate::error::LandShapeError;
use crate::naming::{destination_key, validate_file_name};
use crate::storage::ObjectStorage;
use crate::types::{SelectedFile, SelectionSource, TransferProgress, UploadEvent, UploadJob};
use mime_guess::mime;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sends local video files to the object store.
///
/// Files are stored under `{prefix}/{file name}`. Each submission runs as its own
/// task and reports progress through an [`UploadHandle`].
#[derive(Clone)]
pub struct UploadController {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
}

impl UploadController {
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Validates a local file and prepares it for upload.
    ///
    /// Both selection sources only accept files whose guessed media type is `video/*`.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::InvalidFileName` if the path has no usable file name.
    /// - `LandShapeError::NotAVideo` if the file is not a video.
    /// - `LandShapeError::IoError` if the file does not exist or is not a regular file.
    pub async fn select<P: AsRef<Path>>(
        &self,
        path: P,
        source: SelectionSource,
    ) -> Result<SelectedFile, LandShapeError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LandShapeError::InvalidFileName(path.display().to_string()))?
            .to_string();
        validate_file_name(&file_name)?;

        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        if content_type.type_() != mime::VIDEO {
            return Err(LandShapeError::NotAVideo {
                file_name,
                content_type: content_type.to_string(),
            });
        }

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(LandShapeError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a regular file: {}", path.display()),
            )));
        }

        Ok(SelectedFile {
            path: path.to_path_buf(),
            file_name,
            content_type: content_type.to_string(),
            size_bytes: metadata.len(),
            source,
        })
    }

    /// The key `file` will be stored under.
    pub fn destination_key(&self, file: &SelectedFile) -> String {
        destination_key(&self.prefix, &file.file_name)
    }

    /// Starts uploading `file` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, file: SelectedFile) -> UploadHandle {
        let key = destination_key(&self.prefix, &file.file_name);
        let job = UploadJob::new(file, key);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            key = %job.destination_key,
            size_bytes = job.bytes_total,
            "Upload submitted"
        );

        let snapshot = job.clone();
        let storage = Arc::clone(&self.storage);
        let task = tokio::spawn(run_upload(storage, job, events_tx));

        UploadHandle {
            job: snapshot,
            events: events_rx,
            task,
        }
    }
}

/// A running upload.
///
/// Events arrive in order: non-decreasing `Progress` values, a `Progress` of 100,
/// then `Completed`; or `Failed` at any point.
pub struct UploadHandle {
    job: UploadJob,
    events: mpsc::UnboundedReceiver<UploadEvent>,
    task: JoinHandle<Result<UploadJob, LandShapeError>>,
}

impl UploadHandle {
    /// The job as it was submitted.
    pub fn job(&self) -> &UploadJob {
        &self.job
    }

    /// Waits for the next event. Returns `None` once the terminal event has been taken.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    /// Waits for the upload to end, discarding remaining events.
    ///
    /// Returns the finished job, whose `result_url` is set.
    pub async fn finish(mut self) -> Result<UploadJob, LandShapeError> {
        while self.events.recv().await.is_some() {}
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(LandShapeError::storage("upload", e)),
        }
    }
}

async fn run_upload(
    storage: Arc<dyn ObjectStorage>,
    mut job: UploadJob,
    events: mpsc::UnboundedSender<UploadEvent>,
) -> Result<UploadJob, LandShapeError> {
    let key = job.destination_key.clone();
    let path = job.file.path.clone();
    let content_type = job.file.content_type.clone();
    let mut last_percent: Option<f64> = None;

    let result = {
        let mut on_progress = |progress: TransferProgress| {
            job.bytes_total = progress.bytes_total;
            job.bytes_transferred = job.bytes_transferred.max(progress.bytes_transferred);
            let percent = job.percent();
            if last_percent.map_or(true, |last| percent > last) {
                last_percent = Some(percent);
                let _ = events.send(UploadEvent::Progress { percent });
            }
        };
        storage
            .put_resumable(&key, &path, &content_type, &mut on_progress)
            .await
    };

    let result = match result {
        Ok(()) => storage.download_url(&key).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(url) => {
            if last_percent.map_or(true, |last| last < 100.0) {
                let _ = events.send(UploadEvent::Progress { percent: 100.0 });
            }
            job.bytes_transferred = job.bytes_total;
            job.result_url = Some(url.clone());
            tracing::info!(key = %key, "Upload completed");
            let _ = events.send(UploadEvent::Completed { url });
            Ok(job)
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Upload failed");
            let _ = events.send(UploadEvent::Failed {
                message: e.to_string(),
            });
            Err(e)
        }
    }
}
