use crate::config::LandShapeConfig;
use crate::error::LandShapeError;
use crate::naming::validate_file_name;
use crate::poller::ResultPoller;
use crate::session::Session;
use crate::storage::{ObjectStorage, S3Storage};
use crate::types::ArtifactReference;
use crate::upload::UploadController;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// The entry point of the crate.
///
/// It owns the storage backend and the configuration, and hands them to the upload
/// controller, the result poller and sessions it creates. It is cheap to clone and
/// safe to share across tasks.
#[derive(Clone)]
pub struct LandShapeClient {
    storage: Arc<dyn ObjectStorage>,
    http: reqwest::Client,
    config: LandShapeConfig,
}

impl LandShapeClient {
    /// Creates a client backed by S3 (or an S3-compatible service) as configured.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::MissingBucket` if no bucket is configured.
    /// - `LandShapeError::RequestFailed` if the internal HTTP client fails to build.
    pub async fn new(config: LandShapeConfig) -> Result<Self, LandShapeError> {
        let storage = S3Storage::connect(&config).await?;
        Self::with_storage(Arc::new(storage), config)
    }

    /// Creates a client from `LANDSHAPE_*` environment variables.
    ///
    /// See [`LandShapeConfig::from_env`] for the variables read.
    pub async fn from_env() -> Result<Self, LandShapeError> {
        Self::new(LandShapeConfig::from_env()?).await
    }

    /// Creates a client around any storage backend.
    ///
    /// This is useful for testing or for backends other than S3.
    pub fn with_storage(
        storage: Arc<dyn ObjectStorage>,
        config: LandShapeConfig,
    ) -> Result<Self, LandShapeError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            storage,
            http,
            config,
        })
    }

    pub fn config(&self) -> &LandShapeConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn uploader(&self) -> UploadController {
        UploadController::new(Arc::clone(&self.storage), self.config.prefix.clone())
    }

    pub fn poller(&self) -> ResultPoller {
        ResultPoller::new(
            Arc::clone(&self.storage),
            self.config.prefix.clone(),
            self.config.poll.clone(),
        )
    }

    /// Starts a new session in the idle state.
    pub fn session(&self) -> Session {
        Session::new(self.uploader(), self.poller())
    }

    /// Downloads an artifact into `dest_dir`.
    ///
    /// The file keeps the artifact's object name. The directory is created if needed.
    ///
    /// # Returns
    ///
    /// The path of the written file.
    ///
    /// # Errors
    ///
    /// This function can return an error if the URL is invalid, the request fails or
    /// returns a non-success status, or the file cannot be written.
    pub async fn download_artifact<P: AsRef<Path>>(
        &self,
        artifact: &ArtifactReference,
        dest_dir: P,
    ) -> Result<PathBuf, LandShapeError> {
        let url = Url::parse(&artifact.url)?;
        let file_name = match validate_file_name(&artifact.name) {
            Ok(()) => artifact.name.clone(),
            Err(_) => format!("artifact.{}", artifact.kind.extension()),
        };

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LandShapeError::DownloadFailed {
                status: response.status().as_u16(),
            });
        }

        fs::create_dir_all(dest_dir.as_ref()).await?;
        let file_path = dest_dir.as_ref().join(file_name);
        let mut file = fs::File::create(&file_path).await?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(
            key = %artifact.key,
            path = %file_path.display(),
            size_bytes = written,
            "Artifact downloaded"
        );
        Ok(file_path)
    }
}
