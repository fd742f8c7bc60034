/// Errors returned by the upload, polling and download operations.
#[derive(Debug, thiserror::Error)]
pub enum LandShapeError {
    #[error("Storage bucket is missing. Please set the LANDSHAPE_BUCKET environment variable.")]
    MissingBucket,
    #[error("Invalid value for {name}: {value:?}")]
    InvalidConfig { name: &'static str, value: String },
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
    #[error("Not a video file: {file_name} ({content_type})")]
    NotAVideo {
        file_name: String,
        content_type: String,
    },
    #[error("Storage {operation} failed: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("No upload is in progress")]
    NoActiveUpload,
    #[error("No poll session is active")]
    NoActiveSession,
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Download failed with status {status}")]
    DownloadFailed { status: u16 },
}

impl LandShapeError {
    pub(crate) fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        LandShapeError::Storage {
            operation,
            message: err.to_string(),
        }
    }
}
