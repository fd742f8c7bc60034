use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the user picked the file to upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// The file was chosen through a file browser.
    ClickToBrowse,
    /// The file was dropped onto the upload target.
    DragAndDrop,
}

/// A local video file accepted for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    /// Path of the file on the local filesystem.
    pub path: PathBuf,
    /// The original file name, including its extension.
    pub file_name: String,
    /// The media type guessed from the file extension, e.g. `video/mp4`.
    pub content_type: String,
    /// Size of the file in bytes at selection time.
    pub size_bytes: u64,
    /// How the file was selected.
    pub source: SelectionSource,
}

/// Byte counters reported by a storage backend while a transfer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub bytes_total: u64,
}

/// The state of a single file transfer.
#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    /// The file being uploaded.
    pub file: SelectedFile,
    /// The object key the file is stored under.
    pub destination_key: String,
    /// Bytes confirmed by the storage backend so far.
    pub bytes_transferred: u64,
    /// Total bytes to transfer.
    pub bytes_total: u64,
    /// The retrievable URL, once the transfer has finished.
    pub result_url: Option<String>,
    /// When the transfer was submitted.
    pub started_at: DateTime<Utc>,
}

impl UploadJob {
    pub(crate) fn new(file: SelectedFile, destination_key: String) -> Self {
        let bytes_total = file.size_bytes;
        Self {
            file,
            destination_key,
            bytes_transferred: 0,
            bytes_total,
            result_url: None,
            started_at: Utc::now(),
        }
    }

    /// Transfer progress as a percentage from 0 to 100.
    ///
    /// An empty file counts as fully transferred.
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        let ratio = self.bytes_transferred as f64 / self.bytes_total as f64;
        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

/// Events emitted by an upload, in order.
///
/// Zero or more `Progress` events are followed by exactly one `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Progress { percent: f64 },
    Completed { url: String },
    Failed { message: String },
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress { .. })
    }
}

/// The kind of artifact produced by the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A `.usdz` scene, viewable in AR Quick Look or a compatible 3D viewer.
    Interactive3dAsset,
    /// An `.mp4` rendering of the model.
    PlayableVideo,
}

impl ArtifactKind {
    /// The file extension (without the dot) that identifies this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Interactive3dAsset => "usdz",
            ArtifactKind::PlayableVideo => "mp4",
        }
    }
}

/// A located output object of the processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactReference {
    /// The full object key.
    pub key: String,
    /// The object name, i.e. the last segment of the key.
    pub name: String,
    /// A URL the artifact can be fetched from.
    pub url: String,
    pub kind: ArtifactKind,
    pub found_at: DateTime<Utc>,
}

/// The state of a running result search.
#[derive(Debug, Clone, Serialize)]
pub struct PollSession {
    /// The correlation key between the uploaded video and its artifact.
    pub base_name: String,
    /// Seconds left on the display countdown.
    pub remaining_secs: u64,
    /// The artifact, once found.
    pub found: Option<ArtifactReference>,
    pub started_at: DateTime<Utc>,
}

/// Events emitted by a poll session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// The countdown moved by one second.
    Tick { remaining_secs: u64 },
    /// The artifact was located; the session has ended.
    Found { artifact: ArtifactReference },
    /// The countdown hit zero and the final check found nothing.
    /// Manual checks are still accepted.
    BudgetExhausted,
}

/// An entry returned by a storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: Option<u64>,
}

impl ObjectEntry {
    /// The object name: everything after the last `/` of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}
