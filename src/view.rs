//! What the user is looking at, as a state machine.
//!
//! Transitions are pure: [`ViewState::transition`] returns the next state or an
//! `InvalidTransition` error and never performs I/O. Starting and stopping uploads
//! and poll sessions is up to the [`Session`](crate::Session).

use crate::error::LandShapeError;
use crate::naming::base_name;
use crate::types::{ArtifactReference, SelectedFile};
use serde::Serialize;

/// An uploaded video and the correlation key for its artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedVideo {
    pub file_name: String,
    pub base_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    Idle,
    FileSelected {
        file: SelectedFile,
    },
    Uploading {
        file: SelectedFile,
        percent: f64,
    },
    /// The original video is shown. `artifact` is kept when returning from the model view.
    Uploaded {
        video: UploadedVideo,
        artifact: Option<ArtifactReference>,
    },
    Processing {
        video: UploadedVideo,
        remaining_secs: u64,
    },
    ModelFound {
        video: UploadedVideo,
        artifact: ArtifactReference,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    SelectFile(SelectedFile),
    ClearFile,
    StartUpload,
    UploadProgress { percent: f64 },
    UploadCompleted { url: String },
    UploadFailed,
    RequestModel { budget_secs: u64 },
    Tick { remaining_secs: u64 },
    ModelFound(ArtifactReference),
    ViewOriginal,
    ShowModel,
}

impl ViewAction {
    pub fn name(&self) -> &'static str {
        match self {
            ViewAction::SelectFile(_) => "select a file",
            ViewAction::ClearFile => "clear the file",
            ViewAction::StartUpload => "start an upload",
            ViewAction::UploadProgress { .. } => "report upload progress",
            ViewAction::UploadCompleted { .. } => "complete an upload",
            ViewAction::UploadFailed => "fail an upload",
            ViewAction::RequestModel { .. } => "request the model",
            ViewAction::Tick { .. } => "count down",
            ViewAction::ModelFound(_) => "show a found model",
            ViewAction::ViewOriginal => "view the original video",
            ViewAction::ShowModel => "show the model",
        }
    }
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::FileSelected { .. } => "a file is selected",
            ViewState::Uploading { .. } => "uploading",
            ViewState::Uploaded { .. } => "showing the uploaded video",
            ViewState::Processing { .. } => "processing",
            ViewState::ModelFound { .. } => "showing the model",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, ViewState::Processing { .. })
    }

    /// The uploaded video, in every state after the upload has completed.
    pub fn video(&self) -> Option<&UploadedVideo> {
        match self {
            ViewState::Uploaded { video, .. }
            | ViewState::Processing { video, .. }
            | ViewState::ModelFound { video, .. } => Some(video),
            _ => None,
        }
    }

    /// The artifact that is shown or kept for showing again.
    pub fn artifact(&self) -> Option<&ArtifactReference> {
        match self {
            ViewState::Uploaded { artifact, .. } => artifact.as_ref(),
            ViewState::ModelFound { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    /// Computes the state that follows `action`.
    ///
    /// # Errors
    ///
    /// `LandShapeError::InvalidTransition` if `action` is not allowed in this state.
    pub fn transition(&self, action: ViewAction) -> Result<ViewState, LandShapeError> {
        let next = match (self, action) {
            (
                ViewState::Idle
                | ViewState::FileSelected { .. }
                | ViewState::Uploaded { .. }
                | ViewState::ModelFound { .. },
                ViewAction::SelectFile(file),
            ) => ViewState::FileSelected { file },

            (ViewState::FileSelected { .. }, ViewAction::ClearFile) => ViewState::Idle,

            (ViewState::FileSelected { file }, ViewAction::StartUpload) => ViewState::Uploading {
                file: file.clone(),
                percent: 0.0,
            },

            (ViewState::Uploading { file, percent }, ViewAction::UploadProgress { percent: next }) => {
                ViewState::Uploading {
                    file: file.clone(),
                    percent: percent.max(next.clamp(0.0, 100.0)),
                }
            }

            (ViewState::Uploading { file, .. }, ViewAction::UploadCompleted { url }) => {
                ViewState::Uploaded {
                    video: UploadedVideo {
                        file_name: file.file_name.clone(),
                        base_name: base_name(&file.file_name).to_string(),
                        url,
                    },
                    artifact: None,
                }
            }

            (ViewState::Uploading { file, .. }, ViewAction::UploadFailed) => {
                ViewState::FileSelected { file: file.clone() }
            }

            (ViewState::Uploaded { video, .. }, ViewAction::RequestModel { budget_secs }) => {
                ViewState::Processing {
                    video: video.clone(),
                    remaining_secs: budget_secs,
                }
            }

            (ViewState::Processing { video, .. }, ViewAction::Tick { remaining_secs }) => {
                ViewState::Processing {
                    video: video.clone(),
                    remaining_secs,
                }
            }

            (ViewState::Processing { video, .. }, ViewAction::ModelFound(artifact)) => {
                ViewState::ModelFound {
                    video: video.clone(),
                    artifact,
                }
            }

            (ViewState::ModelFound { video, artifact }, ViewAction::ViewOriginal) => {
                ViewState::Uploaded {
                    video: video.clone(),
                    artifact: Some(artifact.clone()),
                }
            }

            (ViewState::Processing { video, .. }, ViewAction::ViewOriginal) => ViewState::Uploaded {
                video: video.clone(),
                artifact: None,
            },

            (
                ViewState::Uploaded {
                    video,
                    artifact: Some(artifact),
                },
                ViewAction::ShowModel,
            ) => ViewState::ModelFound {
                video: video.clone(),
                artifact: artifact.clone(),
            },

            (state, action) => {
                return Err(LandShapeError::InvalidTransition {
                    state: state.name(),
                    action: action.name(),
                })
            }
        };
        Ok(next)
    }
}
