use crate::error::LandShapeError;
use crate::poller::{PollHandle, ResultPoller};
use crate::types::{PollEvent, SelectionSource, UploadEvent};
use crate::upload::{UploadController, UploadHandle};
use crate::view::{ViewAction, ViewState};
use std::path::Path;

/// An upload or poll event, after it has been applied to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Upload(UploadEvent),
    Poll(PollEvent),
}

/// One user's view: at most one upload and at most one poll session at a time.
///
/// Background tasks only send events; the view changes when the owner calls
/// [`Session::next_event`] or one of the user actions, so it is never touched from
/// two places at once. Leaving the processing view always cancels the poll session.
pub struct Session {
    uploader: UploadController,
    poller: ResultPoller,
    state: ViewState,
    upload: Option<UploadHandle>,
    poll: Option<PollHandle>,
}

impl Session {
    pub fn new(uploader: UploadController, poller: ResultPoller) -> Self {
        Self {
            uploader,
            poller,
            state: ViewState::Idle,
            upload: None,
            poll: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Whether an upload or poll session may still produce events.
    pub fn is_busy(&self) -> bool {
        self.upload.is_some() || self.poll.is_some()
    }

    /// Validates and selects a video file, replacing any previous selection.
    pub async fn select_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        source: SelectionSource,
    ) -> Result<&ViewState, LandShapeError> {
        let file = self.uploader.select(path, source).await?;
        self.apply(ViewAction::SelectFile(file))?;
        tracing::debug!(state = self.state.name(), "File selected");
        Ok(&self.state)
    }

    /// Removes the selected file.
    pub fn clear_file(&mut self) -> Result<&ViewState, LandShapeError> {
        self.apply(ViewAction::ClearFile)?;
        Ok(&self.state)
    }

    /// Starts uploading the selected file.
    pub fn upload(&mut self) -> Result<&ViewState, LandShapeError> {
        let ViewState::FileSelected { file } = &self.state else {
            return Err(LandShapeError::InvalidTransition {
                state: self.state.name(),
                action: ViewAction::StartUpload.name(),
            });
        };
        let file = file.clone();
        self.apply(ViewAction::StartUpload)?;
        self.upload = Some(self.uploader.submit(file));
        Ok(&self.state)
    }

    /// Switches to the processing view and starts looking for the model.
    ///
    /// The countdown restarts from the full budget every time.
    pub fn request_model(&mut self) -> Result<&ViewState, LandShapeError> {
        let budget_secs = self.poller.config().budget_ticks();
        let ViewState::Uploaded { video, .. } = &self.state else {
            return Err(LandShapeError::InvalidTransition {
                state: self.state.name(),
                action: ViewAction::RequestModel { budget_secs }.name(),
            });
        };
        let handle = self.poller.start(video.base_name.clone())?;
        self.apply(ViewAction::RequestModel { budget_secs })?;
        self.poll = Some(handle);
        Ok(&self.state)
    }

    /// Looks for the model right away.
    ///
    /// Returns `true` if the model was found, in which case the view has switched to it.
    /// Calling this while nothing is found leaves the view and the timers as they are.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::NoActiveSession` outside the processing view.
    pub async fn check_now(&mut self) -> Result<bool, LandShapeError> {
        if !self.state.is_processing() {
            return Err(LandShapeError::NoActiveSession);
        }
        let Some(poll) = self.poll.as_ref() else {
            return Err(LandShapeError::NoActiveSession);
        };
        if !poll.check_now().await {
            return Ok(false);
        }
        while let Some(event) = self.next_event().await {
            if matches!(event, SessionEvent::Poll(PollEvent::Found { .. })) {
                break;
            }
        }
        Ok(matches!(self.state, ViewState::ModelFound { .. }))
    }

    /// Goes back to the original video.
    ///
    /// From the model view the artifact is kept; from the processing view the poll
    /// session is cancelled and both of its timers stop before this returns.
    pub async fn view_original(&mut self) -> Result<&ViewState, LandShapeError> {
        self.apply(ViewAction::ViewOriginal)?;
        self.stop_polling().await;
        Ok(&self.state)
    }

    /// Shows a model that was found earlier, without polling again.
    pub fn show_model(&mut self) -> Result<&ViewState, LandShapeError> {
        self.apply(ViewAction::ShowModel)?;
        Ok(&self.state)
    }

    /// Waits for the next upload or poll event and applies it to the view.
    ///
    /// Returns `None` when nothing is running.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if let Some(upload) = self.upload.as_mut() {
            let event = upload.next_event().await.unwrap_or_else(|| UploadEvent::Failed {
                message: "upload ended without a result".to_string(),
            });
            self.on_upload_event(&event);
            return Some(SessionEvent::Upload(event));
        }

        if let Some(poll) = self.poll.as_mut() {
            let Some(event) = poll.next_event().await else {
                self.poll = None;
                return None;
            };
            self.on_poll_event(&event);
            return Some(SessionEvent::Poll(event));
        }

        None
    }

    /// Drives the session until the current upload has ended.
    pub async fn wait_for_upload(&mut self) -> Result<String, LandShapeError> {
        if self.upload.is_none() {
            return Err(LandShapeError::NoActiveUpload);
        }
        while let Some(event) = self.next_event().await {
            match event {
                SessionEvent::Upload(UploadEvent::Completed { url }) => return Ok(url),
                SessionEvent::Upload(UploadEvent::Failed { message }) => {
                    return Err(LandShapeError::Storage {
                        operation: "upload",
                        message,
                    })
                }
                _ => {}
            }
        }
        Err(LandShapeError::NoActiveUpload)
    }

    fn on_upload_event(&mut self, event: &UploadEvent) {
        let action = match event {
            UploadEvent::Progress { percent } => ViewAction::UploadProgress { percent: *percent },
            UploadEvent::Completed { url } => ViewAction::UploadCompleted { url: url.clone() },
            UploadEvent::Failed { .. } => ViewAction::UploadFailed,
        };
        if event.is_terminal() {
            self.upload = None;
        }
        self.apply_logged(action);
    }

    fn on_poll_event(&mut self, event: &PollEvent) {
        match event {
            PollEvent::Tick { remaining_secs } => {
                self.apply_logged(ViewAction::Tick {
                    remaining_secs: *remaining_secs,
                });
            }
            PollEvent::Found { artifact } => {
                self.poll = None;
                self.apply_logged(ViewAction::ModelFound(artifact.clone()));
            }
            PollEvent::BudgetExhausted => {}
        }
    }

    async fn stop_polling(&mut self) {
        if let Some(mut poll) = self.poll.take() {
            poll.stop().await;
        }
    }

    fn apply(&mut self, action: ViewAction) -> Result<(), LandShapeError> {
        self.state = self.state.transition(action)?;
        Ok(())
    }

    fn apply_logged(&mut self, action: ViewAction) {
        if let Err(e) = self.apply(action) {
            tracing::warn!(error = %e, "Ignoring event for a view that has moved on");
        }
    }
}
