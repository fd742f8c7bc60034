//! Waiting for the processing pipeline's output.
//!
//! A poll session runs one task that owns both the one-second display countdown and
//! the periodic lookup. Cancelling the session, or finding the artifact, ends that
//! task and with it both timers.

use crate::config::{LookupStrategy, PollConfig};
use crate::error::LandShapeError;
use crate::naming::{artifact_kind_for, expected_artifact_keys, listing_prefix};
use crate::storage::ObjectStorage;
use crate::types::{ArtifactReference, PollEvent, PollSession};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Looks up artifacts and runs poll sessions against a storage backend.
#[derive(Clone)]
pub struct ResultPoller {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
    config: PollConfig,
}

impl ResultPoller {
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: impl Into<String>, config: PollConfig) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Looks for the artifact of `base_name` once, propagating storage errors.
    ///
    /// With [`LookupStrategy::Scan`] the first matching name in listing order wins.
    /// With [`LookupStrategy::Direct`] the `.usdz` key is checked before the `.mp4` key.
    pub async fn lookup(&self, base_name: &str) -> Result<Option<ArtifactReference>, LandShapeError> {
        let candidate = match self.config.lookup {
            LookupStrategy::Scan => {
                let entries = self.storage.list(&listing_prefix(&self.prefix)).await?;
                tracing::debug!(
                    base_name = %base_name,
                    objects = ?entries.iter().map(|e| e.name()).collect::<Vec<_>>(),
                    "Scanning listing for artifact"
                );
                entries.into_iter().find_map(|entry| {
                    artifact_kind_for(entry.name(), base_name, &self.config.marker)
                        .map(|kind| (entry.key, kind))
                })
            }
            LookupStrategy::Direct => {
                let mut found = None;
                for (key, kind) in expected_artifact_keys(&self.prefix, base_name, &self.config.marker) {
                    if self.storage.exists(&key).await? {
                        found = Some((key, kind));
                        break;
                    }
                }
                found
            }
        };

        let Some((key, kind)) = candidate else {
            return Ok(None);
        };

        let url = self.storage.download_url(&key).await?;
        let name = key.rsplit('/').next().unwrap_or(&key).to_string();
        Ok(Some(ArtifactReference {
            key,
            name,
            url,
            kind,
            found_at: Utc::now(),
        }))
    }

    /// Looks for the artifact once. Errors are logged and count as "not found yet".
    pub async fn check_once(&self, base_name: &str) -> Option<ArtifactReference> {
        match self.lookup(base_name).await {
            Ok(Some(artifact)) => {
                tracing::info!(base_name = %base_name, key = %artifact.key, kind = ?artifact.kind, "Artifact found");
                Some(artifact)
            }
            Ok(None) => {
                tracing::debug!(base_name = %base_name, "No artifact yet");
                None
            }
            Err(e) => {
                tracing::warn!(base_name = %base_name, error = %e, "Artifact lookup failed");
                None
            }
        }
    }

    /// Starts a poll session for `base_name`.
    ///
    /// Must be called from within a Tokio runtime. The session emits a `Tick` every
    /// second until the budget runs out, and looks for the artifact every check
    /// interval, the first time one interval after the start.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::InvalidFileName` if `base_name` is empty, since an empty
    ///   base name would match every artifact.
    /// - `LandShapeError::InvalidConfig` if the check interval is zero.
    pub fn start(&self, base_name: impl Into<String>) -> Result<PollHandle, LandShapeError> {
        let base_name = base_name.into();
        if base_name.is_empty() {
            return Err(LandShapeError::InvalidFileName(base_name));
        }
        if self.config.check_interval.is_zero() {
            return Err(LandShapeError::InvalidConfig {
                name: "check_interval",
                value: format!("{:?}", self.config.check_interval),
            });
        }

        let session = PollSession {
            base_name: base_name.clone(),
            remaining_secs: self.config.budget_ticks(),
            found: None,
            started_at: Utc::now(),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        tracing::info!(
            base_name = %base_name,
            budget_secs = session.remaining_secs,
            check_interval_secs = self.config.check_interval.as_secs(),
            "Poll session started"
        );

        let task = tokio::spawn(run_session(
            self.clone(),
            session,
            events_tx,
            commands_rx,
            cancel.clone(),
        ));

        Ok(PollHandle {
            base_name,
            events: events_rx,
            commands: commands_tx,
            cancel,
            task: Some(task),
        })
    }
}

type CheckRequest = oneshot::Sender<bool>;

/// A running poll session.
///
/// Dropping the handle cancels the session.
pub struct PollHandle {
    base_name: String,
    events: mpsc::UnboundedReceiver<PollEvent>,
    commands: mpsc::Sender<CheckRequest>,
    cancel: CancellationToken,
    task: Option<JoinHandle<PollSession>>,
}

impl PollHandle {
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Waits for the next event. Returns `None` once the session has ended and
    /// every event has been taken.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Runs a lookup immediately, outside the regular interval.
    ///
    /// If a lookup is already running, a fresh one starts as soon as it ends.
    /// Returns `true` if this check found the artifact, in which case a `Found` event
    /// has been emitted and the session has ended. Returns `false` when nothing was
    /// found or the session is no longer running.
    pub async fn check_now(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(reply_tx).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Stops both timers. No tick or lookup starts after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancels the session and waits for its task to exit.
    ///
    /// Returns the final session state, or `None` if it was already collected.
    pub async fn stop(&mut self) -> Option<PollSession> {
        self.cancel.cancel();
        let task = self.task.take()?;
        match task.await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(base_name = %self.base_name, error = %e, "Poll task did not exit cleanly");
                None
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    poller: ResultPoller,
    mut session: PollSession,
    events: mpsc::UnboundedSender<PollEvent>,
    mut commands: mpsc::Receiver<CheckRequest>,
    cancel: CancellationToken,
) -> PollSession {
    let start = Instant::now();
    let check_interval = poller.config.check_interval;
    let mut countdown = time::interval_at(start + COUNTDOWN_STEP, COUNTDOWN_STEP);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut checks = time::interval_at(start + check_interval, check_interval);
    checks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut counting = session.remaining_secs > 0;
    let mut lookups = Lookups::new(poller, session.base_name.clone());

    if !counting {
        lookups.final_check = FinalCheck::Due;
        lookups.start_next();
    }

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!(base_name = %session.base_name, "Poll session cancelled");
                break;
            }

            found = lookups.next_result(), if lookups.is_running() => {
                if let Some(artifact) = found {
                    session.found = Some(artifact.clone());
                    let _ = events.send(PollEvent::Found { artifact });
                    lookups.answer_all(true);
                    break;
                }
                lookups.answer(false);
                if lookups.final_check == FinalCheck::Running {
                    lookups.final_check = FinalCheck::Done;
                    tracing::info!(base_name = %session.base_name, "Poll budget exhausted without a match");
                    let _ = events.send(PollEvent::BudgetExhausted);
                }
                lookups.start_next();
            }

            request = commands.recv() => {
                let Some(reply) = request else { break };
                lookups.request(reply);
            }

            _ = countdown.tick(), if counting => {
                session.remaining_secs = session.remaining_secs.saturating_sub(1);
                let _ = events.send(PollEvent::Tick { remaining_secs: session.remaining_secs });
                if session.remaining_secs == 0 {
                    counting = false;
                    lookups.final_check = FinalCheck::Due;
                    lookups.start_next();
                }
            }

            _ = checks.tick(), if counting => {
                lookups.start_periodic();
            }
        }
    }

    session
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalCheck {
    NotDue,
    Due,
    Running,
    Done,
}

/// The lookups of one poll session. At most one runs at a time, and it is polled
/// alongside the timers so a slow listing never holds up a tick or a cancellation.
struct Lookups {
    poller: ResultPoller,
    base_name: String,
    running: Option<BoxFuture<'static, Option<ArtifactReference>>>,
    /// Check requests answered by the running lookup.
    replies: Vec<CheckRequest>,
    /// Check requests that arrived mid-lookup and wait for a fresh one.
    queued: Vec<CheckRequest>,
    final_check: FinalCheck,
}

impl Lookups {
    fn new(poller: ResultPoller, base_name: String) -> Self {
        Self {
            poller,
            base_name,
            running: None,
            replies: Vec::new(),
            queued: Vec::new(),
            final_check: FinalCheck::NotDue,
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Waits for the running lookup. The lookup survives if this future is dropped.
    async fn next_result(&mut self) -> Option<ArtifactReference> {
        let found = match self.running.as_mut() {
            Some(lookup) => lookup.await,
            None => std::future::pending().await,
        };
        self.running = None;
        found
    }

    fn request(&mut self, reply: CheckRequest) {
        if self.is_running() {
            self.queued.push(reply);
        } else {
            self.replies.push(reply);
            self.launch();
        }
    }

    fn start_periodic(&mut self) {
        if self.is_running() {
            tracing::debug!(base_name = %self.base_name, "Previous lookup still running, skipping check");
            return;
        }
        self.launch();
    }

    /// Starts the final check or a queued manual check once nothing is running.
    fn start_next(&mut self) {
        if self.is_running() {
            return;
        }
        if self.final_check == FinalCheck::Due {
            self.final_check = FinalCheck::Running;
        } else if self.queued.is_empty() {
            return;
        }
        self.replies.append(&mut self.queued);
        self.launch();
    }

    fn answer(&mut self, found: bool) {
        for reply in self.replies.drain(..) {
            let _ = reply.send(found);
        }
    }

    fn answer_all(&mut self, found: bool) {
        self.replies.append(&mut self.queued);
        self.answer(found);
    }

    fn launch(&mut self) {
        let poller = self.poller.clone();
        let base_name = self.base_name.clone();
        self.running = Some(async move { poller.check_once(&base_name).await }.boxed());
    }
}
