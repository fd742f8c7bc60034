//! Upload videos to object storage and wait for the 3D model made from them.
//!
//! An external processing pipeline watches a bucket prefix for uploaded videos and
//! writes a `.usdz` model (or an `.mp4` rendering of it) next to each one. This crate
//! covers the client side of that exchange: it sends the video, then looks for the
//! output object until it shows up.
//!
//! ## Features
//! - Video selection with media-type checks, for both browse and drag-and-drop entry.
//! - Uploads with progress events; multipart for large files.
//! - Poll sessions with a display countdown, periodic lookups and manual re-checks,
//!   all cancelled together.
//! - A view state machine that tracks what the user is looking at.
//! - S3 (and S3-compatible) storage, plus an in-memory backend for tests.
//! - Artifact downloads.
//!
//! ```no_run
//! # use landshape::{LandShapeClient, SelectionSource};
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let client = LandShapeClient::from_env().await?;
//! let file = client.uploader().select("beach_house.mp4", SelectionSource::ClickToBrowse).await?;
//! let job = client.uploader().submit(file).finish().await?;
//! println!("Uploaded to {:?}", job.result_url);
//!
//! if let Some(artifact) = client.poller().check_once("beach_house").await {
//!     println!("Model ready: {}", artifact.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod naming;
pub mod poller;
pub mod session;
pub mod storage;
pub mod types;
pub mod upload;
pub mod view;

pub use client::LandShapeClient;
pub use config::{LandShapeConfig, LookupStrategy, PollConfig, StaticCredentials};
pub use error::LandShapeError;
pub use poller::{PollHandle, ResultPoller};
pub use session::{Session, SessionEvent};
pub use storage::{MemoryStorage, ObjectStorage, S3Storage};
pub use types::{
    ArtifactKind, ArtifactReference, ObjectEntry, PollEvent, PollSession, SelectedFile,
    SelectionSource, TransferProgress, UploadEvent, UploadJob,
};
pub use upload::{UploadController, UploadHandle};
pub use view::{UploadedVideo, ViewAction, ViewState};
