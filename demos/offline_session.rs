//! This example walks through a whole session against in-memory storage, so it needs
//! no bucket or credentials:
//! 1. Selecting and uploading a video.
//! 2. Requesting the model and letting a simulated pipeline produce it.
//! 3. Switching between the model and the original video.
//!
//! Every view state is printed as JSON.
//!
//! Usage:
//! `cargo run --example offline_session`

use landshape::naming::format_countdown;
use landshape::{
    LandShapeClient, LandShapeConfig, MemoryStorage, PollEvent, SelectionSource, SessionEvent,
    ViewState,
};
use std::sync::Arc;
use std::time::Duration;

fn show(state: &ViewState) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let storage = MemoryStorage::with_chunk_size(64 * 1024);
    let mut config = LandShapeConfig::new("offline");
    config.poll.budget = Duration::from_secs(10);
    config.poll.check_interval = Duration::from_secs(3);
    let client = LandShapeClient::with_storage(Arc::new(storage.clone()), config)?;

    let dir = tempfile::tempdir()?;
    let video_path = dir.path().join("beach_house.mp4");
    std::fs::write(&video_path, vec![0u8; 512 * 1024])?;

    // 1. Select and upload.
    let mut session = client.session();
    session
        .select_file(&video_path, SelectionSource::DragAndDrop)
        .await?;
    session.upload()?;
    let url = session.wait_for_upload().await?;
    println!("Uploaded to {}", url);
    show(session.state())?;

    // 2. The pipeline writes the model a few seconds after the request.
    let pipeline = storage.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        pipeline.insert("videos/beach_house_model.usdz", b"#usda 1.0".to_vec());
    });

    session.request_model()?;
    while let Some(event) = session.next_event().await {
        match event {
            SessionEvent::Poll(PollEvent::Tick { remaining_secs }) => {
                println!("Time remaining: {}", format_countdown(remaining_secs));
            }
            SessionEvent::Poll(PollEvent::BudgetExhausted) => {
                println!("Countdown over, checking manually...");
                if !session.check_now().await? {
                    println!("Still processing.");
                }
                break;
            }
            SessionEvent::Poll(PollEvent::Found { .. }) => break,
            SessionEvent::Upload(_) => {}
        }
    }
    show(session.state())?;

    // 3. Back and forth between the two views.
    if session.state().artifact().is_some() {
        session.view_original().await?;
        show(session.state())?;
        session.show_model()?;
        show(session.state())?;
    }

    Ok(())
}
