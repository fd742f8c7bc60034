//! This example demonstrates a wait-and-download workflow:
//! 1. Taking the name of an uploaded video from the command line.
//! 2. Polling the bucket until its model shows up or the countdown runs out.
//! 3. Downloading the model to a temporary directory if it was found.
//!
//! To run this example, you must have the `LANDSHAPE_BUCKET` environment variable set.
//!
//! Usage:
//! `cargo run --example wait_for_model <VIDEO_FILE_NAME>`

use landshape::naming::{base_name, format_countdown};
use landshape::{LandShapeClient, PollEvent};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = LandShapeClient::from_env().await?;

    // 1. The artifact is matched on the video's name without its extension.
    let file_name = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide a video file name as a command-line argument."))?;
    let base = base_name(&file_name).to_string();

    // 2. Poll until the model is found. After the countdown, one last check is made.
    println!("Waiting for the model of `{}`...", file_name);
    let mut handle = client.poller().start(base)?;
    let mut found = None;
    while let Some(event) = handle.next_event().await {
        match event {
            PollEvent::Tick { remaining_secs } => {
                if remaining_secs % 10 == 0 {
                    println!("Time remaining: {}", format_countdown(remaining_secs));
                }
            }
            PollEvent::Found { artifact } => {
                found = Some(artifact);
                break;
            }
            PollEvent::BudgetExhausted => break,
        }
    }
    handle.stop().await;

    // 3. Download the model.
    let Some(artifact) = found else {
        println!("\nThe model is not ready yet. Try again later.");
        return Ok(());
    };
    println!("\nModel found: {} ({:?})", artifact.name, artifact.kind);

    let temp_dir = tempfile::Builder::new()
        .prefix("landshape_download_")
        .tempdir()?;
    match client.download_artifact(&artifact, temp_dir.path()).await {
        Ok(path) => println!("Downloaded to {}", path.display()),
        Err(e) => eprintln!("\nFailed to download the model: {}", e),
    }

    Ok(())
}
