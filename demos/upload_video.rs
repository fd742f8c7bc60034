//! This example demonstrates how to upload a local video file:
//! 1. Validating the file and computing its destination key.
//! 2. Uploading it while printing progress.
//! 3. Printing the URL the uploaded video can be fetched from.
//!
//! To run this example, you must have the `LANDSHAPE_BUCKET` environment variable set,
//! plus AWS credentials (or `LANDSHAPE_ACCESS_KEY_ID` and `LANDSHAPE_SECRET_ACCESS_KEY`).
//!
//! Usage:
//! `cargo run --example upload_video <VIDEO_PATH>`

use landshape::{LandShapeClient, SelectionSource, UploadEvent};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Reads a .env file if it exists, then the LANDSHAPE_* variables.
    let client = LandShapeClient::from_env().await?;

    let video_path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide a video path as a command-line argument."))?;

    // 1. Validate the file.
    let uploader = client.uploader();
    let file = uploader
        .select(&video_path, SelectionSource::ClickToBrowse)
        .await?;
    println!(
        "Uploading '{}' ({}, {} bytes) to '{}'",
        file.file_name,
        file.content_type,
        file.size_bytes,
        uploader.destination_key(&file)
    );

    // 2. Upload and print progress.
    let mut handle = uploader.submit(file);
    while let Some(event) = handle.next_event().await {
        match event {
            UploadEvent::Progress { percent } => println!("Uploading: {:.1}%", percent),
            UploadEvent::Completed { url } => println!("\nUpload complete!\n-> URL: {}", url),
            UploadEvent::Failed { message } => eprintln!("\nUpload failed: {}", message),
        }
    }

    Ok(())
}
