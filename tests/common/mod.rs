#![allow(dead_code)]

use landshape::{LandShapeClient, LandShapeConfig, MemoryStorage, PollConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Writes `len` bytes to `dir/name` and returns the path.
pub fn video_file(dir: &TempDir, name: &str, len: usize) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, vec![0x42u8; len]).unwrap();
    path
}

pub fn poll_config(budget_secs: u64, interval_secs: u64) -> PollConfig {
    PollConfig {
        budget: Duration::from_secs(budget_secs),
        check_interval: Duration::from_secs(interval_secs),
        ..Default::default()
    }
}

pub fn memory_client(storage: &MemoryStorage, poll: PollConfig) -> LandShapeClient {
    let mut config = LandShapeConfig::new("test-bucket");
    config.poll = poll;
    LandShapeClient::with_storage(Arc::new(storage.clone()), config).unwrap()
}

/// Objects from the naming examples: the original video, its model, and another model.
pub fn seed_beach_house(storage: &MemoryStorage) {
    storage.insert("videos/beach_house.mp4", "original");
    storage.insert("videos/beach_house_model.usdz", "model");
    storage.insert("videos/other_model.mp4", "other");
}
