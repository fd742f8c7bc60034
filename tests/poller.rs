mod common;

use async_trait::async_trait;
use common::{init_tracing, memory_client, poll_config, seed_beach_house};
use landshape::storage::ProgressFn;
use landshape::{
    ArtifactKind, LandShapeError, LookupStrategy, MemoryStorage, ObjectEntry, ObjectStorage,
    PollEvent, PollHandle, ResultPoller,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Collects events up to and including the first one `stop` accepts.
async fn events_until(handle: &mut PollHandle, stop: impl Fn(&PollEvent) -> bool) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        let done = stop(&event);
        events.push(event);
        if done {
            break;
        }
    }
    events
}

/// Memory storage whose listings take `delay` to answer.
struct SlowListing {
    inner: MemoryStorage,
    delay: Duration,
}

#[async_trait]
impl ObjectStorage for SlowListing {
    async fn put_resumable(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError> {
        self.inner.put_resumable(key, path, content_type, progress).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, LandShapeError> {
        sleep(self.delay).await;
        self.inner.list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, LandShapeError> {
        self.inner.exists(key).await
    }

    async fn download_url(&self, key: &str) -> Result<String, LandShapeError> {
        self.inner.download_url(key).await
    }
}

fn slow_poller(storage: &MemoryStorage, delay: Duration) -> ResultPoller {
    let slow = SlowListing {
        inner: storage.clone(),
        delay,
    };
    ResultPoller::new(Arc::new(slow), "videos", poll_config(300, 60))
}

fn tick_count(events: &[PollEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PollEvent::Tick { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_countdown_reaches_zero_after_budget_ticks() {
    init_tracing();
    let storage = MemoryStorage::new();
    let poller = memory_client(&storage, poll_config(5, 60)).poller();

    let start = Instant::now();
    let mut handle = poller.start("beach_house").unwrap();
    let events = events_until(&mut handle, |e| matches!(e, PollEvent::BudgetExhausted)).await;

    assert_eq!(
        events,
        vec![
            PollEvent::Tick { remaining_secs: 4 },
            PollEvent::Tick { remaining_secs: 3 },
            PollEvent::Tick { remaining_secs: 2 },
            PollEvent::Tick { remaining_secs: 1 },
            PollEvent::Tick { remaining_secs: 0 },
            PollEvent::BudgetExhausted,
        ]
    );
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    // Only the final check ran; the interval never came due.
    assert_eq!(storage.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finds_artifact_on_the_interval_check() {
    let storage = MemoryStorage::new();
    seed_beach_house(&storage);
    let poller = memory_client(&storage, poll_config(300, 60)).poller();

    let mut handle = poller.start("beach_house").unwrap();
    let events = events_until(&mut handle, |e| matches!(e, PollEvent::Found { .. })).await;

    assert_eq!(tick_count(&events), 60);
    let Some(PollEvent::Found { artifact }) = events.last() else {
        panic!("expected a found event, got {:?}", events.last());
    };
    assert_eq!(artifact.name, "beach_house_model.usdz");
    assert_eq!(artifact.key, "videos/beach_house_model.usdz");
    assert_eq!(artifact.kind, ArtifactKind::Interactive3dAsset);
    assert_eq!(artifact.url, "memory://objects/videos/beach_house_model.usdz");
    assert_eq!(storage.list_calls(), 1);

    // The session is over: no more events, ticks or listings.
    assert_eq!(handle.next_event().await, None);
    sleep(Duration::from_secs(600)).await;
    assert_eq!(storage.list_calls(), 1);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_check_now_without_match_changes_nothing() {
    let storage = MemoryStorage::new();
    storage.insert("videos/beach_house.mp4", "original");
    let poller = memory_client(&storage, poll_config(300, 60)).poller();
    let mut handle = poller.start("beach_house").unwrap();

    for _ in 0..3 {
        assert!(!handle.check_now().await);
    }
    assert_eq!(storage.list_calls(), 3);

    // Still exactly one countdown and one interval timer.
    let events = events_until(&mut handle, |e| {
        matches!(e, PollEvent::Tick { remaining_secs: 240 })
    })
    .await;
    assert_eq!(tick_count(&events), 60);
    assert_eq!(events.len(), 60);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(storage.list_calls(), 4);

    storage.insert("videos/beach_house_model.mp4", "model");
    assert!(handle.check_now().await);
    let events = events_until(&mut handle, |e| matches!(e, PollEvent::Found { .. })).await;
    let Some(PollEvent::Found { artifact }) = events.last() else {
        panic!("expected a found event");
    };
    assert_eq!(artifact.kind, ArtifactKind::PlayableVideo);

    // Nothing left to check once found.
    assert!(!handle.check_now().await);
    assert_eq!(storage.list_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_both_timers() {
    let storage = MemoryStorage::new();
    let poller = memory_client(&storage, poll_config(300, 60)).poller();
    let mut handle = poller.start("beach_house").unwrap();

    let events = events_until(&mut handle, |e| {
        matches!(e, PollEvent::Tick { remaining_secs: 290 })
    })
    .await;
    assert_eq!(events.len(), 10);

    let session = handle.stop().await.unwrap();
    assert_eq!(session.remaining_secs, 290);
    assert!(session.found.is_none());

    sleep(Duration::from_secs(600)).await;
    assert_eq!(storage.list_calls(), 0);
    assert_eq!(handle.next_event().await, None);
    assert!(!handle.check_now().await);
    assert_eq!(storage.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_cancels_the_session() {
    let storage = MemoryStorage::new();
    let poller = memory_client(&storage, poll_config(300, 60)).poller();
    let handle = poller.start("beach_house").unwrap();

    sleep(Duration::from_secs(5)).await;
    drop(handle);
    sleep(Duration::from_secs(600)).await;
    assert_eq!(storage.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_errors_count_as_not_found() {
    init_tracing();
    let storage = MemoryStorage::new();
    seed_beach_house(&storage);
    storage.set_fail_lookups(true);
    let poller = memory_client(&storage, poll_config(300, 60)).poller();
    let mut handle = poller.start("beach_house").unwrap();

    let events = events_until(&mut handle, |e| {
        matches!(e, PollEvent::Tick { remaining_secs: 240 })
    })
    .await;
    assert!(events.iter().all(|e| matches!(e, PollEvent::Tick { .. })));
    sleep(Duration::from_millis(500)).await;
    assert_eq!(storage.list_calls(), 1);

    storage.set_fail_lookups(false);
    let events = events_until(&mut handle, |e| matches!(e, PollEvent::Found { .. })).await;
    assert_eq!(tick_count(&events), 60);
    assert_eq!(storage.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_checks_continue_after_budget_runs_out() {
    let storage = MemoryStorage::new();
    let poller = memory_client(&storage, poll_config(3, 60)).poller();
    let mut handle = poller.start("beach_house").unwrap();

    events_until(&mut handle, |e| matches!(e, PollEvent::BudgetExhausted)).await;
    assert_eq!(storage.list_calls(), 1);

    sleep(Duration::from_secs(1000)).await;
    assert_eq!(storage.list_calls(), 1);
    assert!(!handle.is_finished());

    storage.insert("videos/beach_house_model.usdz", "model");
    assert!(handle.check_now().await);
    let events = events_until(&mut handle, |e| matches!(e, PollEvent::Found { .. })).await;
    assert_eq!(events.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_budget_checks_once_immediately() {
    let storage = MemoryStorage::new();
    seed_beach_house(&storage);
    let poller = memory_client(&storage, poll_config(0, 60)).poller();
    let mut handle = poller.start("beach_house").unwrap();

    let events = events_until(&mut handle, |e| matches!(e, PollEvent::Found { .. })).await;
    assert_eq!(events.len(), 1);
    assert_eq!(storage.list_calls(), 1);
}

#[tokio::test]
async fn test_check_once_ignores_unrecognized_extensions() {
    let storage = MemoryStorage::new();
    storage.insert("videos/beach_house_model.glb", "model");
    storage.insert("videos/beach_house.mp4", "original");
    let poller = memory_client(&storage, poll_config(300, 60)).poller();

    assert!(poller.check_once("beach_house").await.is_none());
    assert!(poller.lookup("beach_house").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_listing_is_not_an_error() {
    let storage = MemoryStorage::new();
    let poller = memory_client(&storage, poll_config(300, 60)).poller();
    assert!(poller.lookup("beach_house").await.unwrap().is_none());
}

#[tokio::test]
async fn test_direct_lookup_checks_expected_keys_only() {
    let storage = MemoryStorage::new();
    storage.insert("videos/clip_model.mp4", "model");
    let mut poll = poll_config(300, 60);
    poll.lookup = LookupStrategy::Direct;
    let poller = memory_client(&storage, poll).poller();

    let artifact = poller.check_once("clip").await.unwrap();
    assert_eq!(artifact.key, "videos/clip_model.mp4");
    assert_eq!(artifact.kind, ArtifactKind::PlayableVideo);
    assert_eq!(storage.exists_calls(), 2);
    assert_eq!(storage.list_calls(), 0);
}

#[tokio::test]
async fn test_empty_base_name_is_rejected() {
    let storage = MemoryStorage::new();
    storage.insert("videos/anything_model.usdz", "model");
    let poller = memory_client(&storage, poll_config(300, 60)).poller();

    let err = poller.start("").err().unwrap();
    assert!(matches!(err, LandShapeError::InvalidFileName(_)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_listing_does_not_hold_up_the_countdown() {
    let storage = MemoryStorage::new();
    let poller = slow_poller(&storage, Duration::from_secs(30));

    let start = Instant::now();
    let mut handle = poller.start("beach_house").unwrap();
    let mut last = start;
    for expected in (235..300).rev() {
        let event = handle.next_event().await.unwrap();
        assert_eq!(event, PollEvent::Tick { remaining_secs: expected });
        assert_eq!(last.elapsed(), Duration::from_secs(1));
        last = Instant::now();
    }
    assert_eq!(start.elapsed(), Duration::from_secs(65));

    // The lookup that started at 60s finishes at 90s.
    sleep(Duration::from_secs(26)).await;
    assert_eq!(storage.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_does_not_wait_for_a_running_lookup() {
    let storage = MemoryStorage::new();
    let poller = slow_poller(&storage, Duration::from_secs(30));
    let mut handle = poller.start("beach_house").unwrap();

    events_until(&mut handle, |e| {
        matches!(e, PollEvent::Tick { remaining_secs: 239 })
    })
    .await;

    let before = Instant::now();
    let session = handle.stop().await.unwrap();
    assert_eq!(before.elapsed(), Duration::ZERO);
    assert_eq!(session.remaining_secs, 239);

    sleep(Duration::from_secs(600)).await;
    assert_eq!(storage.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_check_now_during_a_lookup_runs_a_fresh_one() {
    let storage = MemoryStorage::new();
    let poller = slow_poller(&storage, Duration::from_secs(30));
    let mut handle = poller.start("beach_house").unwrap();

    events_until(&mut handle, |e| {
        matches!(e, PollEvent::Tick { remaining_secs: 239 })
    })
    .await;

    // The running lookup ends at 90s; the requested one starts then and ends at 120s.
    let start = Instant::now();
    assert!(!handle.check_now().await);
    assert_eq!(start.elapsed(), Duration::from_secs(59));
    assert_eq!(storage.list_calls(), 2);
}

#[tokio::test]
async fn test_nested_objects_are_not_artifacts() {
    let storage = MemoryStorage::new();
    storage.insert("videos/beach_house.mp4", "original");
    storage.insert("videos/archive/2023/beach_house_model.usdz", "old model");
    let poller = memory_client(&storage, poll_config(300, 60)).poller();

    assert!(poller.lookup("beach_house").await.unwrap().is_none());

    storage.insert("videos/beach_house_model.usdz", "model");
    let artifact = poller.lookup("beach_house").await.unwrap().unwrap();
    assert_eq!(artifact.key, "videos/beach_house_model.usdz");
}
