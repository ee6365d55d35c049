mod helpers;

use helpers::fixtures;
use helpers::setup_test_app;
use squash_core::{AppError, ArtifactKind, CompressionRequest, ManualClock};
use squash_services::Reaper;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(120);
const INTERVAL: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_undelivered_output_expires_after_ttl() {
    let app = setup_test_app(None).await;
    let clock = Arc::new(ManualClock::default());
    let reaper = Reaper::new(app.store.clone(), clock.clone(), TTL, INTERVAL);

    let request = CompressionRequest::new(fixtures::gradient_jpeg(64, 64), "image/jpeg");
    let id = app.lifecycle.compress(request).await.unwrap().output_artifact_id;

    let report = reaper.sweep().await;
    assert_eq!(report.expired, 0);
    assert!(app.lifecycle.exists(ArtifactKind::Output, &id).await.unwrap());

    clock.advance(chrono::Duration::seconds(121));
    let report = reaper.sweep().await;

    assert_eq!(report.deleted, 1);
    assert!(!app.lifecycle.exists(ArtifactKind::Output, &id).await.unwrap());
    assert!(matches!(
        app.lifecycle.deliver(&id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_orphaned_upload_expires() {
    let app = setup_test_app(None).await;
    let clock = Arc::new(ManualClock::default());
    let reaper = Reaper::new(app.store.clone(), clock.clone(), TTL, INTERVAL);

    // An upload left behind by a crashed request.
    app.store
        .create(ArtifactKind::Upload, Some("png"), b"orphan")
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(300));
    let report = reaper.sweep().await;

    assert_eq!(report.scanned, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(app.count(ArtifactKind::Upload).await, 0);
}

#[tokio::test]
async fn test_sweep_after_delivery_is_harmless() {
    let app = setup_test_app(None).await;
    let clock = Arc::new(ManualClock::default());
    let reaper = Reaper::new(app.store.clone(), clock.clone(), TTL, INTERVAL);

    let request = CompressionRequest::new(fixtures::gradient_jpeg(64, 64), "image/jpeg");
    let id = app.lifecycle.compress(request).await.unwrap().output_artifact_id;
    app.lifecycle.deliver(&id).await.unwrap();

    clock.advance(chrono::Duration::seconds(600));
    let report = reaper.sweep().await;

    assert_eq!(report.scanned, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_background_loop_reaps_and_stops() {
    let app = setup_test_app(None).await;
    let clock = Arc::new(ManualClock::default());
    clock.advance(chrono::Duration::seconds(1_000));

    app.store
        .create(ArtifactKind::Output, Some("jpg"), b"stale")
        .await
        .unwrap();
    // Stamped with the real time, which is far behind the advanced clock.
    let reaper = Arc::new(Reaper::new(
        app.store.clone(),
        clock,
        TTL,
        Duration::from_millis(20),
    ));
    let handle = reaper.start();

    for _ in 0..100 {
        if app.count(ArtifactKind::Output).await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.shutdown().await;

    assert_eq!(app.count(ArtifactKind::Output).await, 0);
}
