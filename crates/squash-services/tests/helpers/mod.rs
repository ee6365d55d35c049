#![allow(dead_code)]

pub mod fixtures;
pub mod renderer;

use renderer::FakeRenderer;
use squash_core::ArtifactKind;
use squash_processing::{DocumentCompressor, ImageCompressor, PdfRenderer};
use squash_services::LifecycleManager;
use squash_storage::{ArtifactStore, LocalArtifactStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Test application state
pub struct TestApp {
    pub lifecycle: LifecycleManager,
    pub store: Arc<dyn ArtifactStore>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub async fn count(&self, kind: ArtifactKind) -> usize {
        self.store.list(kind).await.unwrap().len()
    }
}

/// Lifecycle manager over a fresh pair of staging directories.
pub async fn setup_test_app(renderer: Option<Arc<FakeRenderer>>) -> TestApp {
    setup_test_app_with(renderer.map(|r| r as Arc<dyn PdfRenderer>)).await
}

pub async fn setup_test_app_with(renderer: Option<Arc<dyn PdfRenderer>>) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ArtifactStore> = Arc::new(
        LocalArtifactStore::new(temp_dir.path().join("uploads"), temp_dir.path().join("outputs"))
            .await
            .unwrap(),
    );

    let documents = DocumentCompressor::new(renderer);
    let lifecycle = LifecycleManager::new(store.clone(), ImageCompressor::default(), documents);

    TestApp {
        lifecycle,
        store,
        _temp_dir: temp_dir,
    }
}
