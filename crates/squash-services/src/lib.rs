//! Squash Services Layer
//!
//! Owns the artifact lifecycle: registering uploads, running the right
//! compressor, registering outputs, delivering them once, and reaping
//! whatever is left behind. Transport layers depend on this crate only.

pub mod lifecycle;
pub mod reaper;

use squash_core::{Config, SystemClock};
use squash_processing::{probe_pdf_engine, DocumentCompressor, ImageCompressor, PdfRenderer};
use squash_storage::{ArtifactStore, LocalArtifactStore};
use std::sync::Arc;

pub use lifecycle::LifecycleManager;
pub use reaper::{ReapReport, Reaper, ReaperHandle};
pub use squash_core::{AppError, CompressionRequest, CompressionResult, ErrorMetadata};
pub use squash_storage::{DeleteOutcome, StorageError};

/// Everything a host process needs, built once from configuration.
#[derive(Clone)]
pub struct Services {
    pub lifecycle: Arc<LifecycleManager>,
    pub reaper: Arc<Reaper>,
}

/// Create the staging directories, probe for a PDF engine, and wire the
/// lifecycle manager and reaper to the same store.
pub async fn init_services(config: &Config) -> Result<Services, anyhow::Error> {
    let store: Arc<dyn ArtifactStore> = Arc::new(
        LocalArtifactStore::new(config.upload_dir().to_path_buf(), config.output_dir().to_path_buf())
            .await?,
    );

    let renderer = probe_pdf_engine(config.pdf_engine_candidates(), config.pdf_render_timeout())
        .await
        .map(|engine| Arc::new(engine) as Arc<dyn PdfRenderer>);

    let lifecycle = LifecycleManager::new(
        store.clone(),
        ImageCompressor::new(config.max_image_dimension()),
        DocumentCompressor::new(renderer),
    );
    let reaper = Reaper::new(
        store,
        Arc::new(SystemClock),
        config.artifact_ttl(),
        config.reaper_interval(),
    );

    tracing::info!(
        environment = config.environment(),
        upload_dir = %config.upload_dir().display(),
        output_dir = %config.output_dir().display(),
        ttl_secs = config.artifact_ttl().as_secs(),
        pdf_engine = lifecycle.pdf_engine_available(),
        "Services initialized"
    );

    Ok(Services {
        lifecycle: Arc::new(lifecycle),
        reaper: Arc::new(reaper),
    })
}
