//! Create, deliver, and release artifacts around a compression call.

use bytes::Bytes;
use squash_core::{
    AppError, ArtifactId, ArtifactKind, CompressionRequest, CompressionResult, MimeClass,
    TargetSize,
};
use squash_processing::{DocumentCompressor, ImageCompressor};
use squash_storage::{ArtifactStore, Claim, DeleteOutcome, StorageError};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

const PDF_MIME: &str = "application/pdf";
const PDF_EXTENSION: &str = "pdf";

/// Compressed bytes plus what the result needs to describe them.
struct Compressed {
    data: Bytes,
    met_target: bool,
    mime: &'static str,
    extension: &'static str,
}

/// Lifecycle manager
///
/// Every upload artifact lives for exactly one [`compress`](Self::compress)
/// call. Every output artifact lives until its first [`deliver`](Self::deliver),
/// an explicit [`release_outputs`](Self::release_outputs), or the reaper.
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn ArtifactStore>,
    images: ImageCompressor,
    documents: DocumentCompressor,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        images: ImageCompressor,
        documents: DocumentCompressor,
    ) -> Self {
        Self {
            store,
            images,
            documents,
        }
    }

    pub fn pdf_engine_available(&self) -> bool {
        self.documents.engine_available()
    }

    /// Register the upload, compress it, register the output, and drop the
    /// upload whatever the outcome.
    #[tracing::instrument(
        skip(self, request),
        fields(
            content_type = %request.content_type,
            original_size = request.data.len(),
            target_kb = request.target.map(TargetSize::kilobytes),
        )
    )]
    pub async fn compress(&self, request: CompressionRequest) -> Result<CompressionResult, AppError> {
        let start = Instant::now();
        let original_size_bytes = request.data.len() as u64;

        let upload_id = self
            .store
            .create(ArtifactKind::Upload, request.original_extension(), &request.data)
            .await?;
        tracing::debug!(upload_id = %upload_id, "Upload registered");
        let guard = UploadGuard::new(self.store.clone(), upload_id.clone());

        let outcome = self.compress_upload(&upload_id, &request).await;
        self.discard(ArtifactKind::Upload, &upload_id).await;
        guard.disarm();

        let compressed = outcome?;
        let output_id = self
            .store
            .create(ArtifactKind::Output, Some(compressed.extension), &compressed.data)
            .await?;

        let result = CompressionResult {
            output_artifact_id: output_id,
            original_size_bytes,
            compressed_size_bytes: compressed.data.len() as u64,
            met_target: compressed.met_target,
            output_mime: compressed.mime.to_string(),
        };

        tracing::info!(
            output_id = %result.output_artifact_id,
            original_size = result.original_size_bytes,
            compressed_size = result.compressed_size_bytes,
            met_target = result.met_target,
            duration_ms = start.elapsed().as_millis() as u64,
            "Compression completed"
        );

        Ok(result)
    }

    async fn compress_upload(
        &self,
        upload_id: &ArtifactId,
        request: &CompressionRequest,
    ) -> Result<Compressed, AppError> {
        let class = request.mime_class().ok_or_else(|| {
            AppError::UnsupportedMedia(format!(
                "Only images and PDFs can be compressed, got {}",
                request.content_type
            ))
        })?;

        let source = self.store.read(ArtifactKind::Upload, upload_id).await?;

        match class {
            MimeClass::Image => self.compress_image(source, request.target).await,
            MimeClass::Pdf => Ok(self.compress_document(&source, request.target).await),
        }
    }

    async fn compress_image(
        &self,
        source: Bytes,
        target: Option<TargetSize>,
    ) -> Result<Compressed, AppError> {
        let images = self.images;
        let image = tokio::task::spawn_blocking(move || images.compress(&source, target))
            .await
            .map_err(|e| AppError::Internal(format!("Image compression task failed: {}", e)))?
            .map_err(|e| AppError::CompressionFailed(format!("{:#}", e)))?;

        tracing::debug!(
            quality = image.quality,
            width = image.width,
            encodes = image.encodes,
            "Image compressed"
        );

        Ok(Compressed {
            data: image.data,
            met_target: image.met_target,
            mime: image.format.to_mime_type(),
            extension: image.format.extension(),
        })
    }

    async fn compress_document(&self, source: &[u8], target: Option<TargetSize>) -> Compressed {
        let document = self.documents.compress(source, target).await;

        tracing::debug!(
            strategy = document.strategy,
            renders = document.renders,
            degraded = document.degraded,
            "Document compressed"
        );

        Compressed {
            data: document.data,
            met_target: document.met_target,
            mime: PDF_MIME,
            extension: PDF_EXTENSION,
        }
    }

    /// Hand out an output's bytes and delete it. A second delivery of the same
    /// id, or one after expiry, is `NotFound`.
    #[tracing::instrument(skip(self, id), fields(output_id = %id))]
    pub async fn deliver(&self, id: &ArtifactId) -> Result<Bytes, AppError> {
        let data = self.store.take(ArtifactKind::Output, id).await?;
        tracing::info!(size_bytes = data.len(), "Output delivered");
        Ok(data)
    }

    /// Hand an output's bytes to `sink` and delete the output only once the
    /// sink succeeds. If the sink fails, or the future is dropped before it
    /// finishes, the output stays deliverable until it expires.
    #[tracing::instrument(skip(self, id, sink), fields(output_id = %id))]
    pub async fn deliver_with<F, Fut, E>(&self, id: &ArtifactId, sink: F) -> Result<u64, AppError>
    where
        F: FnOnce(Bytes) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<anyhow::Error>,
    {
        let claim = self.store.claim(ArtifactKind::Output, id).await?;
        let size_bytes = claim.data.len() as u64;
        let data = claim.data.clone();
        let mut guard = ClaimGuard::new(self.store.clone(), claim);

        if let Err(e) = sink(data).await {
            if let Err(release) = self.store.release_claim(guard.disarm()).await {
                tracing::error!(error = %release, "Failed to release delivery claim");
            }
            return Err(AppError::InternalWithSource {
                message: format!("Failed to deliver output {}", id),
                source: e.into(),
            });
        }

        if let Err(e) = self.store.commit_claim(guard.disarm()).await {
            tracing::error!(error = %e, "Failed to delete delivered output, leaving it to the reaper");
        }

        tracing::info!(size_bytes, "Output delivered");
        Ok(size_bytes)
    }

    /// Read every output still present, in request order. Missing ids are
    /// skipped. Nothing is deleted; see [`release_outputs`](Self::release_outputs).
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn collect_outputs(
        &self,
        ids: &[ArtifactId],
    ) -> Result<Vec<(ArtifactId, Bytes)>, AppError> {
        let mut found = Vec::with_capacity(ids.len());

        for id in ids {
            match self.store.read(ArtifactKind::Output, id).await {
                Ok(data) => found.push((id.clone(), data)),
                Err(StorageError::NotFound(_)) => {
                    tracing::debug!(output_id = %id, "Output missing, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(found = found.len(), "Outputs collected");
        Ok(found)
    }

    /// Delete outputs after a bulk read has been sent. Returns how many were
    /// actually removed; failures are logged.
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn release_outputs(&self, ids: &[ArtifactId]) -> usize {
        let mut released = 0;
        for id in ids {
            if self.discard(ArtifactKind::Output, id).await {
                released += 1;
            }
        }
        released
    }

    pub async fn exists(&self, kind: ArtifactKind, id: &ArtifactId) -> Result<bool, AppError> {
        Ok(self.store.exists(kind, id).await?)
    }

    /// Idempotent, non-fatal delete. Returns true only if this call removed it.
    async fn discard(&self, kind: ArtifactKind, id: &ArtifactId) -> bool {
        match self.store.delete(kind, id).await {
            Ok(DeleteOutcome::Deleted) => {
                tracing::debug!(kind = %kind, artifact_id = %id, "Artifact deleted");
                true
            }
            Ok(DeleteOutcome::AlreadyAbsent) => false,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    kind = %kind,
                    artifact_id = %id,
                    "Failed to delete artifact, leaving it to the reaper"
                );
                false
            }
        }
    }
}

/// Deletes the upload if `compress` is dropped before it cleans up.
struct UploadGuard {
    store: Arc<dyn ArtifactStore>,
    id: Option<ArtifactId>,
}

impl UploadGuard {
    fn new(store: Arc<dyn ArtifactStore>, id: ArtifactId) -> Self {
        Self { store, id: Some(id) }
    }

    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(upload_id = %id, "No runtime to delete abandoned upload, leaving it to the reaper");
            return;
        };

        let store = self.store.clone();
        runtime.spawn(async move {
            match store.delete(ArtifactKind::Upload, &id).await {
                Ok(_) => tracing::debug!(upload_id = %id, "Abandoned upload deleted"),
                Err(e) => tracing::error!(
                    upload_id = %id,
                    error = %e,
                    "Failed to delete abandoned upload, leaving it to the reaper"
                ),
            }
        });
    }
}

/// Puts a claimed output back if delivery is dropped mid-flight.
struct ClaimGuard {
    store: Arc<dyn ArtifactStore>,
    claim: Claim,
    armed: bool,
}

impl ClaimGuard {
    fn new(store: Arc<dyn ArtifactStore>, claim: Claim) -> Self {
        Self {
            store,
            claim,
            armed: true,
        }
    }

    fn disarm(&mut self) -> &Claim {
        self.armed = false;
        &self.claim
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(output_id = %self.claim.id, "No runtime to release delivery claim");
            return;
        };

        let store = self.store.clone();
        let claim = self.claim.clone();
        runtime.spawn(async move {
            if let Err(e) = store.release_claim(&claim).await {
                tracing::error!(output_id = %claim.id, error = %e, "Failed to release delivery claim");
            }
        });
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("images", &self.images)
            .field("documents", &self.documents)
            .finish()
    }
}
