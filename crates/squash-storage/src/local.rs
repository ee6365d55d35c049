use crate::traits::{ArtifactStore, Claim, DeleteOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use squash_core::{ArtifactEntry, ArtifactId, ArtifactKind, ArtifactStat};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp-";
const CLAIM_PREFIX: &str = ".claim-";

/// Local filesystem artifact store
#[derive(Clone, Debug)]
pub struct LocalArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl LocalArtifactStore {
    /// Create a new LocalArtifactStore instance
    ///
    /// # Arguments
    /// * `upload_dir` - Staging directory for uploaded sources
    /// * `output_dir` - Staging directory for compressed results
    pub async fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let upload_dir = upload_dir.into();
        let output_dir = output_dir.into();

        for dir in [&upload_dir, &output_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create staging directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalArtifactStore {
            upload_dir,
            output_dir,
        })
    }

    fn dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Upload => &self.upload_dir,
            ArtifactKind::Output => &self.output_dir,
        }
    }

    /// Path of a file inside a staging directory.
    ///
    /// Names are flat: anything that could climb out of or descend below the
    /// staging directory is rejected.
    fn entry_path(&self, kind: ArtifactKind, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty()
            || name.contains("..")
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StorageError::InvalidKey(format!(
                "Artifact name contains invalid characters: {}",
                name
            )));
        }
        Ok(self.dir(kind).join(name))
    }

    fn artifact_path(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<PathBuf> {
        self.entry_path(kind, id.as_str())
    }

    async fn write_atomically(&self, target: &Path, data: &[u8]) -> StorageResult<()> {
        let temp = target.with_file_name(format!("{}{}", TEMP_PREFIX, Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp, target).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        path = %temp.display(),
                        error = %cleanup,
                        "Failed to remove partial write"
                    );
                }
            }
            return Err(StorageError::WriteFailed(format!(
                "Failed to write {}: {}",
                target.display(),
                e
            )));
        }

        Ok(())
    }
}

fn modified_at(meta: &std::fs::Metadata) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(meta.modified()?))
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn create(
        &self,
        kind: ArtifactKind,
        extension: Option<&str>,
        data: &[u8],
    ) -> StorageResult<ArtifactId> {
        let id = ArtifactId::generate(extension);
        let path = self.artifact_path(kind, &id)?;
        let start = std::time::Instant::now();

        self.write_atomically(&path, data).await?;

        tracing::info!(
            artifact_id = %id,
            kind = %kind,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Artifact created"
        );

        Ok(id)
    }

    async fn exists(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<bool> {
        let path = self.artifact_path(kind, id)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn stat(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<ArtifactStat> {
        let path = self.artifact_path(kind, id)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        Ok(ArtifactStat {
            id: id.clone(),
            kind,
            created_at: modified_at(&meta)?,
            size_bytes: meta.len(),
        })
    }

    async fn read(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes> {
        let path = self.artifact_path(kind, id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn claim(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Claim> {
        let path = self.artifact_path(kind, id)?;
        let entry = format!("{}{}-{}", CLAIM_PREFIX, Uuid::new_v4().simple(), id);
        let claim_path = self.entry_path(kind, &entry)?;
        let start = std::time::Instant::now();

        // The rename is the claim: only one caller can move the file away.
        match fs::rename(&path, &claim_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to claim {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        let data = match fs::read(&claim_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Reaped between claim and read.
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(e) => {
                if let Err(restore) = fs::rename(&claim_path, &path).await {
                    tracing::error!(
                        artifact_id = %id,
                        error = %restore,
                        "Failed to release delivery claim"
                    );
                }
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            artifact_id = %id,
            kind = %kind,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Artifact claimed"
        );

        Ok(Claim {
            kind,
            id: id.clone(),
            entry,
            data: Bytes::from(data),
        })
    }

    async fn commit_claim(&self, claim: &Claim) -> StorageResult<()> {
        self.remove_entry(claim.kind, &claim.entry).await?;
        tracing::debug!(artifact_id = %claim.id, kind = %claim.kind, "Claim committed");
        Ok(())
    }

    async fn release_claim(&self, claim: &Claim) -> StorageResult<()> {
        let claim_path = self.entry_path(claim.kind, &claim.entry)?;
        let path = self.artifact_path(claim.kind, &claim.id)?;

        match fs::rename(&claim_path, &path).await {
            Ok(()) => {
                tracing::debug!(artifact_id = %claim.id, kind = %claim.kind, "Claim released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(claim.id.to_string()))
            }
            Err(e) => Err(StorageError::WriteFailed(format!(
                "Failed to release claim on {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn list(&self, kind: ArtifactKind) -> StorageResult<Vec<ArtifactEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(self.dir(kind)).await?;

        while let Some(entry) = dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            // Entries can vanish between read_dir and metadata.
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::IoError(e)),
            };
            if !meta.is_file() {
                continue;
            }

            entries.push(ArtifactEntry {
                name,
                kind,
                created_at: modified_at(&meta)?,
            });
        }

        Ok(entries)
    }

    async fn remove_entry(&self, kind: ArtifactKind, name: &str) -> StorageResult<DeleteOutcome> {
        let path = self.entry_path(kind, name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(kind = %kind, name = %name, "Artifact deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
