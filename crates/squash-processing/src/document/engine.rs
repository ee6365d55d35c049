//! External PDF rendering engine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use super::presets::RenderPreset;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to start renderer {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Renderer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Re-renders a PDF at a preset. A failed render is a failure of that preset
/// only.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(
        &self,
        input: &Path,
        output: &Path,
        preset: &RenderPreset,
    ) -> Result<(), RenderError>;
}

/// Ghostscript `pdfwrite` renderer with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct GhostscriptRenderer {
    program: PathBuf,
    timeout: Duration,
}

impl GhostscriptRenderer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl PdfRenderer for GhostscriptRenderer {
    #[tracing::instrument(skip(self, input, output), fields(preset = preset.name))]
    async fn render(
        &self,
        input: &Path,
        output: &Path,
        preset: &RenderPreset,
    ) -> Result<(), RenderError> {
        let child = Command::new(&self.program)
            .args(preset.ghostscript_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // On timeout the child is dropped, which kills it.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::TimedOut(self.timeout))??;

        if !result.status.success() {
            return Err(RenderError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Find the first candidate executable that answers `--version`.
///
/// Meant to run once at startup; the result is kept for the process lifetime.
/// `None` means the document compressor runs in pass-through mode.
pub async fn probe_pdf_engine(
    candidates: &[String],
    timeout: Duration,
) -> Option<GhostscriptRenderer> {
    for candidate in candidates {
        let probe = Command::new(candidate)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(Duration::from_secs(10).min(timeout), probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                tracing::info!(program = %candidate, version = %version, "PDF engine available");
                return Some(GhostscriptRenderer::new(candidate, timeout));
            }
            Ok(Ok(output)) => {
                tracing::debug!(program = %candidate, status = %output.status, "PDF engine probe failed");
            }
            Ok(Err(e)) => {
                tracing::debug!(program = %candidate, error = %e, "PDF engine not found");
            }
            Err(_) => {
                tracing::debug!(program = %candidate, "PDF engine probe timed out");
            }
        }
    }

    tracing::warn!(
        candidates = ?candidates,
        "No PDF engine found, PDFs will be passed through unmodified"
    );
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn preset() -> RenderPreset {
        super::super::presets::DEFAULT_PRESET
    }

    #[tokio::test]
    async fn test_probe_skips_missing_candidates() {
        let dir = tempdir().unwrap();
        let fake = script(dir.path(), "fake-gs", "echo 10.02.1");

        let candidates = vec![
            "squash-no-such-binary".to_string(),
            fake.to_string_lossy().to_string(),
        ];
        let engine = probe_pdf_engine(&candidates, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(engine.program(), fake.as_path());
    }

    #[tokio::test]
    async fn test_probe_reports_unavailable() {
        let candidates = vec!["squash-no-such-binary".to_string()];
        assert!(probe_pdf_engine(&candidates, Duration::from_secs(5))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_failure() {
        let dir = tempdir().unwrap();
        let fake = script(dir.path(), "failing-gs", "echo broken >&2\nexit 3");
        let renderer = GhostscriptRenderer::new(fake, Duration::from_secs(5));

        let err = renderer
            .render(&dir.path().join("in.pdf"), &dir.path().join("out.pdf"), &preset())
            .await
            .unwrap_err();
        match err {
            RenderError::Failed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hung_renderer_times_out() {
        let dir = tempdir().unwrap();
        let fake = script(dir.path(), "slow-gs", "sleep 10");
        let renderer = GhostscriptRenderer::new(fake, Duration::from_millis(200));

        let err = renderer
            .render(&dir.path().join("in.pdf"), &dir.path().join("out.pdf"), &preset())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let renderer = GhostscriptRenderer::new("/nonexistent/gs", Duration::from_secs(1));
        let err = renderer
            .render(Path::new("in.pdf"), Path::new("out.pdf"), &preset())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }
}
