use bytes::Bytes;
use squash_core::TargetSize;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use super::engine::PdfRenderer;
use super::presets::{RenderPreset, DEFAULT_PRESET, PRESET_LADDER};

/// Result of one document compression. Always carries an output, falling back
/// to the original bytes when no render succeeds.
#[derive(Debug, Clone)]
pub struct CompressedDocument {
    pub data: Bytes,
    pub met_target: bool,
    /// Preset that produced `data`, `None` for a pass-through copy.
    pub strategy: Option<&'static str>,
    pub renders: usize,
    /// True when no render produced the output.
    pub degraded: bool,
}

/// PDF compressor driving a [`PdfRenderer`] through the preset ladder.
#[derive(Clone)]
pub struct DocumentCompressor {
    renderer: Option<Arc<dyn PdfRenderer>>,
}

impl DocumentCompressor {
    /// `renderer` is the result of the startup engine probe. `None` puts the
    /// compressor in pass-through mode.
    pub fn new(renderer: Option<Arc<dyn PdfRenderer>>) -> Self {
        Self { renderer }
    }

    pub fn passthrough() -> Self {
        Self::new(None)
    }

    pub fn engine_available(&self) -> bool {
        self.renderer.is_some()
    }

    #[tracing::instrument(skip(self, data), fields(input_bytes = data.len()))]
    pub async fn compress(&self, data: &[u8], target: Option<TargetSize>) -> CompressedDocument {
        let Some(renderer) = self.renderer.as_deref() else {
            tracing::debug!("No PDF engine, passing document through");
            return passthrough(data, target, 0);
        };

        let workdir = match Workdir::prepare(data).await {
            Ok(workdir) => workdir,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prepare PDF working directory");
                return passthrough(data, target, 0);
            }
        };

        match target {
            None => self.render_default(renderer, &workdir, data).await,
            Some(target) => self.render_ladder(renderer, &workdir, data, target).await,
        }
    }

    async fn render_default(
        &self,
        renderer: &dyn PdfRenderer,
        workdir: &Workdir,
        data: &[u8],
    ) -> CompressedDocument {
        match workdir.render(renderer, &DEFAULT_PRESET, 0).await {
            Some(output) => CompressedDocument {
                data: output,
                met_target: true,
                strategy: Some(DEFAULT_PRESET.name),
                renders: 1,
                degraded: false,
            },
            None => passthrough(data, None, 1),
        }
    }

    async fn render_ladder(
        &self,
        renderer: &dyn PdfRenderer,
        workdir: &Workdir,
        data: &[u8],
        target: TargetSize,
    ) -> CompressedDocument {
        let mut best_effort: Option<(Bytes, &'static str)> = None;
        let mut renders = 0;

        for (step, preset) in PRESET_LADDER.iter().enumerate() {
            renders += 1;
            let Some(output) = workdir.render(renderer, preset, step).await else {
                continue;
            };

            if target.fits(output.len()) {
                tracing::debug!(
                    preset = preset.name,
                    output_bytes = output.len(),
                    renders,
                    "PDF fits target"
                );
                return CompressedDocument {
                    data: output,
                    met_target: true,
                    strategy: Some(preset.name),
                    renders,
                    degraded: false,
                };
            }

            best_effort = Some((output, preset.name));
        }

        match best_effort {
            Some((output, name)) => {
                tracing::info!(
                    preset = name,
                    output_bytes = output.len(),
                    target_bytes = target.bytes(),
                    "No PDF preset met the target, keeping the last render"
                );
                CompressedDocument {
                    data: output,
                    met_target: false,
                    strategy: Some(name),
                    renders,
                    degraded: false,
                }
            }
            None => passthrough(data, Some(target), renders),
        }
    }
}

impl std::fmt::Debug for DocumentCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCompressor")
            .field("engine_available", &self.engine_available())
            .finish()
    }
}

fn passthrough(data: &[u8], target: Option<TargetSize>, renders: usize) -> CompressedDocument {
    CompressedDocument {
        data: Bytes::copy_from_slice(data),
        met_target: target.map_or(true, |t| t.fits(data.len())),
        strategy: None,
        renders,
        degraded: true,
    }
}

/// Scratch directory holding the input and one output per render attempt.
/// Removed on drop.
struct Workdir {
    dir: TempDir,
}

impl Workdir {
    async fn prepare(data: &[u8]) -> std::io::Result<Self> {
        let dir = tokio::task::spawn_blocking(|| tempfile::Builder::new().prefix("squash-pdf-").tempdir())
            .await
            .map_err(std::io::Error::other)??;
        tokio::fs::write(dir.path().join("input.pdf"), data).await?;
        Ok(Self { dir })
    }

    fn input(&self) -> std::path::PathBuf {
        self.dir.path().join("input.pdf")
    }

    /// Render one preset. Any failure, including an empty output, counts as a
    /// failure of this preset only.
    async fn render(
        &self,
        renderer: &dyn PdfRenderer,
        preset: &RenderPreset,
        step: usize,
    ) -> Option<Bytes> {
        let output = self.dir.path().join(format!("output-{}.pdf", step));

        if let Err(e) = renderer.render(&self.input(), &output, preset).await {
            tracing::warn!(preset = preset.name, error = %e, "PDF render failed");
            return None;
        }

        match read_output(&output).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                tracing::warn!(preset = preset.name, "PDF render produced an empty file");
                None
            }
            Err(e) => {
                tracing::warn!(preset = preset.name, error = %e, "PDF render output unreadable");
                None
            }
        }
    }
}

async fn read_output(path: &Path) -> std::io::Result<Bytes> {
    tokio::fs::read(path).await.map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::engine::RenderError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes an output of a fixed size per preset; presets missing from the
    /// map fail.
    struct FakeRenderer {
        sizes: HashMap<&'static str, usize>,
        calls: AtomicUsize,
    }

    impl FakeRenderer {
        fn new(sizes: &[(&'static str, usize)]) -> Arc<Self> {
            Arc::new(Self {
                sizes: sizes.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PdfRenderer for FakeRenderer {
        async fn render(
            &self,
            input: &Path,
            output: &Path,
            preset: &RenderPreset,
        ) -> Result<(), RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(input.exists());
            match self.sizes.get(preset.name) {
                Some(&size) => {
                    tokio::fs::write(output, vec![b'%'; size]).await?;
                    Ok(())
                }
                None => Err(RenderError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "unsupported".to_string(),
                }),
            }
        }
    }

    fn input() -> Vec<u8> {
        vec![b'P'; 50_000]
    }

    fn target_kb(kb: u64) -> Option<TargetSize> {
        Some(TargetSize::from_kb(kb).unwrap())
    }

    #[tokio::test]
    async fn test_passthrough_without_engine() {
        let compressor = DocumentCompressor::passthrough();
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert_eq!(result.data.as_ref(), input().as_slice());
        assert!(result.degraded);
        assert!(!result.met_target);
        assert_eq!(result.renders, 0);
    }

    #[tokio::test]
    async fn test_no_target_uses_default_preset() {
        let renderer = FakeRenderer::new(&[("ebook", 30_000)]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), None).await;

        assert_eq!(result.data.len(), 30_000);
        assert_eq!(result.strategy, Some("ebook"));
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_ladder_stops_at_first_fit() {
        let renderer = FakeRenderer::new(&[
            ("ebook", 30_000),
            ("screen", 9_000),
            ("screen-low", 5_000),
            ("screen-min", 3_000),
        ]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert!(result.met_target);
        assert_eq!(result.strategy, Some("screen"));
        assert_eq!(result.data.len(), 9_000);
        assert_eq!(renderer.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_preset_fit_renders_once() {
        let renderer = FakeRenderer::new(&[("ebook", 1_000), ("screen", 500)]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert_eq!(result.strategy, Some("ebook"));
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_presets_are_skipped() {
        let renderer = FakeRenderer::new(&[("screen-low", 4_000)]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert!(result.met_target);
        assert_eq!(result.strategy, Some("screen-low"));
        assert_eq!(renderer.calls(), 3);
    }

    #[tokio::test]
    async fn test_unmet_target_keeps_last_render() {
        let renderer = FakeRenderer::new(&[
            ("ebook", 40_000),
            ("screen", 30_000),
            ("screen-low", 20_000),
        ]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert!(!result.met_target);
        assert!(!result.degraded);
        assert_eq!(result.strategy, Some("screen-low"));
        assert_eq!(result.data.len(), 20_000);
        assert_eq!(renderer.calls(), PRESET_LADDER.len());
    }

    #[tokio::test]
    async fn test_all_renders_failing_falls_back_to_copy() {
        let renderer = FakeRenderer::new(&[]);
        let compressor = DocumentCompressor::new(Some(renderer.clone()));
        let result = compressor.compress(&input(), target_kb(10)).await;

        assert_eq!(result.data.as_ref(), input().as_slice());
        assert!(result.degraded);
        assert_eq!(result.strategy, None);
        assert_eq!(result.renders, PRESET_LADDER.len());
    }

    #[tokio::test]
    async fn test_empty_render_counts_as_failure() {
        let renderer = FakeRenderer::new(&[("ebook", 0)]);
        let compressor = DocumentCompressor::new(Some(renderer));
        let result = compressor.compress(&input(), None).await;

        assert!(result.degraded);
        assert_eq!(result.data.len(), input().len());
    }
}
