use async_trait::async_trait;
use squash_processing::{PdfRenderer, RenderError, RenderPreset};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Renderer writing a fixed number of bytes per preset. Presets without a
/// size fail.
pub struct FakeRenderer {
    sizes: HashMap<&'static str, usize>,
    calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(sizes: &[(&'static str, usize)]) -> Arc<Self> {
        Arc::new(Self {
            sizes: sizes.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(
        &self,
        _input: &Path,
        output: &Path,
        preset: &RenderPreset,
    ) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.sizes.get(preset.name) {
            Some(&size) => {
                tokio::fs::write(output, vec![b'%'; size]).await?;
                Ok(())
            }
            None => Err(RenderError::Failed {
                status: "exit status: 1".to_string(),
                stderr: format!("preset {} unavailable", preset.name),
            }),
        }
    }
}

/// Renderer that never finishes within a test's patience.
pub struct SlowRenderer {
    delay: Duration,
}

impl SlowRenderer {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

#[async_trait]
impl PdfRenderer for SlowRenderer {
    async fn render(
        &self,
        _input: &Path,
        _output: &Path,
        _preset: &RenderPreset,
    ) -> Result<(), RenderError> {
        tokio::time::sleep(self.delay).await;
        Err(RenderError::TimedOut(self.delay))
    }
}
