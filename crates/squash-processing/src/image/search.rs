//! Quality/width search against a byte budget.
//!
//! Phase one probes quality 1 at native width. If that fits, a binary search over
//! quality finds the highest quality that still fits, with no loss of resolution.
//! Otherwise phase two shrinks the width to 70% per step. At each
//! width a mid quality probe that fits triggers the same quality search; failing
//! that, a fitting quality 1 probe is accepted as is. At width 1 the quality 1
//! encoding is returned unconditionally.
//!
//! Cost is bounded by O(log(width) * log(100)) encodes.

use anyhow::Result;

use super::encoder::ImageEncode;
use super::format::{MAX_QUALITY, MID_QUALITY, MIN_QUALITY};

/// Width reduction per step, as a fraction (7/10).
const WIDTH_RATIO: (u64, u64) = (7, 10);

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub data: Vec<u8>,
    pub quality: u8,
    pub width: u32,
    pub met_target: bool,
    pub encodes: usize,
}

struct Probe<'a, E: ?Sized> {
    encoder: &'a E,
    native_width: u32,
    target_bytes: u64,
    encodes: usize,
}

impl<'a, E: ImageEncode + ?Sized> Probe<'a, E> {
    fn encode(&mut self, quality: u8, width: u32) -> Result<Vec<u8>> {
        self.encodes += 1;
        let width = (width != self.native_width).then_some(width);
        self.encoder.encode(quality, width)
    }

    fn fits(&self, data: &[u8]) -> bool {
        data.len() as u64 <= self.target_bytes
    }

    fn finish(self, data: Vec<u8>, quality: u8, width: u32, met_target: bool) -> SearchOutcome {
        tracing::debug!(
            quality,
            width,
            size_bytes = data.len(),
            target_bytes = self.target_bytes,
            encodes = self.encodes,
            met_target,
            "Image size search finished"
        );
        SearchOutcome {
            data,
            quality,
            width,
            met_target,
            encodes: self.encodes,
        }
    }

    /// Binary search for the highest quality above `known_quality` that fits.
    fn maximize_quality(
        mut self,
        width: u32,
        known_quality: u8,
        known_data: Vec<u8>,
    ) -> Result<SearchOutcome> {
        let mut best = (known_quality, known_data);
        let mut lo = known_quality as u32 + 1;
        let mut hi = MAX_QUALITY as u32;

        while lo <= hi {
            let mid = (lo + hi) / 2;
            let data = self.encode(mid as u8, width)?;
            if self.fits(&data) {
                best = (mid as u8, data);
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }

        Ok(self.finish(best.1, best.0, width, true))
    }
}

fn shrink(width: u32) -> u32 {
    let (num, den) = WIDTH_RATIO;
    ((width as u64 * num / den) as u32).max(1)
}

/// Find the best encoding of `encoder` that is at most `target_bytes` long.
pub fn fit_to_target<E: ImageEncode + ?Sized>(
    encoder: &E,
    target_bytes: u64,
) -> Result<SearchOutcome> {
    let native_width = encoder.native_width().max(1);
    let mut probe = Probe {
        encoder,
        native_width,
        target_bytes,
        encodes: 0,
    };

    let floor = probe.encode(MIN_QUALITY, native_width)?;
    if probe.fits(&floor) {
        return probe.maximize_quality(native_width, MIN_QUALITY, floor);
    }
    if native_width == 1 {
        return Ok(probe.finish(floor, MIN_QUALITY, 1, false));
    }

    let mut width = native_width;
    loop {
        width = shrink(width);

        let mid = probe.encode(MID_QUALITY, width)?;
        if probe.fits(&mid) {
            return probe.maximize_quality(width, MID_QUALITY, mid);
        }

        let low = probe.encode(MIN_QUALITY, width)?;
        if probe.fits(&low) {
            return Ok(probe.finish(low, MIN_QUALITY, width, true));
        }

        if width == 1 {
            return Ok(probe.finish(low, MIN_QUALITY, 1, false));
        }
    }
}
