//! One analysis pass: capture a block, transform it, classify it.
//!
//! ## Stages
//!
//! ```text
//! 1. start_capture
//! 2. read exactly one block (short or failed read → no decision)
//! 3. i16 → f64, forward_real in place
//! 4. low/mid/high band energy + overall loudness
//! 5. classify against the caller's threshold
//! 6. stop_capture (always, via CaptureGuard)
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::{
    audio::{AudioConfig, CaptureSource},
    buffering::block::SampleBlock,
    classifier::{classify, Classification, SpectralFeatures},
    spectrum::SpectralTransform,
};

/// Counters shared across passes for observability.
#[derive(Debug, Default)]
pub struct PassDiagnostics {
    pub passes: AtomicUsize,
    pub completed: AtomicUsize,
    pub start_errors: AtomicUsize,
    pub short_reads: AtomicUsize,
    pub read_errors: AtomicUsize,
    pub positives: AtomicUsize,
    pub skipped_not_ready: AtomicUsize,
}

impl PassDiagnostics {
    pub fn reset(&self) {
        self.passes.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.start_errors.store(0, Ordering::Relaxed);
        self.short_reads.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.positives.store(0, Ordering::Relaxed);
        self.skipped_not_ready.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            start_errors: self.start_errors.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            positives: self.positives.load(Ordering::Relaxed),
            skipped_not_ready: self.skipped_not_ready.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub passes: usize,
    pub completed: usize,
    pub start_errors: usize,
    pub short_reads: usize,
    pub read_errors: usize,
    pub positives: usize,
    pub skipped_not_ready: usize,
}

/// Stops capture when dropped, so no exit path (early return, panic in the
/// transform) leaves the device recording.
struct CaptureGuard<'a, S: CaptureSource> {
    source: &'a mut S,
}

impl<S: CaptureSource> Drop for CaptureGuard<'_, S> {
    fn drop(&mut self) {
        self.source.stop_capture();
    }
}

/// Run one pass over an open source.
///
/// Returns `None` when no decision could be made (capture failed to start,
/// or the read was short or failed).
pub fn run<S: CaptureSource>(
    source: &mut S,
    transform: &SpectralTransform,
    config: &AudioConfig,
    sensitivity_threshold: i32,
    diagnostics: &PassDiagnostics,
) -> Option<Classification> {
    diagnostics.passes.fetch_add(1, Ordering::Relaxed);

    let mut guard = CaptureGuard { source };
    if let Err(e) = guard.source.start_capture() {
        warn!("failed to start capture: {e}");
        diagnostics.start_errors.fetch_add(1, Ordering::Relaxed);
        return None;
    }

    let mut block = SampleBlock::zeroed(config.block_size());
    match guard.source.read_block(block.as_mut_slice()) {
        Ok(n) if n == block.len() => {}
        Ok(n) => {
            warn!(read = n, expected = block.len(), "short read from capture device");
            diagnostics.short_reads.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Err(e) => {
            warn!("capture read failed: {e}");
            diagnostics.read_errors.fetch_add(1, Ordering::Relaxed);
            return None;
        }
    }

    let mut spectrum = block.into_spectrum_buffer();
    transform.forward_real(&mut spectrum);

    let features = SpectralFeatures::extract(&spectrum, config.sample_rate());
    let result = classify(features, sensitivity_threshold);

    debug!(
        low = features.low_energy,
        mid = features.mid_energy,
        high = features.high_energy,
        loudness_db = features.loudness_db,
        probability = result.probability,
        threshold = sensitivity_threshold,
        is_ad = result.is_advertisement,
        "analysis pass complete"
    );

    diagnostics.completed.fetch_add(1, Ordering::Relaxed);
    if result.is_advertisement {
        diagnostics.positives.fetch_add(1, Ordering::Relaxed);
    }

    drop(guard);
    Some(result)
}
