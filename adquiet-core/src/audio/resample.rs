//! Device-rate → 44.1 kHz conversion for devices that cannot capture at the
//! analysis rate natively.
//!
//! Uses a rubato `FastFixedIn` resampler on the analysis thread (never in the
//! audio callback). When the device already runs at 44.1 kHz the adapter is a
//! plain copy and no rubato session exists.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{debug, error};

use crate::error::{AdQuietError, Result};

/// Converts mono f32 audio from the device rate to the analysis rate.
pub struct RateAdapter {
    /// `None` in passthrough mode.
    resampler: Option<FastFixedIn<f32>>,
    /// Input samples waiting for a full rubato chunk.
    pending: Vec<f32>,
    chunk_size: usize,
    /// Rubato output scratch: `[1][output_frames_max]`.
    scratch: Vec<Vec<f32>>,
}

impl RateAdapter {
    /// # Errors
    /// `AdQuietError::AudioDevice` if rubato rejects the ratio or chunk size.
    pub fn new(device_rate: u32, analysis_rate: u32, chunk_size: usize) -> Result<Self> {
        if device_rate == analysis_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size,
                scratch: Vec::new(),
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            f64::from(analysis_rate) / f64::from(device_rate),
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            1,
        )
        .map_err(|e| AdQuietError::AudioDevice(format!("resampler init: {e}")))?;

        let scratch = vec![vec![0f32; resampler.output_frames_max()]; 1];
        debug!(device_rate, analysis_rate, chunk_size, "rate adapter created");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            scratch,
        })
    }

    /// Convert `input`, appending whatever output is ready to `out`.
    ///
    /// Leftover input shorter than one rubato chunk is kept for the next call.
    pub fn convert_into(&mut self, input: &[f32], out: &mut Vec<f32>) {
        let Some(resampler) = self.resampler.as_mut() else {
            out.extend_from_slice(input);
            return;
        };

        self.pending.extend_from_slice(input);
        while self.pending.len() >= self.chunk_size {
            let chunk = &self.pending[..self.chunk_size];
            match resampler.process_into_buffer(&[chunk], &mut self.scratch, None) {
                Ok((_consumed, produced)) => out.extend_from_slice(&self.scratch[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            self.pending.drain(..self.chunk_size);
        }
    }

    /// Drop buffered input and filter state so a new capture starts clean.
    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_copies_input() {
        let mut adapter = RateAdapter::new(44_100, 44_100, 512).unwrap();
        assert!(adapter.is_passthrough());

        let input: Vec<f32> = (0..300).map(|i| i as f32 * 0.001).collect();
        let mut out = Vec::new();
        adapter.convert_into(&input, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn converts_48k_to_44k1_with_expected_ratio() {
        let mut adapter = RateAdapter::new(48_000, 44_100, 480).unwrap();
        assert!(!adapter.is_passthrough());

        let mut out = Vec::new();
        adapter.convert_into(&vec![0.0f32; 4800], &mut out);
        // 4800 samples at 48 kHz ≈ 4410 at 44.1 kHz
        assert!(
            (out.len() as isize - 4410).unsigned_abs() <= 50,
            "output len={}",
            out.len()
        );
    }

    #[test]
    fn partial_chunk_waits_for_more_input() {
        let mut adapter = RateAdapter::new(48_000, 44_100, 480).unwrap();
        let mut out = Vec::new();
        adapter.convert_into(&vec![0.0f32; 200], &mut out);
        assert!(out.is_empty());
        adapter.convert_into(&vec![0.0f32; 300], &mut out);
        assert!(!out.is_empty());
    }

    #[test]
    fn reset_discards_pending_input() {
        let mut adapter = RateAdapter::new(48_000, 44_100, 480).unwrap();
        let mut out = Vec::new();
        adapter.convert_into(&vec![0.0f32; 400], &mut out);
        adapter.reset();
        adapter.convert_into(&vec![0.0f32; 400], &mut out);
        assert!(out.is_empty(), "pending input should not survive reset");
    }
}
