//! Pass-local sample and spectrum buffers.

/// One block of signed 16-bit mono PCM, sized to the session block size.
///
/// Allocated fresh for every analysis pass and dropped once the spectrum
/// buffer has been filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    samples: Vec<i16>,
}

impl SampleBlock {
    pub fn zeroed(block_size: usize) -> Self {
        Self {
            samples: vec![0; block_size],
        }
    }

    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Consume the block into a spectrum buffer holding the raw sample
    /// values as `f64` (no normalisation), ready for an in-place transform.
    pub fn into_spectrum_buffer(self) -> Vec<f64> {
        self.samples.into_iter().map(f64::from).collect()
    }
}
