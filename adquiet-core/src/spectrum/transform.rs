//! In-place real-input forward FFT with a packed output layout.
//!
//! ## Layout
//!
//! For a block of `n` real samples the buffer is overwritten with:
//!
//! ```text
//! n even:  [Re X0, Re X(n/2), Re X1, Im X1, Re X2, Im X2, ..., Re X(n/2-1), Im X(n/2-1)]
//! n odd:   [Re X0, Im Xm,     Re X1, Im X1, ...,              Re Xm]      m = (n-1)/2
//! ```
//!
//! The band and loudness extractors index these slots directly and treat each
//! one as a magnitude-bearing scalar. Their calibration depends on this layout.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Forward real FFT planned once for a fixed block size.
#[derive(Clone)]
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f64>>,
    len: usize,
}

impl SpectralTransform {
    pub fn new(len: usize) -> Self {
        let fft = FftPlanner::<f64>::new().plan_fft_forward(len);
        Self { fft, len }
    }

    /// Block size this transform was planned for.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Transform `buffer` in place.
    ///
    /// # Panics
    /// If `buffer.len()` differs from the planned block size.
    pub fn forward_real(&self, buffer: &mut [f64]) {
        assert_eq!(
            buffer.len(),
            self.len,
            "spectrum buffer length must equal the planned block size"
        );

        // A length-1 DFT is the identity; nothing to pack.
        if self.len < 2 {
            return;
        }

        let mut bins: Vec<Complex<f64>> = buffer.iter().map(|&x| Complex::new(x, 0.0)).collect();
        self.fft.process(&mut bins);
        pack_real_spectrum(&bins, buffer);
    }
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Write the non-redundant half of a real signal's DFT into `out`.
fn pack_real_spectrum(bins: &[Complex<f64>], out: &mut [f64]) {
    let n = out.len();
    out[0] = bins[0].re;

    if n % 2 == 0 {
        let half = n / 2;
        out[1] = bins[half].re;
        for k in 1..half {
            out[2 * k] = bins[k].re;
            out[2 * k + 1] = bins[k].im;
        }
    } else {
        let last = (n - 1) / 2;
        for k in 1..last {
            out[2 * k] = bins[k].re;
            out[2 * k + 1] = bins[k].im;
        }
        out[n - 1] = bins[last].re;
        out[1] = bins[last].im;
    }
}
