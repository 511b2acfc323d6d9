//! Band energy and overall loudness over a packed spectrum buffer.
//!
//! ## Bin mapping
//!
//! `bin = freq_hz * block_size / sample_rate` with truncating integer
//! division, then clamped into `[0, block_size - 1]`. A band is the half-open
//! slot range `[start_bin, end_bin)`; an empty or inverted range has zero
//! energy.

use std::ops::Range;

/// Loudness reported for a spectrum with zero mean energy.
///
/// `log10(0)` is undefined; negative infinity keeps every `loudness > gate`
/// comparison false without special-casing callers.
pub const SILENT_LOUDNESS_DB: f64 = f64::NEG_INFINITY;

/// A frequency range in Hz, mapped onto spectrum slots per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyBand {
    pub start_hz: u32,
    pub end_hz: u32,
}

impl FrequencyBand {
    pub const fn new(start_hz: u32, end_hz: u32) -> Self {
        Self { start_hz, end_hz }
    }

    /// Slot range covered by this band for the given block size and rate.
    pub fn bin_range(&self, block_size: usize, sample_rate: u32) -> Range<usize> {
        hz_to_bin(self.start_hz, block_size, sample_rate)
            ..hz_to_bin(self.end_hz, block_size, sample_rate)
    }
}

/// Map a frequency to a clamped spectrum slot index.
pub fn hz_to_bin(freq_hz: u32, block_size: usize, sample_rate: u32) -> usize {
    if block_size == 0 || sample_rate == 0 {
        return 0;
    }
    let bin = u64::from(freq_hz) * block_size as u64 / u64::from(sample_rate);
    (bin as usize).min(block_size - 1)
}

/// Sum of squared slot magnitudes inside `band`.
pub fn band_energy(spectrum: &[f64], band: FrequencyBand, sample_rate: u32) -> f64 {
    let range = band.bin_range(spectrum.len(), sample_rate);
    if range.start >= range.end {
        return 0.0;
    }
    spectrum[range].iter().map(|v| v.abs() * v.abs()).sum()
}

/// `10 * log10(mean squared magnitude)` over slots `[0, len / 2)`.
///
/// Returns [`SILENT_LOUDNESS_DB`] when that mean is zero.
pub fn overall_loudness(spectrum: &[f64]) -> f64 {
    let half = spectrum.len() / 2;
    if half == 0 {
        return SILENT_LOUDNESS_DB;
    }

    let sum: f64 = spectrum[..half].iter().map(|v| v.abs() * v.abs()).sum();
    let mean = sum / half as f64;
    if mean == 0.0 {
        return SILENT_LOUDNESS_DB;
    }
    10.0 * mean.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RATE: u32 = 44_100;

    #[test]
    fn bin_mapping_truncates() {
        // 2000 * 1024 / 44100 = 46.43…
        assert_eq!(hz_to_bin(2000, 1024, RATE), 46);
        assert_eq!(hz_to_bin(4000, 1024, RATE), 92);
        assert_eq!(hz_to_bin(8000, 1024, RATE), 185);
        assert_eq!(hz_to_bin(200, 1024, RATE), 4);
    }

    #[test]
    fn bin_mapping_clamps_to_last_slot() {
        assert_eq!(hz_to_bin(100_000, 1024, RATE), 1023);
        assert_eq!(hz_to_bin(44_100, 1024, RATE), 1023);
    }

    #[test]
    fn inverted_band_has_zero_energy() {
        let spectrum = vec![5.0; 1024];
        let band = FrequencyBand::new(4000, 2000);
        assert_eq!(band_energy(&spectrum, band, RATE), 0.0);
    }

    #[test]
    fn band_clamped_to_single_slot_has_zero_energy() {
        // Both edges clamp to 1023 → empty range.
        let spectrum = vec![5.0; 1024];
        let band = FrequencyBand::new(50_000, 60_000);
        assert_eq!(band_energy(&spectrum, band, RATE), 0.0);
    }

    #[test]
    fn band_energy_is_half_open_sum_of_squares() {
        let mut spectrum = vec![0.0; 1024];
        // [2000, 4000) → slots 46..92
        spectrum[45] = 100.0;
        spectrum[46] = -3.0;
        spectrum[91] = 4.0;
        spectrum[92] = 100.0;
        let energy = band_energy(&spectrum, FrequencyBand::new(2000, 4000), RATE);
        assert_relative_eq!(energy, 25.0);
    }

    #[test]
    fn band_energy_is_never_negative() {
        let spectrum: Vec<f64> = (0..512).map(|i| -(i as f64)).collect();
        assert!(band_energy(&spectrum, FrequencyBand::new(0, 22_050), RATE) >= 0.0);
    }

    #[test]
    fn loudness_uses_first_half_only() {
        let mut spectrum = vec![0.0; 8];
        spectrum[..4].copy_from_slice(&[10.0, 10.0, 10.0, 10.0]);
        spectrum[4..].copy_from_slice(&[1e6, 1e6, 1e6, 1e6]);
        // mean over first 4 slots = 100 → 20 dB
        assert_relative_eq!(overall_loudness(&spectrum), 20.0);
    }

    #[test]
    fn silent_spectrum_reports_sentinel() {
        let loudness = overall_loudness(&vec![0.0; 1024]);
        assert_eq!(loudness, SILENT_LOUDNESS_DB);
        assert!(!loudness.is_nan());
        assert!(loudness < -10.0);
    }

    #[test]
    fn too_short_spectrum_reports_sentinel() {
        assert_eq!(overall_loudness(&[7.0]), SILENT_LOUDNESS_DB);
    }
}
