//! Advertisement heuristic over three spectral features.
//!
//! ## Scoring
//!
//! Each rule is independent and additive:
//!
//! | Rule | Weight |
//! |------|--------|
//! | mid energy  > low energy × 1.5 | 0.3 |
//! | high energy > low energy × 1.2 | 0.3 |
//! | loudness > −10 dB              | 0.4 |
//!
//! A block is reported as an advertisement when `probability × 100` is
//! strictly greater than the caller's sensitivity threshold. The maximum
//! probability is exactly 1.0, so a threshold of 100 never fires.

use serde::{Deserialize, Serialize};

use crate::spectrum::{band_energy, overall_loudness, FrequencyBand};

pub const LOW_BAND: FrequencyBand = FrequencyBand::new(200, 2_000);
pub const MID_BAND: FrequencyBand = FrequencyBand::new(2_000, 4_000);
pub const HIGH_BAND: FrequencyBand = FrequencyBand::new(4_000, 8_000);

pub const MID_TO_LOW_RATIO: f64 = 1.5;
pub const HIGH_TO_LOW_RATIO: f64 = 1.2;
pub const LOUDNESS_GATE_DB: f64 = -10.0;

pub const MID_WEIGHT: f64 = 0.3;
pub const HIGH_WEIGHT: f64 = 0.3;
pub const LOUDNESS_WEIGHT: f64 = 0.4;

/// Features extracted from one transformed block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralFeatures {
    pub low_energy: f64,
    pub mid_energy: f64,
    pub high_energy: f64,
    /// May be `-inf` for a silent block.
    pub loudness_db: f64,
}

impl SpectralFeatures {
    /// Extract the three band energies and overall loudness from a packed spectrum.
    pub fn extract(spectrum: &[f64], sample_rate: u32) -> Self {
        Self {
            low_energy: band_energy(spectrum, LOW_BAND, sample_rate),
            mid_energy: band_energy(spectrum, MID_BAND, sample_rate),
            high_energy: band_energy(spectrum, HIGH_BAND, sample_rate),
            loudness_db: overall_loudness(spectrum),
        }
    }

    /// Heuristic advertisement probability in `[0.0, 1.0]`.
    pub fn ad_probability(&self) -> f64 {
        let mut probability = 0.0;
        if self.mid_energy > self.low_energy * MID_TO_LOW_RATIO {
            probability += MID_WEIGHT;
        }
        if self.high_energy > self.low_energy * HIGH_TO_LOW_RATIO {
            probability += HIGH_WEIGHT;
        }
        if self.loudness_db > LOUDNESS_GATE_DB {
            probability += LOUDNESS_WEIGHT;
        }
        probability
    }
}

/// Outcome of classifying one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub features: SpectralFeatures,
    pub probability: f64,
    pub threshold: i32,
    pub is_advertisement: bool,
}

/// Classify a block's features against an integer percentage threshold.
///
/// The threshold is not range-checked: values ≥ 100 never fire and negative
/// values always fire.
pub fn classify(features: SpectralFeatures, sensitivity_threshold: i32) -> Classification {
    let probability = features.ad_probability();
    Classification {
        features,
        probability,
        threshold: sensitivity_threshold,
        is_advertisement: exceeds_threshold(probability, sensitivity_threshold),
    }
}

/// `probability × 100 > threshold`, strict.
pub fn exceeds_threshold(probability: f64, sensitivity_threshold: i32) -> bool {
    probability * 100.0 > f64::from(sensitivity_threshold)
}
