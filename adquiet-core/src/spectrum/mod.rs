//! Spectral analysis primitives.
//!
//! ```text
//! SampleBlock (i16) ─► f64 buffer ─► SpectralTransform::forward_real (in place)
//!                                          │
//!                         ┌────────────────┴────────────────┐
//!                   band_energy(low/mid/high)        overall_loudness
//! ```

pub mod bands;
pub mod transform;

pub use bands::{band_energy, hz_to_bin, overall_loudness, FrequencyBand, SILENT_LOUDNESS_DB};
pub use transform::SpectralTransform;
