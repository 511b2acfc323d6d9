//! # adquiet-core
//!
//! Spectral advertisement detector for live program audio.
//!
//! ## Architecture
//!
//! ```text
//! Input device → cpal callback → SPSC RingBuffer → CpalCapture::read_block
//!                                                        │
//!                                     AnalyzerSession pass (spawn_blocking)
//!                                                        │
//!                                    SpectralTransform::forward_real (in place)
//!                                                        │
//!                                  band energy + loudness → classify(threshold)
//!                                                        │
//!                                  Monitor → VolumeControl + broadcast events
//! ```
//!
//! The audio callback does not allocate. All heap work happens in the pass.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod monitor;
pub mod spectrum;

// Convenience re-exports for downstream crates
pub use audio::{AudioConfig, CaptureBackend, CaptureSource};
pub use classifier::{Classification, SpectralFeatures};
pub use engine::{AnalyzerSession, SessionState};
pub use error::AdQuietError;
pub use ipc::events::{DetectionEvent, MonitorStatus, MonitorStatusEvent};
pub use monitor::{
    FixedPreferences, Monitor, MonitorConfig, MonitorHandle, Preferences, VolumeControl,
};

#[cfg(feature = "audio-cpal")]
pub use audio::capture::{CaptureOptions, CpalBackend};
