//! Capture sources.
//!
//! A [`CaptureBackend`] knows how to open a device and what block size it
//! needs; the [`CaptureSource`] it returns is the open device. The analyzer
//! session owns exactly one source between `initialize()` and `release()`
//! and brackets every read with `start_capture` / `stop_capture`.
//!
//! Backends:
//! - [`capture::CpalBackend`]: live input through cpal (feature `audio-cpal`).
//! - [`wav::WavBackend`]: replays a 44.1 kHz WAV file block by block.

#[cfg(feature = "audio-cpal")]
pub mod capture;
pub mod device;
pub mod resample;
pub mod wav;

use crate::error::{AdQuietError, Result};

/// Analysis sample rate (Hz). Every source delivers samples at this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Mono.
pub const CHANNELS: u16 = 1;

/// Signed 16-bit PCM.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Block size used when a device does not report a minimum buffer size.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Immutable capture format for one session.
///
/// The block size sizes every sample and spectrum buffer for the lifetime of
/// the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    block_size: usize,
}

impl AudioConfig {
    /// # Errors
    /// `AdQuietError::InvalidBlockSize` when `block_size == 0`.
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(AdQuietError::InvalidBlockSize(block_size));
        }
        Ok(Self { block_size })
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn bits_per_sample(&self) -> u16 {
        BITS_PER_SAMPLE
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Wall-clock length of one block.
    pub fn block_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.block_size as f64 / f64::from(SAMPLE_RATE))
    }
}

/// An open capture device.
///
/// Implementations are driven from one analysis pass at a time; the session
/// serialises access.
pub trait CaptureSource: Send + 'static {
    /// Begin delivering samples. Samples produced before this call are discarded.
    fn start_capture(&mut self) -> Result<()>;

    /// Fill `block` with the next samples, blocking until it is full or the
    /// device fails. Returns how many samples were written; anything less
    /// than `block.len()` is a short read.
    fn read_block(&mut self, block: &mut [i16]) -> Result<usize>;

    /// Stop delivering samples. Must be safe to call when not capturing.
    fn stop_capture(&mut self);

    /// Close the device. The default just drops the source.
    fn release(self)
    where
        Self: Sized,
    {
    }
}

/// Opens capture sources for a session.
pub trait CaptureBackend: Send + Sync + 'static {
    type Source: CaptureSource;

    /// Minimum block size the device accepts for 44.1 kHz mono 16-bit
    /// capture. Queried once, when the session is created.
    fn min_block_size(&self) -> Result<usize>;

    /// Open the device for the given format.
    fn open(&self, config: &AudioConfig) -> Result<Self::Source>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(matches!(
            AudioConfig::new(0),
            Err(AdQuietError::InvalidBlockSize(0))
        ));
    }

    #[test]
    fn config_reports_fixed_format() {
        let cfg = AudioConfig::new(1024).expect("valid block size");
        assert_eq!(cfg.sample_rate(), 44_100);
        assert_eq!(cfg.channels(), 1);
        assert_eq!(cfg.bits_per_sample(), 16);
        assert_eq!(cfg.block_size(), 1024);
    }

    #[test]
    fn block_duration_matches_rate() {
        let cfg = AudioConfig::new(44_100).expect("valid block size");
        assert_eq!(cfg.block_duration(), std::time::Duration::from_secs(1));
    }
}
