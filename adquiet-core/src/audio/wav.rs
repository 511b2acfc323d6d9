//! WAV file replay as a capture source.
//!
//! The whole file is decoded to mono i16 on `open`; each `read_block` hands
//! out the next `block.len()` samples. The final partial block is a short
//! read, exactly like a device that stopped delivering.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{AudioConfig, CaptureBackend, CaptureSource, SAMPLE_RATE};
use crate::error::{AdQuietError, Result};

/// Opens [`WavSource`]s for one file.
#[derive(Debug, Clone)]
pub struct WavBackend {
    path: PathBuf,
    block_size: usize,
}

impl WavBackend {
    pub fn new(path: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            path: path.into(),
            block_size,
        }
    }
}

impl CaptureBackend for WavBackend {
    type Source = WavSource;

    fn min_block_size(&self) -> Result<usize> {
        Ok(self.block_size)
    }

    fn open(&self, _config: &AudioConfig) -> Result<WavSource> {
        WavSource::open(&self.path)
    }
}

/// Decoded WAV samples with a read cursor.
#[derive(Debug, Clone)]
pub struct WavSource {
    samples: Vec<i16>,
    cursor: usize,
    capturing: bool,
}

impl WavSource {
    /// Decode a 44.1 kHz WAV file into mono i16.
    ///
    /// # Errors
    /// `Wav` on decode failure, `UnsupportedFormat` for other sample rates.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate != SAMPLE_RATE {
            return Err(AdQuietError::UnsupportedFormat(format!(
                "{} Hz WAV (expected {SAMPLE_RATE} Hz)",
                spec.sample_rate
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| v * 32_768.0))
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int if spec.bits_per_sample <= 16 => reader
                .samples::<i16>()
                .map(|s| s.map(f32::from))
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let shift = spec.bits_per_sample - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as f32))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples: Vec<i16> = interleaved
            .chunks_exact(channels)
            .map(|frame| {
                let mean = frame.iter().sum::<f32>() / channels as f32;
                mean.round().clamp(-32_768.0, 32_767.0) as i16
            })
            .collect();

        info!(
            path = %path.display(),
            channels,
            frames = samples.len(),
            "WAV source opened"
        );

        Ok(Self::from_samples(samples))
    }

    /// In-memory source, mainly for tests and synthetic signals.
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self {
            samples,
            cursor: 0,
            capturing: false,
        }
    }

    /// Samples not yet handed out.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }
}

impl CaptureSource for WavSource {
    fn start_capture(&mut self) -> Result<()> {
        self.capturing = true;
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<usize> {
        if !self.capturing {
            return Err(AdQuietError::AudioStream(
                "read_block called while not capturing".into(),
            ));
        }
        let n = block.len().min(self.remaining());
        block[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    fn stop_capture(&mut self) {
        self.capturing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for &s in samples {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("adquiet-{}-{name}.wav", std::process::id()))
    }

    #[test]
    fn stereo_file_is_averaged_to_mono() {
        let path = temp_path("stereo");
        write_wav(&path, 2, 44_100, &[100, 300, -50, -150, 7, 7]);

        let mut source = WavSource::open(&path).expect("open wav");
        source.start_capture().unwrap();
        let mut block = [0i16; 3];
        assert_eq!(source.read_block(&mut block).unwrap(), 3);
        assert_eq!(block, [200, -100, 7]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn wrong_sample_rate_is_rejected() {
        let path = temp_path("48k");
        write_wav(&path, 1, 48_000, &[0; 16]);

        let err = WavSource::open(&path).expect_err("48 kHz should be rejected");
        assert!(matches!(err, AdQuietError::UnsupportedFormat(_)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn end_of_file_is_a_short_read() {
        let mut source = WavSource::from_samples(vec![1; 10]);
        source.start_capture().unwrap();

        let mut block = [0i16; 8];
        assert_eq!(source.read_block(&mut block).unwrap(), 8);
        assert_eq!(source.read_block(&mut block).unwrap(), 2);
        assert_eq!(source.read_block(&mut block).unwrap(), 0);
    }

    #[test]
    fn reading_while_stopped_is_an_error() {
        let mut source = WavSource::from_samples(vec![1; 10]);
        let mut block = [0i16; 4];
        assert!(source.read_block(&mut block).is_err());
        assert_eq!(source.remaining(), 10);
    }
}
