//! Live capture through cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block or perform I/O, and only allocates while its mono
//! scratch buffer grows to the device's callback size. It downmixes to mono
//! f32 and writes into an SPSC ring buffer whose `push_slice` is lock-free.
//! While capture is stopped the callback returns immediately.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS), but analysis passes run on arbitrary tokio blocking threads. The
//! stream therefore lives on a dedicated owner thread that opens the device,
//! reports the outcome over a oneshot channel, then parks until the capture
//! handle is released or dropped. Only the ring consumer and an atomic flag
//! cross threads.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::{
    traits::{DeviceTrait, StreamTrait},
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error, info, warn};

use super::{
    device::select_input_device, resample::RateAdapter, AudioConfig, CaptureBackend,
    CaptureSource, CHANNELS, DEFAULT_BLOCK_SIZE, SAMPLE_RATE,
};
use crate::{
    buffering::{create_sample_ring, ring_capacity, Consumer, Producer, SampleConsumer, SampleProducer},
    error::{AdQuietError, Result},
};

/// Samples drained from the ring per `pop_slice`.
const DRAIN_CHUNK: usize = 1024;

/// Input frames per rubato call when the device is not at 44.1 kHz.
const ADAPTER_CHUNK: usize = 1024;

/// Sleep while the ring is empty (avoids busy-waiting a core).
const EMPTY_POLL: Duration = Duration::from_millis(2);

/// Worst-case device rate / analysis rate (192 kHz / 44.1 kHz, rounded up).
const MAX_RATE_FACTOR: usize = 5;

/// Options for opening a live input.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Input device name; `None` picks the system default.
    pub preferred_device: Option<String>,
    /// Use this block size instead of the device minimum.
    pub block_size_override: Option<usize>,
    /// Extra time a read may wait beyond one block's duration before it is
    /// reported as short.
    pub read_timeout_margin: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            preferred_device: None,
            block_size_override: None,
            read_timeout_margin: Duration::from_millis(500),
        }
    }
}

/// Opens [`CpalCapture`] sources.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    options: CaptureOptions,
}

impl CpalBackend {
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }
}

impl CaptureBackend for CpalBackend {
    type Source = CpalCapture;

    fn min_block_size(&self) -> Result<usize> {
        if let Some(block_size) = self.options.block_size_override {
            return Ok(block_size);
        }
        let device = select_input_device(self.options.preferred_device.as_deref())?;
        let (supported, _) = negotiate_format(&device)?;
        Ok(min_block_size(&supported))
    }

    fn open(&self, config: &AudioConfig) -> Result<CpalCapture> {
        CpalCapture::open(&self.options, config)
    }
}

/// An open cpal input stream feeding a sample ring.
pub struct CpalCapture {
    consumer: SampleConsumer,
    /// Callback gate: samples are only pushed while this is `true`.
    capturing: Arc<AtomicBool>,
    adapter: RateAdapter,
    read_timeout: Duration,
    shutdown_tx: Option<Sender<()>>,
    owner: Option<JoinHandle<()>>,
}

impl CpalCapture {
    /// Open the input device and start its stream in the gated (silent) state.
    ///
    /// Blocks until the owner thread confirms the stream is playing.
    ///
    /// # Errors
    /// `NoInputDevice`, `AudioDevice`, `AudioStream` or `UnsupportedFormat`
    /// when the device cannot be opened.
    pub fn open(options: &CaptureOptions, config: &AudioConfig) -> Result<Self> {
        let (producer, consumer) =
            create_sample_ring(ring_capacity(config.block_size() * MAX_RATE_FACTOR));
        let capturing = Arc::new(AtomicBool::new(false));

        // Oneshot: owner thread reports the device rate or the open error.
        let (open_tx, open_rx) = bounded::<Result<u32>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let preferred = options.preferred_device.clone();
        let gate = Arc::clone(&capturing);

        let owner = thread::Builder::new()
            .name("adquiet-capture".into())
            .spawn(move || {
                let stream = match open_stream(preferred.as_deref(), producer, gate) {
                    Ok((stream, device_rate)) => {
                        let _ = open_tx.send(Ok(device_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                // Parked until release/drop sends or disconnects.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("capture stream closed");
            })?;

        let device_rate = match open_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = owner.join();
                return Err(e);
            }
            Err(_) => {
                let _ = owner.join();
                return Err(AdQuietError::AudioStream(
                    "capture thread exited before opening the stream".into(),
                ));
            }
        };

        let adapter = RateAdapter::new(device_rate, SAMPLE_RATE, ADAPTER_CHUNK)?;
        if !adapter.is_passthrough() {
            info!(device_rate, "device does not capture at 44.1 kHz, resampling");
        }

        Ok(Self {
            consumer,
            capturing,
            adapter,
            read_timeout: config.block_duration() + options.read_timeout_margin,
            shutdown_tx: Some(shutdown_tx),
            owner: Some(owner),
        })
    }

    fn close(&mut self) {
        self.capturing.store(false, Ordering::Release);
        // Dropping the sender wakes the owner thread even if the send fails.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(owner) = self.owner.take() {
            if owner.join().is_err() {
                error!("capture owner thread panicked");
            }
        }
    }
}

impl CaptureSource for CpalCapture {
    fn start_capture(&mut self) -> Result<()> {
        if self.owner.as_ref().map_or(true, |h| h.is_finished()) {
            return Err(AdQuietError::AudioStream("capture stream is closed".into()));
        }
        // Discard anything left over from a previous pass.
        self.consumer.clear();
        self.adapter.reset();
        self.capturing.store(true, Ordering::Release);
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut raw = vec![0f32; DRAIN_CHUNK];
        let mut converted: Vec<f32> = Vec::with_capacity(block.len() + DRAIN_CHUNK);

        while converted.len() < block.len() {
            let n = self.consumer.pop_slice(&mut raw);
            if n == 0 {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(EMPTY_POLL);
                continue;
            }
            self.adapter.convert_into(&raw[..n], &mut converted);
        }

        let filled = converted.len().min(block.len());
        for (dst, &sample) in block.iter_mut().zip(&converted[..filled]) {
            *dst = f32_to_i16(sample);
        }
        Ok(filled)
    }

    fn stop_capture(&mut self) {
        self.capturing.store(false, Ordering::Release);
    }

    fn release(mut self) {
        self.close();
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Normalised f32 back to 16-bit PCM.
fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16
}

/// Prefer a native 44.1 kHz mono i16 configuration; otherwise take the
/// device default and convert in software. Returns the chosen config and
/// whether it is native.
fn negotiate_format(device: &cpal::Device) -> Result<(SupportedStreamConfig, bool)> {
    let native = device
        .supported_input_configs()
        .map_err(|e| AdQuietError::AudioDevice(e.to_string()))?
        .find(|range| {
            range.channels() == CHANNELS
                && range.sample_format() == SampleFormat::I16
                && range.min_sample_rate().0 <= SAMPLE_RATE
                && range.max_sample_rate().0 >= SAMPLE_RATE
        })
        .map(|range| range.with_sample_rate(SampleRate(SAMPLE_RATE)));

    match native {
        Some(config) => Ok((config, true)),
        None => device
            .default_input_config()
            .map(|config| (config, false))
            .map_err(|e| AdQuietError::AudioDevice(e.to_string())),
    }
}

/// Device-reported minimum buffer size for a configuration.
fn min_block_size(config: &SupportedStreamConfig) -> usize {
    match config.buffer_size() {
        SupportedBufferSize::Range { min, .. } if *min > 0 => *min as usize,
        _ => DEFAULT_BLOCK_SIZE,
    }
}

/// Runs on the owner thread: select, negotiate, build and start the stream.
fn open_stream(
    preferred: Option<&str>,
    producer: SampleProducer,
    capturing: Arc<AtomicBool>,
) -> Result<(Stream, u32)> {
    let device = select_input_device(preferred)?;
    let (supported, native) = negotiate_format(&device)?;

    let device_rate = supported.sample_rate().0;
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: SampleRate(device_rate),
        buffer_size: BufferSize::Default,
    };

    info!(
        device = device.name().unwrap_or_default().as_str(),
        sample_rate = device_rate,
        channels = config.channels,
        format = ?supported.sample_format(),
        native,
        "opening input device"
    );

    let stream = match supported.sample_format() {
        SampleFormat::I16 => build_input::<i16>(&device, &config, producer, capturing),
        SampleFormat::F32 => build_input::<f32>(&device, &config, producer, capturing),
        SampleFormat::U8 => build_input::<u8>(&device, &config, producer, capturing),
        fmt => return Err(AdQuietError::UnsupportedFormat(format!("{fmt:?}"))),
    }
    .map_err(|e| AdQuietError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AdQuietError::AudioStream(e.to_string()))?;

    Ok((stream, device_rate))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: SampleProducer,
    capturing: Arc<AtomicBool>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let mut mono: Vec<f32> = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            if !capturing.load(Ordering::Acquire) {
                return;
            }

            let frames = data.len() / channels;
            mono.resize(frames, 0.0);
            for (frame, slot) in data.chunks_exact(channels).zip(mono.iter_mut()) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                *slot = sum / channels as f32;
            }

            let written = producer.push_slice(&mono);
            if written < mono.len() {
                warn!("sample ring full: dropped {} frames", mono.len() - written);
            }
        },
        |err| error!("audio stream error: {err}"),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_round_trips_through_normalised_f32() {
        for sample in [i16::MIN, -12_345, -1, 0, 1, 12_345, i16::MAX] {
            let normalised = f32::from(sample) / 32_768.0;
            assert_eq!(f32_to_i16(normalised), sample);
        }
    }

    #[test]
    fn out_of_range_f32_clips() {
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(-1.5), i16::MIN);
    }

    #[test]
    fn default_read_margin_is_half_a_second() {
        assert_eq!(
            CaptureOptions::default().read_timeout_margin,
            Duration::from_millis(500)
        );
    }
}
