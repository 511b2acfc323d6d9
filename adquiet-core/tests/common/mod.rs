//! Scripted capture backend shared by the integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use adquiet_core::error::{AdQuietError, Result};
use adquiet_core::{AudioConfig, CaptureBackend, CaptureSource};
use parking_lot::Mutex;

pub const BLOCK: usize = 1024;

/// Everything the backend and its sources did, observable from the test.
#[derive(Debug, Default)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub reads: AtomicUsize,
    pub releases: AtomicUsize,
    pub capturing: AtomicBool,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// What each `read_block` hands back.
#[derive(Debug, Clone)]
pub struct Script {
    pub samples: Vec<i16>,
    /// Serve only this many samples per read.
    pub short_by: usize,
    pub read_delay: Duration,
    pub fail_open: bool,
}

impl Script {
    pub fn block(samples: Vec<i16>) -> Self {
        Self {
            samples,
            short_by: 0,
            read_delay: Duration::ZERO,
            fail_open: false,
        }
    }
}

pub struct ScriptedBackend {
    pub calls: Arc<Calls>,
    pub script: Arc<Mutex<Script>>,
    pub block_size: usize,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> (Self, Arc<Calls>, Arc<Mutex<Script>>) {
        let calls = Arc::new(Calls::default());
        let script = Arc::new(Mutex::new(script));
        let backend = Self {
            calls: Arc::clone(&calls),
            script: Arc::clone(&script),
            block_size: BLOCK,
        };
        (backend, calls, script)
    }
}

impl CaptureBackend for ScriptedBackend {
    type Source = ScriptedSource;

    fn min_block_size(&self) -> Result<usize> {
        Ok(self.block_size)
    }

    fn open(&self, _config: &AudioConfig) -> Result<ScriptedSource> {
        if self.script.lock().fail_open {
            return Err(AdQuietError::NoInputDevice);
        }
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSource {
            calls: Arc::clone(&self.calls),
            script: Arc::clone(&self.script),
        })
    }
}

pub struct ScriptedSource {
    calls: Arc<Calls>,
    script: Arc<Mutex<Script>>,
}

impl CaptureSource for ScriptedSource {
    fn start_capture(&mut self) -> Result<()> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        self.calls.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<usize> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().clone();
        if !script.read_delay.is_zero() {
            std::thread::sleep(script.read_delay);
        }
        let n = block
            .len()
            .min(script.samples.len())
            .saturating_sub(script.short_by);
        block[..n].copy_from_slice(&script.samples[..n]);
        Ok(n)
    }

    fn stop_capture(&mut self) {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        self.calls.capturing.store(false, Ordering::SeqCst);
    }

    fn release(self) {
        self.calls.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sum of sines, each landing exactly on spectral bin `k` of a `BLOCK`-long
/// transform, rounded to i16.
pub fn tones(components: &[(usize, f64)]) -> Vec<i16> {
    (0..BLOCK)
        .map(|n| {
            let v: f64 = components
                .iter()
                .map(|&(k, amp)| amp * (2.0 * PI * k as f64 * n as f64 / BLOCK as f64).sin())
                .sum();
            v.round().clamp(-32_768.0, 32_767.0) as i16
        })
        .collect()
}

// With BLOCK = 1024 at 44.1 kHz the band slot ranges are low [4, 46),
// mid [46, 92) and high [92, 185). Spectral bin k occupies slots 2k and 2k+1.

/// Strong components in the mid and high slot ranges, nothing in low.
pub fn bright_loud_block() -> Vec<i16> {
    tones(&[(30, 8_000.0), (60, 8_000.0)])
}

/// Mid twice as strong as low, no deliberate high content.
pub fn mid_heavy_block() -> Vec<i16> {
    tones(&[(10, 4_000.0), (30, 8_000.0)])
}

pub fn silent_block() -> Vec<i16> {
    vec![0; BLOCK]
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
