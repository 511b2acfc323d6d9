//! `AnalyzerSession`: capture device lifecycle and analysis dispatch.
//!
//! ## Lifecycle
//!
//! ```text
//! AnalyzerSession::new(backend)    → block size frozen, FFT planned, Uninitialized
//!     └─► initialize()             → device opened, Ready (no-op when already Ready)
//!         └─► detect_advertisement → per pass: start → read → transform → classify → stop
//!             └─► release()        → device closed, Released
//! ```
//!
//! Analysis while Uninitialized or Released returns `false` without touching
//! any device. `initialize()` after `release()` opens the device again.
//!
//! ## Threading
//!
//! The device read blocks for roughly one block duration, so
//! `detect_advertisement` runs the pass inside `tokio::task::spawn_blocking`
//! and awaits it. Dropping the returned future does not interrupt the pass:
//! it finishes on the blocking pool and stops capture on its way out.
//!
//! A `parking_lot::Mutex` around the lifecycle state is held for the whole
//! start→stop sequence, so passes never interleave on one device. `release()`
//! takes the same lock and therefore waits for an in-flight pass.

pub mod pass;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    audio::{AudioConfig, CaptureBackend, CaptureSource},
    classifier::Classification,
    error::Result,
    spectrum::SpectralTransform,
};

pub use pass::{DiagnosticsSnapshot, PassDiagnostics};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Released,
}

/// Lifecycle state that owns the open device, so a "ready" session without
/// a device cannot be represented.
enum Lifecycle<S> {
    Uninitialized,
    Ready(S),
    Released,
}

impl<S> Lifecycle<S> {
    fn state(&self) -> SessionState {
        match self {
            Lifecycle::Uninitialized => SessionState::Uninitialized,
            Lifecycle::Ready(_) => SessionState::Ready,
            Lifecycle::Released => SessionState::Released,
        }
    }
}

/// Everything a pass needs, cloneable into a blocking task.
struct PassRunner<S> {
    lifecycle: Arc<Mutex<Lifecycle<S>>>,
    transform: SpectralTransform,
    config: AudioConfig,
    diagnostics: Arc<PassDiagnostics>,
    last: Arc<Mutex<Option<Classification>>>,
}

impl<S> Clone for PassRunner<S> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            transform: self.transform.clone(),
            config: self.config,
            diagnostics: Arc::clone(&self.diagnostics),
            last: Arc::clone(&self.last),
        }
    }
}

impl<S: CaptureSource> PassRunner<S> {
    fn run(&self, sensitivity_threshold: i32) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        let state = lifecycle.state();
        let Lifecycle::Ready(source) = &mut *lifecycle else {
            debug!(?state, "analysis requested while not ready");
            self.diagnostics
                .skipped_not_ready
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return false;
        };

        let outcome = pass::run(
            source,
            &self.transform,
            &self.config,
            sensitivity_threshold,
            &self.diagnostics,
        );
        *self.last.lock() = outcome;
        outcome.is_some_and(|c| c.is_advertisement)
    }
}

/// Owns one capture device and runs analysis passes against it.
///
/// `AnalyzerSession` is `Send + Sync`; wrap it in an `Arc` to share it with
/// the monitor task.
pub struct AnalyzerSession<B: CaptureBackend> {
    backend: B,
    runner: PassRunner<B::Source>,
}

impl<B: CaptureBackend> AnalyzerSession<B> {
    /// Query the backend's minimum block size once and freeze the session
    /// format. Does not open the device.
    ///
    /// # Errors
    /// Backend query failures, or `InvalidBlockSize` if the device reports 0.
    pub fn new(backend: B) -> Result<Self> {
        let config = AudioConfig::new(backend.min_block_size()?)?;
        info!(
            block_size = config.block_size(),
            sample_rate = config.sample_rate(),
            "analyzer session created"
        );

        Ok(Self {
            backend,
            runner: PassRunner {
                lifecycle: Arc::new(Mutex::new(Lifecycle::Uninitialized)),
                transform: SpectralTransform::new(config.block_size()),
                config,
                diagnostics: Arc::new(PassDiagnostics::default()),
                last: Arc::new(Mutex::new(None)),
            },
        })
    }

    /// Open the capture device. A no-op when already Ready.
    ///
    /// # Errors
    /// Device open failures. The session stays in its previous state.
    pub fn initialize(&self) -> Result<()> {
        let mut lifecycle = self.runner.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Ready(_)) {
            debug!("analyzer session already initialized");
            return Ok(());
        }

        let source = self.backend.open(&self.runner.config)?;
        *lifecycle = Lifecycle::Ready(source);
        info!(
            block_size = self.runner.config.block_size(),
            "analyzer session ready"
        );
        Ok(())
    }

    /// Run one analysis pass on the blocking pool and await its decision.
    ///
    /// Returns `false` when not Ready, when the device read fails or is
    /// short, or when the pass task itself fails.
    pub async fn detect_advertisement(&self, sensitivity_threshold: i32) -> bool {
        let runner = self.runner.clone();
        match tokio::task::spawn_blocking(move || runner.run(sensitivity_threshold)).await {
            Ok(decision) => decision,
            Err(e) => {
                error!("analysis pass task failed: {e}");
                false
            }
        }
    }

    /// Same pass as [`detect_advertisement`](Self::detect_advertisement),
    /// on the calling thread.
    pub fn detect_advertisement_blocking(&self, sensitivity_threshold: i32) -> bool {
        self.runner.run(sensitivity_threshold)
    }

    /// Close the capture device. Safe to call in any state.
    ///
    /// Waits for an in-flight pass to finish first.
    pub fn release(&self) {
        let previous = {
            let mut lifecycle = self.runner.lifecycle.lock();
            std::mem::replace(&mut *lifecycle, Lifecycle::Released)
        };
        if let Lifecycle::Ready(source) = previous {
            source.release();
            info!("capture device released");
        }
    }

    /// Current lifecycle state (snapshot).
    pub fn state(&self) -> SessionState {
        self.runner.lifecycle.lock().state()
    }

    pub fn audio_config(&self) -> AudioConfig {
        self.runner.config
    }

    /// Result of the most recent pass; `None` if it made no decision.
    pub fn last_classification(&self) -> Option<Classification> {
        *self.runner.last.lock()
    }

    /// Snapshot of pass counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.runner.diagnostics.snapshot()
    }
}

impl<B: CaptureBackend> Drop for AnalyzerSession<B> {
    fn drop(&mut self) {
        self.release();
    }
}
