//! Periodic driver: one analysis pass per interval, volume reduction on a hit.
//!
//! ## Loop
//!
//! ```text
//! loop {
//!     prefs = preferences snapshot (sensitivity, enabled)
//!     if enabled:
//!         is_ad = session.detect_advertisement(sensitivity)
//!         if is_ad: volume.set(reduced_volume(current, max, sensitivity))
//!         broadcast DetectionEvent
//!     sleep(interval)            // default 1 s
//! } until stop
//! ```
//!
//! Stopping is cooperative: a `watch` channel is raced against both the
//! pass and the sleep. An abandoned pass keeps running on the blocking pool
//! and stops capture itself, so the device is never left recording.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    audio::CaptureBackend,
    engine::{AnalyzerSession, SessionState},
    error::{AdQuietError, Result},
    ipc::events::{DetectionEvent, MonitorStatus, MonitorStatusEvent},
};

/// Broadcast channel capacity for slow subscribers.
const BROADCAST_CAP: usize = 64;

/// Sensitivity used when no preference has been stored.
pub const DEFAULT_SENSITIVITY: i32 = 70;

/// Source of the user's current settings, re-read on every tick.
pub trait Preferences: Send + Sync + 'static {
    /// Integer percentage passed straight to the classifier.
    fn sensitivity(&self) -> i32;
    fn enabled(&self) -> bool;
}

/// Preferences that never change.
#[derive(Debug, Clone, Copy)]
pub struct FixedPreferences {
    pub sensitivity: i32,
    pub enabled: bool,
}

impl Default for FixedPreferences {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            enabled: true,
        }
    }
}

impl Preferences for FixedPreferences {
    fn sensitivity(&self) -> i32 {
        self.sensitivity
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Output volume of the program audio being monitored.
pub trait VolumeControl: Send + Sync + 'static {
    fn current(&self) -> Result<u32>;
    fn max(&self) -> Result<u32>;
    fn set(&self, level: u32) -> Result<()>;
}

/// `current × (percent / 100)`, truncated and clamped into `[0, max]`.
pub fn reduced_volume(current: u32, max: u32, percent: i32) -> u32 {
    let scaled = current as f32 * (percent as f32 / 100.0);
    (scaled as i64).clamp(0, i64::from(max)) as u32
}

/// Read the current level and lower it to `percent` of itself.
/// Returns the level that was set.
pub fn reduce_volume(volume: &dyn VolumeControl, percent: i32) -> Result<u32> {
    let level = reduced_volume(volume.current()?, volume.max()?, percent);
    volume.set(level)?;
    Ok(level)
}

/// Configuration for the periodic monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pause between passes. Default: 1 s.
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Monitor that has not been started yet.
///
/// Subscribe before [`spawn`](Self::spawn) to be sure to see the first events.
pub struct Monitor {
    config: MonitorConfig,
    detection_tx: broadcast::Sender<DetectionEvent>,
    status_tx: broadcast::Sender<MonitorStatusEvent>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        let (detection_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config,
            detection_tx,
            status_tx,
        }
    }

    pub fn subscribe_detections(&self) -> broadcast::Receiver<DetectionEvent> {
        self.detection_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<MonitorStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn<B: CaptureBackend>(
        self,
        session: Arc<AnalyzerSession<B>>,
        preferences: Arc<dyn Preferences>,
        volume: Arc<dyn VolumeControl>,
    ) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);

        let ctx = LoopContext {
            session,
            preferences,
            volume,
            interval: self.config.interval,
            detection_tx: self.detection_tx.clone(),
            status_tx: self.status_tx.clone(),
        };
        let task = tokio::spawn(run_loop(ctx, stop_rx));

        MonitorHandle {
            stop_tx,
            task,
            detection_tx: self.detection_tx,
            status_tx: self.status_tx,
        }
    }
}

/// Handle to a running monitor loop.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    detection_tx: broadcast::Sender<DetectionEvent>,
    status_tx: broadcast::Sender<MonitorStatusEvent>,
}

impl MonitorHandle {
    pub fn subscribe_detections(&self) -> broadcast::Receiver<DetectionEvent> {
        self.detection_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<MonitorStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            error!("monitor task failed: {e}");
        }
    }
}

struct LoopContext<B: CaptureBackend> {
    session: Arc<AnalyzerSession<B>>,
    preferences: Arc<dyn Preferences>,
    volume: Arc<dyn VolumeControl>,
    interval: Duration,
    detection_tx: broadcast::Sender<DetectionEvent>,
    status_tx: broadcast::Sender<MonitorStatusEvent>,
}

impl<B: CaptureBackend> LoopContext<B> {
    fn set_status(&self, status: MonitorStatus, detail: Option<String>) {
        let _ = self.status_tx.send(MonitorStatusEvent { status, detail });
    }

    /// Apply the reduction off the async threads; mixer backends may shell out.
    async fn reduce_volume(&self, percent: i32) -> Result<u32> {
        let volume = Arc::clone(&self.volume);
        tokio::task::spawn_blocking(move || reduce_volume(volume.as_ref(), percent))
            .await
            .map_err(|e| AdQuietError::Volume(format!("volume task failed: {e}")))?
    }
}

async fn run_loop<B: CaptureBackend>(ctx: LoopContext<B>, mut stop_rx: watch::Receiver<bool>) {
    if ctx.session.state() == SessionState::Ready {
        ctx.set_status(MonitorStatus::Monitoring, None);
    } else {
        warn!("monitor started before the analyzer session was initialized");
        ctx.set_status(
            MonitorStatus::Error,
            Some("analyzer session is not initialized".into()),
        );
    }
    info!(interval_ms = ctx.interval.as_millis() as u64, "monitor started");

    let mut seq = 0u64;
    loop {
        if *stop_rx.borrow() {
            break;
        }

        if ctx.preferences.enabled() {
            let sensitivity = ctx.preferences.sensitivity();

            let is_advertisement = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                detected = ctx.session.detect_advertisement(sensitivity) => detected,
            };

            let mut volume_reduced = false;
            if is_advertisement {
                match ctx.reduce_volume(sensitivity).await {
                    Ok(level) => {
                        volume_reduced = true;
                        info!(level, sensitivity, "advertisement detected, volume reduced");
                    }
                    Err(e) => warn!("advertisement detected but volume reduction failed: {e}"),
                }
            }

            seq += 1;
            let _ = ctx.detection_tx.send(DetectionEvent {
                seq,
                is_advertisement,
                threshold: sensitivity,
                volume_reduced,
            });
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }

    ctx.set_status(MonitorStatus::Stopped, None);
    info!("monitor stopped");
}
