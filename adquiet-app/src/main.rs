//! AdQuiet host.
//!
//! Listens to the configured input, runs one analysis pass per poll interval
//! and ducks the output volume whenever a pass looks like an advertisement.
//! Runs until Ctrl-C.

mod settings;
mod volume;

use std::sync::Arc;
use std::time::Duration;

use adquiet_core::{
    audio::device::list_input_devices, AnalyzerSession, CaptureOptions, CpalBackend, Monitor,
    MonitorConfig,
};
use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use settings::{default_settings_path, SharedSettings};
use volume::create_volume_control;

/// How often the settings file is checked for edits.
const SETTINGS_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("AdQuiet starting");

    let settings = SharedSettings::load(default_settings_path());
    let app_settings = settings.snapshot();
    info!(
        settings_path = ?settings.path(),
        sensitivity = app_settings.ad_sensitivity,
        enabled = app_settings.enable_ad_control,
        poll_interval_ms = app_settings.poll_interval_ms,
        volume_backend = ?app_settings.volume_backend,
        "settings loaded"
    );

    for device in list_input_devices() {
        debug!(
            name = %device.name,
            kind = ?device.kind,
            default = device.is_default,
            recommended = device.is_recommended,
            "input device"
        );
    }

    // ── Analyzer ──────────────────────────────────────────────────────────
    let backend = CpalBackend::new(CaptureOptions {
        preferred_device: app_settings.preferred_input_device.clone(),
        ..CaptureOptions::default()
    });
    let session = Arc::new(
        tokio::task::spawn_blocking(move || AnalyzerSession::new(backend))
            .await
            .context("analyzer setup task failed")?
            .context("failed to query the capture device")?,
    );

    let session_for_init = Arc::clone(&session);
    match tokio::task::spawn_blocking(move || session_for_init.initialize()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("failed to open capture device: {e}"),
        Err(e) => error!("capture initialization task failed: {e}"),
    }

    // ── Monitor ───────────────────────────────────────────────────────────
    let monitor = Monitor::new(MonitorConfig {
        interval: app_settings.poll_interval(),
    });
    let mut detection_rx = monitor.subscribe_detections();
    let mut status_rx = monitor.subscribe_status();

    tokio::spawn(async move {
        loop {
            match detection_rx.recv().await {
                Ok(event) if event.is_advertisement => info!(
                    seq = event.seq,
                    threshold = event.threshold,
                    volume_reduced = event.volume_reduced,
                    "advertisement"
                ),
                Ok(event) => debug!(seq = event.seq, "no advertisement"),
                Err(RecvError::Lagged(n)) => warn!("detection receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => info!(status = ?event.status, detail = ?event.detail, "monitor status"),
                Err(RecvError::Lagged(n)) => warn!("status receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let settings_for_reload = settings.clone();
    let reloader = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SETTINGS_RELOAD_INTERVAL);
        loop {
            ticker.tick().await;
            let settings = settings_for_reload.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || settings.reload_if_changed()).await
            {
                warn!("settings reload task failed: {e}");
            }
        }
    });

    let handle = monitor.spawn(
        Arc::clone(&session),
        Arc::new(settings),
        create_volume_control(app_settings.volume_backend),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    reloader.abort();
    handle.stop().await;
    let session_for_release = Arc::clone(&session);
    tokio::task::spawn_blocking(move || session_for_release.release())
        .await
        .context("capture release task failed")?;

    let diag = session.diagnostics_snapshot();
    info!(
        passes = diag.passes,
        completed = diag.completed,
        positives = diag.positives,
        short_reads = diag.short_reads,
        read_errors = diag.read_errors,
        "AdQuiet stopped"
    );
    Ok(())
}
