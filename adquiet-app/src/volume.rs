//! Output volume backends for the monitor.

use std::process::Command;
use std::sync::Arc;

use adquiet_core::error::{AdQuietError, Result};
use adquiet_core::VolumeControl;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::settings::VolumeBackendKind;

const SINK: &str = "@DEFAULT_AUDIO_SINK@";

/// Volume in percent; wpctl allows boosting past 1.0 but ducking never needs it.
const WPCTL_MAX_PERCENT: u32 = 100;

/// PipeWire default sink through `wpctl`.
#[derive(Debug, Default)]
pub struct WpctlVolume;

impl WpctlVolume {
    fn run(args: &[&str]) -> Result<String> {
        let output = Command::new("wpctl").args(args).output()?;
        if !output.status.success() {
            return Err(AdQuietError::Volume(format!(
                "wpctl {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse `Volume: 0.45` (optionally followed by `[MUTED]`) into percent.
pub fn parse_wpctl_volume(raw: &str) -> Result<u32> {
    let value = raw
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AdQuietError::Volume(format!("unexpected wpctl output: {raw:?}")))?;
    let fraction = value
        .parse::<f32>()
        .map_err(|_| AdQuietError::Volume(format!("unexpected wpctl volume: {value:?}")))?;
    Ok((fraction * 100.0).round().max(0.0) as u32)
}

impl VolumeControl for WpctlVolume {
    fn current(&self) -> Result<u32> {
        parse_wpctl_volume(&Self::run(&["get-volume", SINK])?)
    }

    fn max(&self) -> Result<u32> {
        Ok(WPCTL_MAX_PERCENT)
    }

    fn set(&self, level: u32) -> Result<()> {
        let level = level.min(WPCTL_MAX_PERCENT);
        Self::run(&["set-volume", SINK, &format!("{level}%")])?;
        debug!(level, "wpctl volume set");
        Ok(())
    }
}

/// Keeps the level in memory and logs instead of touching the mixer.
#[derive(Debug)]
pub struct DryRunVolume {
    level: Mutex<u32>,
    max: u32,
}

impl DryRunVolume {
    pub fn new(level: u32, max: u32) -> Self {
        Self {
            level: Mutex::new(level.min(max)),
            max,
        }
    }
}

impl Default for DryRunVolume {
    fn default() -> Self {
        Self::new(WPCTL_MAX_PERCENT, WPCTL_MAX_PERCENT)
    }
}

impl VolumeControl for DryRunVolume {
    fn current(&self) -> Result<u32> {
        Ok(*self.level.lock())
    }

    fn max(&self) -> Result<u32> {
        Ok(self.max)
    }

    fn set(&self, level: u32) -> Result<()> {
        let level = level.min(self.max);
        let previous = std::mem::replace(&mut *self.level.lock(), level);
        info!(previous, level, "dry-run volume change");
        Ok(())
    }
}

pub fn create_volume_control(kind: VolumeBackendKind) -> Arc<dyn VolumeControl> {
    match kind {
        VolumeBackendKind::Wpctl => Arc::new(WpctlVolume),
        VolumeBackendKind::DryRun => Arc::new(DryRunVolume::default()),
    }
}
