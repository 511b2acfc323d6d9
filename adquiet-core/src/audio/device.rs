//! Input device enumeration and selection.
//!
//! Ad detection listens to whatever the TV or player is outputting, so
//! loopback/monitor inputs and line-ins rank above microphones.

use serde::{Deserialize, Serialize};

/// Rough classification of an input device by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Captures system/output audio (Stereo Mix, PulseAudio monitor, …).
    Loopback,
    /// Analog or HDMI line input.
    LineIn,
    Microphone,
    Other,
}

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device name reported by the OS.
    pub name: String,
    pub is_default: bool,
    pub kind: InputKind,
    /// Highest-ranked device in the list.
    pub is_recommended: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "monitor of",
    ".monitor",
    "virtual output",
];

const LINE_IN_KEYWORDS: &[&str] = &["line in", "line-in", "linein", "aux", "hdmi", "capture card"];

const MIC_KEYWORDS: &[&str] = &["microphone", "mic", "headset", "webcam", "array"];

/// Classify a device by its name.
pub fn classify_input_name(name: &str) -> InputKind {
    let lowered = name.trim().to_ascii_lowercase();
    if LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        InputKind::Loopback
    } else if LINE_IN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        InputKind::LineIn
    } else if MIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        InputKind::Microphone
    } else {
        InputKind::Other
    }
}

/// Score a device for monitoring program audio. Higher is better.
pub fn monitoring_preference_score(name: &str, is_default: bool) -> i32 {
    let base = match classify_input_name(name) {
        InputKind::Loopback => 10,
        InputKind::LineIn => 8,
        InputKind::Microphone => 4,
        InputKind::Other => 2,
    };
    base + i32::from(is_default)
}

/// Mark the best device as recommended and sort best-first.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
fn rank(mut list: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    if let Some((idx, _)) = list
        .iter()
        .enumerate()
        .max_by_key(|(_, d)| monitoring_preference_score(&d.name, d.is_default))
    {
        list[idx].is_recommended = true;
    }
    list.sort_by_key(|d| {
        (
            !d.is_recommended,
            -monitoring_preference_score(&d.name, d.is_default),
            d.name.to_ascii_lowercase(),
        )
    });
    list
}

/// List all available audio input devices, best candidate first.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            return Vec::new();
        }
    };

    let list = devices
        .enumerate()
        .map(|(idx, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
            DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                kind: classify_input_name(&name),
                name,
                is_recommended: false,
            }
        })
        .collect();
    rank(list)
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    Vec::new()
}

/// Resolve an input device: the preferred name if present, otherwise the
/// system default, otherwise the first available input.
///
/// # Errors
/// `AdQuietError::NoInputDevice` when the host has no inputs at all.
#[cfg(feature = "audio-cpal")]
pub fn select_input_device(preferred_name: Option<&str>) -> crate::error::Result<cpal::Device> {
    use cpal::traits::{DeviceTrait, HostTrait};
    use tracing::warn;

    use crate::error::AdQuietError;

    let host = cpal::default_host();

    if let Some(preferred) = preferred_name {
        match host.input_devices() {
            Ok(mut devices) => {
                if let Some(device) =
                    devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false))
                {
                    return Ok(device);
                }
                warn!(preferred, "preferred input device not found, falling back");
            }
            Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
        }
    }

    if let Some(device) = host.default_input_device() {
        return Ok(device);
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| AdQuietError::AudioDevice(e.to_string()))?;
    let fallback = devices.next().ok_or(AdQuietError::NoInputDevice)?;
    warn!("no default input device, falling back to first available input");
    Ok(fallback)
}
