//! Persistent host settings (JSON file in the platform data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use adquiet_core::Preferences;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Bounds of the sensitivity slider.
pub const MIN_SENSITIVITY: i32 = 10;
pub const MAX_SENSITIVITY: i32 = 90;

pub const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeBackendKind {
    Wpctl,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub ad_sensitivity: i32,
    pub enable_ad_control: bool,
    pub preferred_input_device: Option<String>,
    pub poll_interval_ms: u64,
    pub volume_backend: VolumeBackendKind,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ad_sensitivity: 70,
            enable_ad_control: true,
            preferred_input_device: None,
            poll_interval_ms: 1_000,
            volume_backend: VolumeBackendKind::Wpctl,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.ad_sensitivity = self.ad_sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        self.poll_interval_ms = self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Apply `ADQUIET_SENSITIVITY` / `ADQUIET_ENABLED` style overrides.
    /// Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("ADQUIET_SENSITIVITY") {
            match raw.trim().parse::<i32>() {
                Ok(v) => self.ad_sensitivity = v,
                Err(_) => warn!(value = %raw, "ignoring invalid ADQUIET_SENSITIVITY"),
            }
        }
        if let Some(raw) = lookup("ADQUIET_ENABLED") {
            match parse_flag(&raw) {
                Some(v) => self.enable_ad_control = v,
                None => warn!(value = %raw, "ignoring invalid ADQUIET_ENABLED"),
            }
        }
        self.normalize();
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("AdQuiet")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("adquiet")
            .join("settings.json")
    }
}

/// Read settings from `path`; a missing or corrupt file yields defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.apply_overrides(|key| std::env::var(key).ok());
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Settings shared with the monitor, reloaded when the file changes.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    path: PathBuf,
    inner: Arc<Mutex<SettingsState>>,
}

#[derive(Debug)]
struct SettingsState {
    settings: AppSettings,
    modified: Option<SystemTime>,
}

impl SharedSettings {
    pub fn load(path: PathBuf) -> Self {
        let settings = load_settings(&path);
        let modified = modified_at(&path);
        Self {
            path,
            inner: Arc::new(Mutex::new(SettingsState { settings, modified })),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> AppSettings {
        self.inner.lock().settings.clone()
    }

    /// Re-read the file if its modification time moved. Returns whether the
    /// settings were replaced.
    pub fn reload_if_changed(&self) -> bool {
        let modified = modified_at(&self.path);
        let mut state = self.inner.lock();
        if modified == state.modified {
            return false;
        }
        state.modified = modified;
        let settings = load_settings(&self.path);
        if settings == state.settings {
            return false;
        }
        info!(
            sensitivity = settings.ad_sensitivity,
            enabled = settings.enable_ad_control,
            "settings reloaded"
        );
        state.settings = settings;
        true
    }
}

impl Preferences for SharedSettings {
    fn sensitivity(&self) -> i32 {
        self.inner.lock().settings.ad_sensitivity
    }

    fn enabled(&self) -> bool {
        self.inner.lock().settings.enable_ad_control
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("adquiet-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn defaults_match_first_run_values() {
        let s = AppSettings::default();
        assert_eq!(s.ad_sensitivity, 70);
        assert!(s.enable_ad_control);
        assert_eq!(s.poll_interval(), Duration::from_secs(1));
        assert_eq!(s.volume_backend, VolumeBackendKind::Wpctl);
    }

    #[test]
    fn normalize_clamps_into_slider_range() {
        let mut s = AppSettings {
            ad_sensitivity: 5,
            poll_interval_ms: 10,
            preferred_input_device: Some("   ".into()),
            ..AppSettings::default()
        };
        s.normalize();
        assert_eq!(s.ad_sensitivity, MIN_SENSITIVITY);
        assert_eq!(s.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert!(s.preferred_input_device.is_none());

        s.ad_sensitivity = 250;
        s.normalize();
        assert_eq!(s.ad_sensitivity, MAX_SENSITIVITY);
    }

    #[test]
    fn partial_json_fills_missing_fields_with_defaults() {
        let s: AppSettings =
            serde_json::from_str(r#"{"adSensitivity":40,"volumeBackend":"dry-run"}"#).unwrap();
        assert_eq!(s.ad_sensitivity, 40);
        assert!(s.enable_ad_control);
        assert_eq!(s.volume_backend, VolumeBackendKind::DryRun);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut s = AppSettings::default();
        s.apply_overrides(|key| match key {
            "ADQUIET_SENSITIVITY" => Some("55".into()),
            "ADQUIET_ENABLED" => Some("off".into()),
            _ => None,
        });
        assert_eq!(s.ad_sensitivity, 55);
        assert!(!s.enable_ad_control);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut s = AppSettings::default();
        s.apply_overrides(|key| match key {
            "ADQUIET_SENSITIVITY" => Some("loud".into()),
            "ADQUIET_ENABLED" => Some("maybe".into()),
            _ => None,
        });
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let s = load_settings(&path);
        assert_eq!(s.poll_interval_ms, AppSettings::default().poll_interval_ms);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn save_then_shared_load_exposes_preferences() {
        let path = temp_path("shared");
        let stored = AppSettings {
            ad_sensitivity: 30,
            enable_ad_control: false,
            ..AppSettings::default()
        };
        save_settings(&path, &stored).unwrap();

        let shared = SharedSettings::load(path.clone());
        assert!(!shared.enabled());
        assert!(!shared.reload_if_changed());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
