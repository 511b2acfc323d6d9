//! Events published by the monitor.
//!
//! | Event | Sender |
//! |-------|--------|
//! | `DetectionEvent` | `MonitorHandle::subscribe_detections` |
//! | `MonitorStatusEvent` | `MonitorHandle::subscribe_status` |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Detection events
// ---------------------------------------------------------------------------

/// Emitted once per monitor tick that ran an analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub is_advertisement: bool,
    /// Sensitivity threshold the pass was classified against.
    pub threshold: i32,
    /// Whether the volume controller accepted a reduction for this tick.
    pub volume_reduced: bool,
}

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatusEvent {
    pub status: MonitorStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the periodic monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    /// Created but not yet started.
    Idle,
    /// Polling the analyzer every interval.
    Monitoring,
    /// Loop exited after a stop request.
    Stopped,
    /// Running, but the analyzer is unusable (e.g. not initialised).
    Error,
}
