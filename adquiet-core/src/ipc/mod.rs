//! Serialisable event types for hosts that forward monitor activity
//! (logs, a tray UI, a websocket).
//!
//! All types derive `serde::Serialize` + `serde::Deserialize`.

pub mod events;
