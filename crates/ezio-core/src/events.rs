//! Per-device change notifications.
//!
//! Events are published over a `tokio::sync::broadcast` channel by the
//! device's monitor loop and connection lifecycle. Delivery preserves
//! per-device poll order: one consistent snapshot of changes per iteration,
//! emitted in pin order. No cross-device ordering is guaranteed.

/// Notification emitted by a device manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The TCP session was opened (`true`) or closed (`false`).
    ConnectionChanged(bool),
    /// Diagnostic text for a connection or poll failure.
    Error(String),
    /// An input pin's observed state changed.
    InputChanged { pin: String, state: bool },
    /// An output pin's readback state changed.
    OutputChanged { pin: String, state: bool },
}
