//! Error types for the ezio stack.
//!
//! A single enum, [`EzioError`], covers every failure the stack can report.
//! Configuration errors are fatal at construction time; connection and command
//! errors are returned to the caller and may be retried; a poll read failure
//! is fatal to its connection and requires a fresh `connect()`.

use thiserror::Error;

/// Convenience alias for results using the stack error type.
pub type Result<T> = std::result::Result<T, EzioError>;

/// Primary error type for the ezio stack.
#[derive(Error, Debug)]
pub enum EzioError {
    /// Semantic error in the loaded configuration. Fatal at startup; no
    /// partially constructed object is handed out.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Device address is not a dotted quad of exactly four 0-255 parts.
    /// Recoverable: the caller may fix the descriptor and retry `connect()`.
    #[error("Invalid IP address '{0}': expected four numeric 0-255 parts")]
    InvalidAddress(String),

    /// The vendor driver refused the TCP connection.
    #[error("Connection to board {board} refused")]
    ConnectionRefused { board: u32 },

    /// Operation requires a connected device.
    #[error("Device not connected")]
    NotConnected,

    /// A poll read came back with a non-OK status. Fatal to the current
    /// connection: the monitor loop tears the session down and terminates.
    #[error("I/O failure on board {board}: status {status}")]
    Io { board: u32, status: i32 },

    /// Output pin index outside the device's declared output count.
    #[error("Output pin {pin} out of range (device has {count} outputs)")]
    PinOutOfRange { pin: usize, count: usize },

    /// Device name absent from the configuration or registry.
    #[error("Unknown device '{0}'")]
    DeviceNotFound(String),

    /// Pin name not declared on the named device.
    #[error("Unknown pin '{pin}' on device '{device}'")]
    PinNotFound { device: String, pin: String },

    /// A device with this name is already registered.
    #[error("Device '{0}' already registered")]
    DeviceAlreadyRegistered(String),

    /// The set/clear output transaction returned a non-OK status.
    #[error("Set output rejected with status {0}")]
    CommandRejected(i32),

    /// A commanded move is already in flight on this actuator.
    #[error("Actuator '{0}' is already moving")]
    ActuatorBusy(String),

    /// Sensor confirmation did not arrive within the configured window.
    /// The move resolves as failed; no automatic retry.
    #[error("Actuator '{name}' did not confirm within {timeout_ms} ms")]
    ActuatorTimeout { name: String, timeout_ms: u64 },

    /// Both position sensors read true simultaneously.
    #[error("Actuator '{0}' sensors report extended and retracted simultaneously")]
    ActuatorFault(String),

    /// A pending wait was resolved by teardown rather than by the hardware.
    #[error("Operation cancelled")]
    Cancelled,

    /// One or more devices failed during a fan-out connect. The remaining
    /// devices were still attempted; every individual failure is listed.
    #[error("Connect failed for {} device(s)", .0.len())]
    ConnectAll(Vec<(String, EzioError)>),
}
