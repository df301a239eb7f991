//! Per-board session lifecycle, pin monitoring, and output commands.
//!
//! A [`DeviceManager`] owns one board: its descriptor, its fixed input/output
//! [`PinState`] collections, the width-selected output mask table, and the
//! background monitor loop spawned on connect. The monitor loop reads both
//! bit-vectors every poll period, diffs them against stored state, and
//! publishes one [`DeviceEvent`] per changed pin in pin order. A read failure
//! is fatal to the connection: the loop emits an error, closes the session,
//! and terminates; the caller must reconnect explicitly.

use ezio_core::config::{DeviceDescriptor, IoConfiguration};
use ezio_core::driver::{BoardDriver, STATUS_OK};
use ezio_core::error::{EzioError, Result};
use ezio_core::events::DeviceEvent;
use ezio_core::mask::{input_mask, output_masks};
use ezio_core::pin::PinState;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fixed hardware poll period.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Bounded wait for the monitor loop to stop during disconnect. Best-effort:
/// a missed join does not prevent teardown.
const DISCONNECT_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Manager for a single TCP-attached I/O board.
pub struct DeviceManager {
    descriptor: DeviceDescriptor,
    driver: Arc<dyn BoardDriver>,
    /// Width-selected output bit-window table, chosen once at construction.
    masks: &'static [u32],
    connected: AtomicBool,
    input_pins: Vec<PinState>,
    output_pins: Vec<PinState>,
    event_tx: broadcast::Sender<DeviceEvent>,
    poll_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    poll_period: Duration,
}

impl DeviceManager {
    /// Build a manager for the named device. Fails with
    /// [`EzioError::DeviceNotFound`] when the configuration does not declare
    /// it; no partial object is produced.
    pub fn from_config(
        config: &IoConfiguration,
        device_name: &str,
        driver: Arc<dyn BoardDriver>,
    ) -> Result<Self> {
        let descriptor = config
            .device(device_name)
            .cloned()
            .ok_or_else(|| EzioError::DeviceNotFound(device_name.to_string()))?;

        let input_pins = build_pins(descriptor.input_count, &descriptor.inputs);
        let output_pins = build_pins(descriptor.output_count, &descriptor.outputs);
        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            masks: output_masks(descriptor.output_count),
            descriptor,
            driver,
            connected: AtomicBool::new(false),
            input_pins,
            output_pins,
            event_tx,
            poll_task: parking_lot::Mutex::new(None),
            poll_period: DEFAULT_POLL_PERIOD,
        })
    }

    /// Override the poll period (tests run far below the 100 ms hardware
    /// default).
    pub fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open the board session and start the monitor loop.
    ///
    /// The configured address must be a dotted quad of exactly four numeric
    /// 0-255 parts. Failures are recoverable: the manager stays disconnected
    /// and the caller may retry.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            tracing::debug!(device = %self.descriptor.name, "already connected");
            return Ok(());
        }

        let ip = match parse_board_ip(&self.descriptor.ip) {
            Ok(ip) => ip,
            Err(err) => {
                self.emit_error(format!(
                    "invalid address '{}' for device '{}'",
                    self.descriptor.ip, self.descriptor.name
                ));
                return Err(err);
            }
        };

        if !self.driver.connect(ip, self.descriptor.id).await {
            self.emit_error(format!(
                "connection to '{}' ({}) refused",
                self.descriptor.name, self.descriptor.ip
            ));
            return Err(EzioError::ConnectionRefused {
                board: self.descriptor.id,
            });
        }

        // Stored states are stale across reconnects; reset before the first
        // poll so observers never act on last-session values.
        for pin in self.input_pins.iter().chain(self.output_pins.iter()) {
            pin.set(false);
        }

        self.connected.store(true, Ordering::SeqCst);
        self.spawn_monitor();
        let _ = self.event_tx.send(DeviceEvent::ConnectionChanged(true));
        tracing::info!(device = %self.descriptor.name, ip = %self.descriptor.ip, "connected");
        Ok(())
    }

    /// Stop the monitor loop and close the session. No-op when already
    /// disconnected.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        let handle = self.poll_task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(DISCONNECT_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                tracing::warn!(
                    device = %self.descriptor.name,
                    "monitor loop did not stop within the join window"
                );
            }
        }

        self.driver.close(self.descriptor.id).await;
        let _ = self.event_tx.send(DeviceEvent::ConnectionChanged(false));
        tracing::info!(device = %self.descriptor.name, "disconnected");
    }

    fn spawn_monitor(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.poll_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !manager.connected.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = manager.poll_once().await {
                    tracing::warn!(
                        device = %manager.descriptor.name,
                        "poll failed, tearing down connection: {err}"
                    );
                    manager.emit_error(format!(
                        "poll failure on '{}': {err}",
                        manager.descriptor.name
                    ));
                    manager.teardown_after_failure().await;
                    break;
                }
            }
        });
        *self.poll_task.lock() = Some(handle);
    }

    /// Read both vectors in one pass and republish every changed pin.
    async fn poll_once(&self) -> Result<()> {
        let board = self.descriptor.id;

        let (input, _latch, status) = self.driver.get_input(board).await;
        if status != STATUS_OK {
            return Err(EzioError::Io { board, status });
        }
        let (output, _level, status) = self.driver.get_output(board).await;
        if status != STATUS_OK {
            return Err(EzioError::Io { board, status });
        }

        for pin in &self.input_pins {
            let state = input & input_mask(pin.index()) != 0;
            if pin.set(state) {
                let _ = self.event_tx.send(DeviceEvent::InputChanged {
                    pin: pin.name().to_string(),
                    state,
                });
            }
        }
        for pin in &self.output_pins {
            let state = output & self.masks[pin.index()] != 0;
            if pin.set(state) {
                let _ = self.event_tx.send(DeviceEvent::OutputChanged {
                    pin: pin.name().to_string(),
                    state,
                });
            }
        }
        Ok(())
    }

    /// Teardown driven from inside the monitor loop. The connected flag is
    /// the gate: whichever path swaps it first performs the close.
    async fn teardown_after_failure(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.driver.close(self.descriptor.id).await;
            let _ = self.event_tx.send(DeviceEvent::ConnectionChanged(false));
        }
        // Detach our own handle so a later disconnect() has nothing to join.
        self.poll_task.lock().take();
    }

    fn emit_error(&self, message: String) {
        tracing::error!(device = %self.descriptor.name, "{message}");
        let _ = self.event_tx.send(DeviceEvent::Error(message));
    }

    // =========================================================================
    // Output commands
    // =========================================================================

    /// Drive one output pin with a single atomic set/clear transaction.
    ///
    /// The stored [`PinState`] is deliberately not updated here: the new
    /// value becomes visible only once the monitor loop confirms it on a
    /// subsequent poll, so every observed state is a hardware readback.
    pub async fn set_output_pin(&self, pin: usize, state: bool) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EzioError::NotConnected);
        }
        if pin >= self.descriptor.output_count {
            return Err(EzioError::PinOutOfRange {
                pin,
                count: self.descriptor.output_count,
            });
        }

        let mask = self.masks[pin];
        let (set_mask, clear_mask) = if state { (mask, 0) } else { (0, mask) };
        let status = self
            .driver
            .set_output(self.descriptor.id, set_mask, clear_mask)
            .await;
        if status != STATUS_OK {
            return Err(EzioError::CommandRejected(status));
        }
        tracing::debug!(
            device = %self.descriptor.name,
            pin,
            state,
            set_mask = format_args!("{set_mask:#x}"),
            clear_mask = format_args!("{clear_mask:#x}"),
            "output written"
        );
        Ok(())
    }

    /// Drive a named output pin.
    pub async fn set_output(&self, pin_name: &str, state: bool) -> Result<()> {
        let pin = self
            .descriptor
            .output_pin(pin_name)
            .ok_or_else(|| EzioError::PinNotFound {
                device: self.descriptor.name.clone(),
                pin: pin_name.to_string(),
            })?
            .pin;
        self.set_output_pin(pin, state).await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn device_name(&self) -> &str {
        &self.descriptor.name
    }

    /// Configured board address, as written in the configuration.
    pub fn ip(&self) -> &str {
        &self.descriptor.ip
    }

    pub fn board_id(&self) -> u32 {
        self.descriptor.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Current state of a named input pin.
    pub fn input_state(&self, pin_name: &str) -> Option<bool> {
        self.input_pins
            .iter()
            .find(|p| p.name() == pin_name)
            .map(PinState::get)
    }

    /// Current state of a named output pin.
    pub fn output_state(&self, pin_name: &str) -> Option<bool> {
        self.output_pins
            .iter()
            .find(|p| p.name() == pin_name)
            .map(PinState::get)
    }

    /// Subscribe to a named input pin's state changes.
    pub fn watch_input(&self, pin_name: &str) -> Result<watch::Receiver<bool>> {
        self.input_pins
            .iter()
            .find(|p| p.name() == pin_name)
            .map(PinState::subscribe)
            .ok_or_else(|| EzioError::PinNotFound {
                device: self.descriptor.name.clone(),
                pin: pin_name.to_string(),
            })
    }

    /// Subscribe to a named output pin's readback changes.
    pub fn watch_output(&self, pin_name: &str) -> Result<watch::Receiver<bool>> {
        self.output_pins
            .iter()
            .find(|p| p.name() == pin_name)
            .map(PinState::subscribe)
            .ok_or_else(|| EzioError::PinNotFound {
                device: self.descriptor.name.clone(),
                pin: pin_name.to_string(),
            })
    }

    pub fn input_pins(&self) -> &[PinState] {
        &self.input_pins
    }

    pub fn output_pins(&self) -> &[PinState] {
        &self.output_pins
    }

    /// Subscribe to this device's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_tx.subscribe()
    }
}

/// One `PinState` per declared pin, named from the pin map when present.
fn build_pins(count: usize, named: &[ezio_core::config::PinConfig]) -> Vec<PinState> {
    (0..count)
        .map(|i| {
            let name = named
                .iter()
                .find(|p| p.pin == i)
                .map(|p| p.name.as_str())
                .unwrap_or_default();
            PinState::new(i, name)
        })
        .collect()
}

/// Parse a dotted-quad address: exactly four numeric 0-255 parts.
fn parse_board_ip(text: &str) -> Result<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 4 {
        return Err(EzioError::InvalidAddress(text.to_string()));
    }
    for (octet, part) in octets.iter_mut().zip(&parts) {
        *octet = part
            .parse()
            .map_err(|_| EzioError::InvalidAddress(text.to_string()))?;
    }
    Ok(Ipv4Addr::from(octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_board_ip_accepts_dotted_quad() {
        assert_eq!(
            parse_board_ip("192.168.0.3").unwrap(),
            Ipv4Addr::new(192, 168, 0, 3)
        );
        assert_eq!(parse_board_ip("0.0.0.0").unwrap(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_parse_board_ip_rejects_malformed() {
        for bad in ["192.168.0", "1.2.3.4.5", "a.b.c.d", "256.1.1.1", "", "1..2.3"] {
            assert!(
                matches!(parse_board_ip(bad), Err(EzioError::InvalidAddress(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_build_pins_names_from_map() {
        let named = vec![ezio_core::config::PinConfig {
            pin: 3,
            name: "UV_Head".into(),
        }];
        let pins = build_pins(8, &named);
        assert_eq!(pins.len(), 8);
        assert_eq!(pins[3].name(), "UV_Head");
        assert_eq!(pins[0].name(), "");
    }
}
