//! Pneumatic slide control.
//!
//! A slide is one commanded output pin plus two position sensors. Position is
//! never assumed from the command: it is derived purely from the sensor pair,
//! by a monitor task that re-evaluates on every sensor edge. A commanded move
//! writes the output once and then waits for the target sensor to confirm
//! within the configured window.
//!
//! Sensor pair to position:
//!
//! | extended | retracted | position            |
//! |----------|-----------|---------------------|
//! | true     | false     | `Extended`          |
//! | false    | true      | `Retracted`         |
//! | false    | false     | `Moving` (in transit) |
//! | true     | true      | `Fault`             |
//!
//! `Fault` is sticky: once both sensors have read true together, losing one
//! of them does not clear the fault. Only a clean single-sensor reading does.

use crate::manager::DeviceManager;
use crate::registry::DeviceRegistry;
use ezio_core::config::SlideConfig;
use ezio_core::error::{EzioError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Bounded wait for the monitor task to stop during close.
const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Derived actuator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidePosition {
    Retracted,
    Extended,
    /// Neither sensor reads true; the slide is in transit (or has not yet
    /// reported after a connect).
    Moving,
    /// Both sensors read true together. Sticky until a clean single-sensor
    /// reading appears.
    Fault,
}

impl std::fmt::Display for SlidePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Retracted => "retracted",
            Self::Extended => "extended",
            Self::Moving => "moving",
            Self::Fault => "fault",
        };
        f.write_str(s)
    }
}

/// Events published by a slide's monitor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideEvent {
    PositionChanged(SlidePosition),
    ExtendedSensorChanged(bool),
    RetractedSensorChanged(bool),
    /// Diagnostic text, emitted on fault entry.
    Error(String),
}

/// One pneumatic slide bound to live device pins.
pub struct PneumaticSlide {
    name: String,
    device: Arc<DeviceManager>,
    output_pin: String,
    move_timeout: Duration,
    position_tx: watch::Sender<SlidePosition>,
    event_tx: broadcast::Sender<SlideEvent>,
    /// Set while a commanded move is waiting for confirmation.
    busy: AtomicBool,
    extended_rx: watch::Receiver<bool>,
    retracted_rx: watch::Receiver<bool>,
    shutdown_tx: broadcast::Sender<()>,
    monitor: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PneumaticSlide {
    /// Bind a configured slide to its pins and start the position monitor.
    ///
    /// The output pin and both sensors are resolved through the registry, so
    /// a slide may span devices. Fails when any referenced device or pin is
    /// missing.
    pub fn new(config: &SlideConfig, registry: &DeviceRegistry) -> Result<Arc<Self>> {
        let device = registry
            .device(&config.output.device)
            .ok_or_else(|| EzioError::DeviceNotFound(config.output.device.clone()))?;
        if device.descriptor().output_pin(&config.output.pin).is_none() {
            return Err(EzioError::PinNotFound {
                device: config.output.device.clone(),
                pin: config.output.pin.clone(),
            });
        }
        let extended_rx = registry.watch_input(&config.extended_sensor)?;
        let retracted_rx = registry.watch_input(&config.retracted_sensor)?;

        let (position_tx, _) = watch::channel(SlidePosition::Moving);
        let (event_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        let slide = Arc::new(Self {
            name: config.name.clone(),
            device: Arc::clone(device),
            output_pin: config.output.pin.clone(),
            move_timeout: Duration::from_millis(config.move_timeout_ms),
            position_tx,
            event_tx,
            busy: AtomicBool::new(false),
            extended_rx,
            retracted_rx,
            shutdown_tx,
            monitor: parking_lot::Mutex::new(None),
        });
        let (ext, ret) = slide.sensors();
        slide.update_position(ext, ret);
        slide.spawn_monitor();
        Ok(slide)
    }

    fn spawn_monitor(self: &Arc<Self>) {
        // A weak reference: the task must not keep the slide alive, so that
        // dropping the last user handle can signal shutdown.
        let weak = Arc::downgrade(self);
        let mut extended = self.extended_rx.clone();
        let mut retracted = self.retracted_rx.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                let ext = *extended.borrow_and_update();
                let ret = *retracted.borrow_and_update();
                let Some(slide) = weak.upgrade() else { break };
                slide.update_position(ext, ret);
                drop(slide);
                tokio::select! {
                    changed = extended.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let Some(slide) = weak.upgrade() else { break };
                        let _ = slide
                            .event_tx
                            .send(SlideEvent::ExtendedSensorChanged(*extended.borrow()));
                    }
                    changed = retracted.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let Some(slide) = weak.upgrade() else { break };
                        let _ = slide
                            .event_tx
                            .send(SlideEvent::RetractedSensorChanged(*retracted.borrow()));
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
        *self.monitor.lock() = Some(handle);
    }

    fn update_position(&self, extended: bool, retracted: bool) {
        let changed = self.position_tx.send_if_modified(|current| {
            let next = derive_position(extended, retracted, *current);
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            let position = *self.position_tx.borrow();
            if position == SlidePosition::Fault {
                tracing::error!(slide = %self.name, "both position sensors active");
                let _ = self.event_tx.send(SlideEvent::Error(format!(
                    "slide '{}': both position sensors active",
                    self.name
                )));
            } else {
                tracing::debug!(slide = %self.name, %position, "position changed");
            }
            let _ = self.event_tx.send(SlideEvent::PositionChanged(position));
        }
    }

    // =========================================================================
    // Commanded moves
    // =========================================================================

    /// Extend the slide and wait for the extended sensor to confirm.
    pub async fn extend(&self) -> Result<()> {
        self.move_to(true).await
    }

    /// Retract the slide and wait for the retracted sensor to confirm.
    pub async fn retract(&self) -> Result<()> {
        self.move_to(false).await
    }

    async fn move_to(&self, extend: bool) -> Result<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(EzioError::ActuatorBusy(self.name.clone()));
        }
        let _guard = BusyGuard(&self.busy);

        if self.position() == SlidePosition::Fault {
            return Err(EzioError::ActuatorFault(self.name.clone()));
        }

        // Already confirmed in the target position: nothing to command.
        let target_position = if extend {
            SlidePosition::Extended
        } else {
            SlidePosition::Retracted
        };
        if self.position() == target_position {
            return Ok(());
        }

        self.device.set_output(&self.output_pin, extend).await?;
        tracing::debug!(
            slide = %self.name,
            direction = if extend { "extend" } else { "retract" },
            "move commanded"
        );

        // Watch the raw sensor pair rather than the derived position, so a
        // simultaneous-sensors fault observed mid-move is reported as a fault
        // and never mistaken for a confirmation.
        let mut extended_rx = self.extended_rx.clone();
        let mut retracted_rx = self.retracted_rx.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        let wait = async {
            loop {
                let ext = *extended_rx.borrow_and_update();
                let ret = *retracted_rx.borrow_and_update();
                if ext && ret {
                    return Err(EzioError::ActuatorFault(self.name.clone()));
                }
                let confirmed = if extend { ext } else { ret };
                if confirmed {
                    return Ok(());
                }
                tokio::select! {
                    changed = extended_rx.changed() => {
                        changed.map_err(|_| EzioError::Cancelled)?;
                    }
                    changed = retracted_rx.changed() => {
                        changed.map_err(|_| EzioError::Cancelled)?;
                    }
                    _ = shutdown.recv() => return Err(EzioError::Cancelled),
                }
            }
        };

        match tokio::time::timeout(self.move_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    slide = %self.name,
                    timeout_ms = self.move_timeout.as_millis() as u64,
                    "move not confirmed within window"
                );
                Err(EzioError::ActuatorTimeout {
                    name: self.name.clone(),
                    timeout_ms: self.move_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Stop the position monitor. In-flight moves observe the shutdown and
    /// fail with [`EzioError::Cancelled`].
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(());
        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(CLOSE_JOIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!(slide = %self.name, "monitor did not stop within the join window");
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current derived position.
    pub fn position(&self) -> SlidePosition {
        *self.position_tx.borrow()
    }

    /// Whether a commanded move is currently waiting for confirmation.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Raw `(extended, retracted)` sensor pair.
    pub fn sensors(&self) -> (bool, bool) {
        (*self.extended_rx.borrow(), *self.retracted_rx.borrow())
    }

    /// Subscribe to derived position changes.
    pub fn watch_position(&self) -> watch::Receiver<SlidePosition> {
        self.position_tx.subscribe()
    }

    /// Subscribe to the slide event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SlideEvent> {
        self.event_tx.subscribe()
    }
}

impl Drop for PneumaticSlide {
    fn drop(&mut self) {
        // Unblocks the monitor task and any pending wait when the last
        // handle goes away without an explicit close().
        let _ = self.shutdown_tx.send(());
    }
}

/// Clears the busy flag when a move exits, on every path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn derive_position(extended: bool, retracted: bool, previous: SlidePosition) -> SlidePosition {
    match (extended, retracted) {
        (true, true) => SlidePosition::Fault,
        (true, false) => SlidePosition::Extended,
        (false, true) => SlidePosition::Retracted,
        (false, false) if previous == SlidePosition::Fault => SlidePosition::Fault,
        (false, false) => SlidePosition::Moving,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sensor_positions() {
        assert_eq!(
            derive_position(true, false, SlidePosition::Moving),
            SlidePosition::Extended
        );
        assert_eq!(
            derive_position(false, true, SlidePosition::Moving),
            SlidePosition::Retracted
        );
    }

    #[test]
    fn test_no_sensor_is_moving() {
        assert_eq!(
            derive_position(false, false, SlidePosition::Extended),
            SlidePosition::Moving
        );
    }

    #[test]
    fn test_fault_is_sticky_through_no_sensor() {
        assert_eq!(
            derive_position(true, true, SlidePosition::Moving),
            SlidePosition::Fault
        );
        assert_eq!(
            derive_position(false, false, SlidePosition::Fault),
            SlidePosition::Fault
        );
    }

    #[test]
    fn test_fault_clears_on_clean_reading() {
        assert_eq!(
            derive_position(false, true, SlidePosition::Fault),
            SlidePosition::Retracted
        );
        assert_eq!(
            derive_position(true, false, SlidePosition::Fault),
            SlidePosition::Extended
        );
    }
}
