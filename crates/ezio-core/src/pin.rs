//! Observable per-pin state.
//!
//! One [`PinState`] exists per declared pin, created when the owning device
//! manager is built and never added or removed afterward. The device's
//! monitor loop is the sole writer; every other path only reads or
//! subscribes, so no lock is needed beyond the watch channel itself.

use tokio::sync::watch;

/// A single named digital pin with an observable boolean state.
#[derive(Debug)]
pub struct PinState {
    index: usize,
    name: String,
    tx: watch::Sender<bool>,
}

impl PinState {
    /// Create a pin in the `false` state. `name` may be empty for pins the
    /// configuration leaves unnamed.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            index,
            name: name.into(),
            tx,
        }
    }

    /// Zero-based pin index within its direction.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured pin name (empty if unnamed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name for display: the configured name, or `Pin {index}` when unnamed.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Pin {}", self.index)
        } else {
            self.name.clone()
        }
    }

    /// Current state.
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the state, notifying subscribers only on an actual change.
    /// Returns whether the value changed. Only the owning monitor loop may
    /// call this.
    pub fn set(&self, state: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
