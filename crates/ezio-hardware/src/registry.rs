//! Named device collection.
//!
//! The registry owns one [`DeviceManager`] per configured board, in
//! configuration order, and fans connection commands out across them.
//! `connect_all` tolerates partial failure: boards that connect stay
//! connected, and the failures come back as one aggregate error.

use crate::manager::DeviceManager;
use ezio_core::config::{IoConfiguration, PinRef};
use ezio_core::driver::BoardDriver;
use ezio_core::error::{EzioError, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// Collection of device managers keyed by device name.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<DeviceManager>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one manager per configured device, all sharing the given driver.
    pub fn from_config(config: &IoConfiguration, driver: Arc<dyn BoardDriver>) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in &config.devices {
            let manager = DeviceManager::from_config(config, &descriptor.name, Arc::clone(&driver))?;
            registry.add_device(Arc::new(manager))?;
        }
        Ok(registry)
    }

    /// Register a manager under its device name.
    pub fn add_device(&mut self, manager: Arc<DeviceManager>) -> Result<()> {
        let name = manager.device_name();
        if self.device(name).is_some() {
            return Err(EzioError::DeviceAlreadyRegistered(name.to_string()));
        }
        self.devices.push(manager);
        Ok(())
    }

    /// Look up a manager by device name.
    pub fn device(&self, name: &str) -> Option<&Arc<DeviceManager>> {
        self.devices.iter().find(|d| d.device_name() == name)
    }

    /// All registered managers, in registration order.
    pub fn devices(&self) -> &[Arc<DeviceManager>] {
        &self.devices
    }

    // =========================================================================
    // Fan-out lifecycle
    // =========================================================================

    /// Connect every registered device in order.
    ///
    /// Each device is attempted regardless of earlier failures; any that
    /// succeed remain connected. When one or more fail, the per-device errors
    /// are returned together as [`EzioError::ConnectAll`].
    pub async fn connect_all(&self) -> Result<()> {
        let mut failures = Vec::new();
        for device in &self.devices {
            if let Err(err) = device.connect().await {
                tracing::warn!(device = %device.device_name(), "connect failed: {err}");
                failures.push((device.device_name().to_string(), err));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EzioError::ConnectAll(failures))
        }
    }

    /// Disconnect every registered device. Already-disconnected devices are
    /// skipped.
    pub async fn disconnect_all(&self) {
        for device in &self.devices {
            device.disconnect().await;
        }
    }

    // =========================================================================
    // Cross-device pin access
    // =========================================================================

    /// Drive a named output pin on a named device.
    pub async fn set_output(&self, device: &str, pin: &str, state: bool) -> Result<()> {
        self.device(device)
            .ok_or_else(|| EzioError::DeviceNotFound(device.to_string()))?
            .set_output(pin, state)
            .await
    }

    /// Current state of a named input pin, if the device and pin exist.
    pub fn input_state(&self, device: &str, pin: &str) -> Option<bool> {
        self.device(device)?.input_state(pin)
    }

    /// Current state of a named output pin, if the device and pin exist.
    pub fn output_state(&self, device: &str, pin: &str) -> Option<bool> {
        self.device(device)?.output_state(pin)
    }

    /// Subscribe to an input pin referenced by device and pin name.
    pub fn watch_input(&self, pin_ref: &PinRef) -> Result<watch::Receiver<bool>> {
        self.device(&pin_ref.device)
            .ok_or_else(|| EzioError::DeviceNotFound(pin_ref.device.clone()))?
            .watch_input(&pin_ref.pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezio_core::config::IoConfiguration;
    use ezio_driver_mock::MockBoard;

    const TWO_BOARDS: &str = r#"
        [[devices]]
        id = 0
        name = "IOBottom"
        ip = "192.168.0.3"
        input_count = 16
        output_count = 8

        [[devices]]
        id = 1
        name = "IOTop"
        ip = "192.168.0.4"
        input_count = 16
        output_count = 16
    "#;

    #[tokio::test]
    async fn test_from_config_registers_all_devices() {
        let config = IoConfiguration::from_toml_str(TWO_BOARDS).unwrap();
        let registry = DeviceRegistry::from_config(&config, Arc::new(MockBoard::new())).unwrap();
        assert_eq!(registry.devices().len(), 2);
        assert!(registry.device("IOBottom").is_some());
        assert!(registry.device("IOTop").is_some());
        assert!(registry.device("IOMiddle").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let config = IoConfiguration::from_toml_str(TWO_BOARDS).unwrap();
        let driver: Arc<dyn BoardDriver> = Arc::new(MockBoard::new());
        let mut registry = DeviceRegistry::from_config(&config, Arc::clone(&driver)).unwrap();

        let dup = DeviceManager::from_config(&config, "IOTop", driver).unwrap();
        let err = registry.add_device(Arc::new(dup)).unwrap_err();
        assert!(matches!(err, EzioError::DeviceAlreadyRegistered(name) if name == "IOTop"));
    }
}
