//! Device and slide configuration.
//!
//! Configuration is loaded once from a TOML document, validated, and treated
//! as read-only afterward. Validation is semantic: counts, pin ranges, name
//! uniqueness, and slide pin references are checked up front so the runtime
//! layer never sees an inconsistent descriptor. A validation failure is fatal
//! at startup; no partial object is built.
//!
//! ```toml
//! [[devices]]
//! id = 0
//! name = "IOBottom"
//! ip = "192.168.0.3"
//! input_count = 16
//! output_count = 8
//! inputs = [{ pin = 0, name = "Slide_Extended" }]
//! outputs = [{ pin = 3, name = "UV_Head" }]
//!
//! [[slides]]
//! name = "UVSlide"
//! output = { device = "IOBottom", pin = "UV_Head" }
//! extended_sensor = { device = "IOBottom", pin = "Slide_Extended" }
//! retracted_sensor = { device = "IOBottom", pin = "Slide_Retracted" }
//! ```

use crate::error::{EzioError, Result};
use serde::Deserialize;
use std::path::Path;

/// A named pin at a fixed index within one direction.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PinConfig {
    pub pin: usize,
    pub name: String,
}

/// Reference to a named pin on a named device.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PinRef {
    pub device: String,
    pub pin: String,
}

/// One board: identity, address, widths, and named pin maps. Immutable after
/// load.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDescriptor {
    pub id: u32,
    pub name: String,
    pub ip: String,
    pub input_count: usize,
    pub output_count: usize,
    #[serde(default)]
    pub inputs: Vec<PinConfig>,
    #[serde(default)]
    pub outputs: Vec<PinConfig>,
}

impl DeviceDescriptor {
    /// Look up a named input pin.
    pub fn input_pin(&self, name: &str) -> Option<&PinConfig> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Look up a named output pin.
    pub fn output_pin(&self, name: &str) -> Option<&PinConfig> {
        self.outputs.iter().find(|p| p.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EzioError::Configuration("device name is empty".into()));
        }
        if self.input_count == 0 || self.output_count == 0 {
            return Err(EzioError::Configuration(format!(
                "device '{}': pin counts must be non-zero",
                self.name
            )));
        }
        if self.output_count > 16 {
            return Err(EzioError::Configuration(format!(
                "device '{}': output count {} unsupported (8- and 16-pin boards only)",
                self.name, self.output_count
            )));
        }
        Self::validate_pins(&self.name, "input", &self.inputs, self.input_count)?;
        Self::validate_pins(&self.name, "output", &self.outputs, self.output_count)?;
        Ok(())
    }

    fn validate_pins(
        device: &str,
        direction: &str,
        pins: &[PinConfig],
        count: usize,
    ) -> Result<()> {
        for (i, p) in pins.iter().enumerate() {
            if p.pin >= count {
                return Err(EzioError::Configuration(format!(
                    "device '{}': {} pin '{}' index {} out of range (count {})",
                    device, direction, p.name, p.pin, count
                )));
            }
            if !p.name.is_empty() && pins[..i].iter().any(|q| q.name == p.name) {
                return Err(EzioError::Configuration(format!(
                    "device '{}': duplicate {} pin name '{}'",
                    device, direction, p.name
                )));
            }
        }
        Ok(())
    }
}

fn default_move_timeout_ms() -> u64 {
    3000
}

/// One pneumatic slide: a commanded output pin and a pair of position
/// sensors, each referenced by device and pin name.
#[derive(Debug, Clone, Deserialize)]
pub struct SlideConfig {
    pub name: String,
    pub output: PinRef,
    pub extended_sensor: PinRef,
    pub retracted_sensor: PinRef,
    /// Window for sensor confirmation of a commanded move.
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,
}

/// The full validated descriptor set: devices plus slides.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoConfiguration {
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
    #[serde(default)]
    pub slides: Vec<SlideConfig>,
}

impl IoConfiguration {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| EzioError::Configuration(format!("parse failure: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EzioError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            devices = config.devices.len(),
            slides = config.slides.len(),
            "loaded I/O configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Look up a device descriptor by name.
    pub fn device(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.name == name)
    }

    fn validate(&self) -> Result<()> {
        for (i, d) in self.devices.iter().enumerate() {
            d.validate()?;
            if self.devices[..i].iter().any(|q| q.name == d.name) {
                return Err(EzioError::Configuration(format!(
                    "duplicate device name '{}'",
                    d.name
                )));
            }
        }
        for s in &self.slides {
            self.validate_pin_ref(&s.name, &s.output, Direction::Output)?;
            self.validate_pin_ref(&s.name, &s.extended_sensor, Direction::Input)?;
            self.validate_pin_ref(&s.name, &s.retracted_sensor, Direction::Input)?;
        }
        Ok(())
    }

    fn validate_pin_ref(&self, slide: &str, pin_ref: &PinRef, dir: Direction) -> Result<()> {
        let device = self.device(&pin_ref.device).ok_or_else(|| {
            EzioError::Configuration(format!(
                "slide '{}': unknown device '{}'",
                slide, pin_ref.device
            ))
        })?;
        let found = match dir {
            Direction::Input => device.input_pin(&pin_ref.pin).is_some(),
            Direction::Output => device.output_pin(&pin_ref.pin).is_some(),
        };
        if !found {
            return Err(EzioError::Configuration(format!(
                "slide '{}': unknown {} pin '{}' on device '{}'",
                slide,
                match dir {
                    Direction::Input => "input",
                    Direction::Output => "output",
                },
                pin_ref.pin,
                pin_ref.device
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [[devices]]
        id = 0
        name = "IOBottom"
        ip = "192.168.0.3"
        input_count = 16
        output_count = 8
        inputs = [
            { pin = 0, name = "Slide_Extended" },
            { pin = 1, name = "Slide_Retracted" },
        ]
        outputs = [{ pin = 3, name = "UV_Head" }]

        [[slides]]
        name = "UVSlide"
        output = { device = "IOBottom", pin = "UV_Head" }
        extended_sensor = { device = "IOBottom", pin = "Slide_Extended" }
        retracted_sensor = { device = "IOBottom", pin = "Slide_Retracted" }
    "#;

    #[test]
    fn test_valid_config_loads() {
        let config = IoConfiguration::from_toml_str(VALID).unwrap();
        let device = config.device("IOBottom").unwrap();
        assert_eq!(device.id, 0);
        assert_eq!(device.output_pin("UV_Head").unwrap().pin, 3);
        assert_eq!(config.slides[0].move_timeout_ms, 3000);
    }

    #[test]
    fn test_unknown_device_lookup() {
        let config = IoConfiguration::from_toml_str(VALID).unwrap();
        assert!(config.device("IOTop").is_none());
    }

    #[test]
    fn test_pin_index_out_of_range_rejected() {
        let text = r#"
            [[devices]]
            id = 0
            name = "A"
            ip = "10.0.0.1"
            input_count = 8
            output_count = 8
            outputs = [{ pin = 8, name = "Over" }]
        "#;
        let err = IoConfiguration::from_toml_str(text).unwrap_err();
        assert!(matches!(err, EzioError::Configuration(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_duplicate_pin_name_rejected() {
        let text = r#"
            [[devices]]
            id = 0
            name = "A"
            ip = "10.0.0.1"
            input_count = 8
            output_count = 8
            inputs = [
                { pin = 0, name = "Sensor" },
                { pin = 1, name = "Sensor" },
            ]
        "#;
        let err = IoConfiguration::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate input pin name"));
    }

    #[test]
    fn test_duplicate_device_name_rejected() {
        let text = r#"
            [[devices]]
            id = 0
            name = "A"
            ip = "10.0.0.1"
            input_count = 8
            output_count = 8

            [[devices]]
            id = 1
            name = "A"
            ip = "10.0.0.2"
            input_count = 8
            output_count = 8
        "#;
        let err = IoConfiguration::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate device name"));
    }

    #[test]
    fn test_wide_board_rejected() {
        let text = r#"
            [[devices]]
            id = 0
            name = "A"
            ip = "10.0.0.1"
            input_count = 8
            output_count = 32
        "#;
        let err = IoConfiguration::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_dangling_slide_reference_rejected() {
        let text = r#"
            [[devices]]
            id = 0
            name = "A"
            ip = "10.0.0.1"
            input_count = 8
            output_count = 8
            outputs = [{ pin = 0, name = "Out" }]

            [[slides]]
            name = "S"
            output = { device = "A", pin = "Out" }
            extended_sensor = { device = "A", pin = "Missing" }
            retracted_sensor = { device = "A", pin = "Missing" }
        "#;
        let err = IoConfiguration::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("unknown input pin"));
    }
}
