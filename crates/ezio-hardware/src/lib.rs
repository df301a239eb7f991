//! `ezio-hardware`
//!
//! Runtime layer over TCP-attached digital I/O boards:
//!
//! - [`DeviceManager`]: one board's session lifecycle, background pin
//!   monitoring, and atomic output commands
//! - [`DeviceRegistry`]: named managers with fan-out connect/disconnect and
//!   cross-device pin lookup
//! - [`PneumaticSlide`]: actuator state derived from paired sensors, with
//!   asynchronous confirmed moves
//!
//! Each connected device runs one background polling loop (100 ms period, the
//! only mode the hardware exposes). The loop is the sole writer of pin state;
//! everything else reads or subscribes.

pub mod manager;
pub mod registry;
pub mod slide;

pub use manager::{DeviceManager, DEFAULT_POLL_PERIOD};
pub use registry::DeviceRegistry;
pub use slide::{PneumaticSlide, SlideEvent, SlidePosition};
