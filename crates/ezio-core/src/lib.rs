//! `ezio-core`
//!
//! Core types and traits for the ezio digital I/O stack.
//!
//! This crate provides the building blocks shared by the runtime layer and the
//! board drivers:
//!
//! - [`error::EzioError`]: self-contained error type for the whole stack
//! - [`driver::BoardDriver`]: capability trait over the vendor TCP primitives
//! - [`config`]: device/slide descriptors with TOML loading and validation
//! - [`mask`]: immutable output bit-window tables (8- and 16-pin boards)
//! - [`pin::PinState`]: observable per-pin boolean state
//! - [`events::DeviceEvent`]: per-device change notifications

pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod mask;
pub mod pin;

pub use config::{DeviceDescriptor, IoConfiguration, PinConfig, PinRef, SlideConfig};
pub use driver::{BoardDriver, STATUS_OK};
pub use error::{EzioError, Result};
pub use events::DeviceEvent;
pub use mask::{input_mask, output_masks, OUTPUT_PIN_MASKS_16, OUTPUT_PIN_MASKS_8};
pub use pin::PinState;
