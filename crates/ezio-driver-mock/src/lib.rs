//! Mock board driver for tests and simulation.
//!
//! [`MockBoard`] implements [`ezio_core::BoardDriver`] over in-memory state
//! keyed by board id. Tests drive the simulated hardware directly: set input
//! bits to mimic sensors, inject connect refusals or read failures, and count
//! output writes to assert idempotence.

mod board;

pub use board::MockBoard;
