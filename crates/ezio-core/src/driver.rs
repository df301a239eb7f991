//! Vendor board driver capability trait.
//!
//! The vendor library exposes a small fixed set of TCP primitives keyed by
//! board id. This trait mirrors them one-for-one so the runtime layer can be
//! driven by the real library or by a mock in tests. Status codes are the
//! vendor's: [`STATUS_OK`] means success, anything else is an I/O failure.

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Vendor sentinel status meaning the transaction succeeded.
pub const STATUS_OK: i32 = 0;

/// Capability interface over the vendor's TCP driver primitives.
///
/// Implementations must be safe to call concurrently from multiple tasks;
/// the driver call itself is the per-device serialization point.
#[async_trait]
pub trait BoardDriver: Send + Sync {
    /// Open the TCP session to a board. Returns `false` on refusal.
    async fn connect(&self, ip: Ipv4Addr, board: u32) -> bool;

    /// Close the board's TCP session.
    async fn close(&self, board: u32);

    /// One combined set/clear output transaction. Bits in `set_mask` are
    /// driven high and bits in `clear_mask` low in a single write, so no
    /// other pin is disturbed and no half-state is observable.
    async fn set_output(&self, board: u32, set_mask: u32, clear_mask: u32) -> i32;

    /// Read the input bit-vector. Returns `(vector, latch, status)`.
    async fn get_input(&self, board: u32) -> (u32, u32, i32);

    /// Read the output bit-vector. Returns `(vector, level, status)`.
    async fn get_output(&self, board: u32) -> (u32, u32, i32);
}
