//! In-memory board simulation.

use async_trait::async_trait;
use ezio_core::{BoardDriver, STATUS_OK};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Status returned for injected read failures.
const STATUS_FAIL: i32 = 1;

#[derive(Debug, Default)]
struct BoardState {
    connected: bool,
    input: u32,
    latch: u32,
    output: u32,
    refuse_connect: bool,
    fail_reads: bool,
    set_output_calls: usize,
}

/// Simulated multi-board driver.
///
/// Cloneable handle; all clones share the same boards, so a test can hand one
/// clone to the runtime layer and keep another to poke the simulated
/// hardware.
#[derive(Debug, Clone, Default)]
pub struct MockBoard {
    boards: Arc<Mutex<HashMap<u32, BoardState>>>,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a single input bit, as a sensor change would.
    pub async fn set_input_bit(&self, board: u32, bit: usize, on: bool) {
        let mut boards = self.boards.lock().await;
        let state = boards.entry(board).or_default();
        if on {
            state.input |= 1 << bit;
        } else {
            state.input &= !(1 << bit);
        }
    }

    /// Replace the whole input vector.
    pub async fn set_input_vector(&self, board: u32, vector: u32) {
        self.boards.lock().await.entry(board).or_default().input = vector;
    }

    /// Replace the latch vector returned alongside inputs.
    pub async fn set_latch(&self, board: u32, latch: u32) {
        self.boards.lock().await.entry(board).or_default().latch = latch;
    }

    /// Current simulated output vector (window-encoded, as the hardware
    /// reports it).
    pub async fn output_vector(&self, board: u32) -> u32 {
        self.boards
            .lock()
            .await
            .get(&board)
            .map(|s| s.output)
            .unwrap_or(0)
    }

    /// Make subsequent `connect` calls for this board fail.
    pub async fn refuse_connect(&self, board: u32, refuse: bool) {
        self.boards
            .lock()
            .await
            .entry(board)
            .or_default()
            .refuse_connect = refuse;
    }

    /// Make subsequent input/output reads return a non-OK status.
    pub async fn fail_reads(&self, board: u32, fail: bool) {
        self.boards.lock().await.entry(board).or_default().fail_reads = fail;
    }

    /// Number of `set_output` transactions issued to this board.
    pub async fn set_output_calls(&self, board: u32) -> usize {
        self.boards
            .lock()
            .await
            .get(&board)
            .map(|s| s.set_output_calls)
            .unwrap_or(0)
    }

    /// Whether the board currently holds an open session.
    pub async fn is_connected(&self, board: u32) -> bool {
        self.boards
            .lock()
            .await
            .get(&board)
            .map(|s| s.connected)
            .unwrap_or(false)
    }
}

#[async_trait]
impl BoardDriver for MockBoard {
    async fn connect(&self, ip: Ipv4Addr, board: u32) -> bool {
        let mut boards = self.boards.lock().await;
        let state = boards.entry(board).or_default();
        if state.refuse_connect {
            tracing::debug!(%ip, board, "mock connect refused");
            return false;
        }
        state.connected = true;
        tracing::debug!(%ip, board, "mock connect");
        true
    }

    async fn close(&self, board: u32) {
        if let Some(state) = self.boards.lock().await.get_mut(&board) {
            state.connected = false;
        }
        tracing::debug!(board, "mock close");
    }

    async fn set_output(&self, board: u32, set_mask: u32, clear_mask: u32) -> i32 {
        let mut boards = self.boards.lock().await;
        let state = boards.entry(board).or_default();
        state.set_output_calls += 1;
        if !state.connected {
            return STATUS_FAIL;
        }
        // One atomic transaction: set bits win over nothing, clear bits drop.
        state.output = (state.output | set_mask) & !clear_mask;
        STATUS_OK
    }

    async fn get_input(&self, board: u32) -> (u32, u32, i32) {
        let boards = self.boards.lock().await;
        match boards.get(&board) {
            Some(state) if state.connected && !state.fail_reads => {
                (state.input, state.latch, STATUS_OK)
            }
            _ => (0, 0, STATUS_FAIL),
        }
    }

    async fn get_output(&self, board: u32) -> (u32, u32, i32) {
        let boards = self.boards.lock().await;
        match boards.get(&board) {
            Some(state) if state.connected && !state.fail_reads => {
                (state.output, 0, STATUS_OK)
            }
            _ => (0, 0, STATUS_FAIL),
        }
    }
}
