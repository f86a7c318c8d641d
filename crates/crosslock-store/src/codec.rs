//! # State Codec
//!
//! bincode encoding for persisted swap state. The encoding must
//! round-trip exactly: 256-bit amounts byte-for-byte, hex fields
//! canonical lowercase.

use crosslock_types::{OrderId, SwapError, SwapState};

/// Key prefix for swap records.
pub const SWAP_PREFIX: &[u8] = b"swap:";

/// Storage key for an order.
pub fn swap_key(order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(SWAP_PREFIX.len() + 16);
    key.extend_from_slice(SWAP_PREFIX);
    key.extend_from_slice(order_id.as_bytes());
    key
}

/// Encode a state record.
pub fn encode_state(state: &SwapState) -> Result<Vec<u8>, SwapError> {
    bincode::serialize(state).map_err(|e| SwapError::Store(format!("encode failed: {e}")))
}

/// Decode a state record.
pub fn decode_state(bytes: &[u8]) -> Result<SwapState, SwapError> {
    bincode::deserialize(bytes).map_err(|e| SwapError::Store(format!("decode failed: {e}")))
}
