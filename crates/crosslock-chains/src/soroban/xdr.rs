//! # XDR Value Encoding
//!
//! Minimal writer for the `ScVal` union the Soroban contract entry
//! takes. XDR is big-endian with 4-byte alignment: a union is its
//! 4-byte discriminant followed by the arm, and opaque data is a
//! 4-byte length followed by the bytes padded to a multiple of 4.
//!
//! Only the arms the escrow entrypoints use are implemented.

/// `ScVal` union discriminants (stellar XDR ordinals).
mod tag {
    pub const U64: u32 = 5;
    pub const I128: u32 = 10;
    pub const BYTES: u32 = 13;
    pub const STRING: u32 = 14;
    pub const SYMBOL: u32 = 15;
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_opaque(out: &mut Vec<u8>, bytes: &[u8]) {
    push_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
    let pad = (4 - bytes.len() % 4) % 4;
    out.extend(std::iter::repeat(0u8).take(pad));
}

/// `ScVal::U64`.
pub fn scv_u64(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    push_u32(&mut out, tag::U64);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// `ScVal::I128` from an unsigned 128-bit magnitude.
pub fn scv_i128(value: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    push_u32(&mut out, tag::I128);
    out.extend_from_slice(&((value >> 64) as u64).to_be_bytes()); // hi
    out.extend_from_slice(&(value as u64).to_be_bytes()); // lo
    out
}

/// `ScVal::Bytes`.
pub fn scv_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + bytes.len() + 4);
    push_u32(&mut out, tag::BYTES);
    push_opaque(&mut out, bytes);
    out
}

/// `ScVal::String`. Receiver addresses travel in this arm; the
/// gateway wraps them into `ScAddress` when assembling the invocation.
pub fn scv_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + s.len() + 4);
    push_u32(&mut out, tag::STRING);
    push_opaque(&mut out, s.as_bytes());
    out
}

/// `ScVal::Symbol` — function names and enum-ish keys.
pub fn scv_symbol(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + s.len() + 4);
    push_u32(&mut out, tag::SYMBOL);
    push_opaque(&mut out, s.as_bytes());
    out
}

/// Hex encoding of an encoded value, the form the gateway accepts.
pub fn to_hex(encoded: &[u8]) -> String {
    hex::encode(encoded)
}
