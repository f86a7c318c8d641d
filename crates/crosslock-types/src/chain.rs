//! # Chain Identifiers
//!
//! The closed set of chains the resolver can coordinate, plus the
//! per-chain constants the scheduler and adapters rely on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native-coin sentinel on EVM chains: the all-zero 20-byte address.
pub const EVM_NATIVE_SENTINEL: &str = "0x0000000000000000000000000000000000000000";

/// Native-coin sentinel on non-EVM chains.
pub const NON_EVM_NATIVE_SENTINEL: &str = "native";

/// Supported chain identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    /// Base (EVM rollup).
    Base,
    /// Arbitrum (EVM rollup).
    Arbitrum,
    /// Sui (Move-based chain).
    Sui,
    /// Stellar (Soroban contracts).
    Stellar,
    /// TON (TVM chain).
    Ton,
}

/// Virtual-machine family of a chain; selects the wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmFamily {
    /// EVM-compatible rollups (ABI calldata, event topics).
    Evm,
    /// Move object model (shared escrow objects, `vector<u8>` args).
    Move,
    /// Soroban contracts (XDR-typed invocation parameters).
    Soroban,
    /// TON virtual machine.
    Tvm,
}

impl ChainId {
    /// All chains the resolver knows about.
    pub const ALL: [ChainId; 5] = [
        ChainId::Base,
        ChainId::Arbitrum,
        ChainId::Sui,
        ChainId::Stellar,
        ChainId::Ton,
    ];

    /// Wire family of this chain.
    pub fn vm_family(&self) -> VmFamily {
        match self {
            ChainId::Base | ChainId::Arbitrum => VmFamily::Evm,
            ChainId::Sui => VmFamily::Move,
            ChainId::Stellar => VmFamily::Soroban,
            ChainId::Ton => VmFamily::Tvm,
        }
    }

    /// Confirmations the adapter waits for before reporting a lock final.
    pub fn required_confirmations(&self) -> u64 {
        match self {
            ChainId::Base => 3,     // L2, soft-confirmed quickly
            ChainId::Arbitrum => 1, // L2, verified by L1
            ChainId::Sui => 1,      // Checkpoint finality
            ChainId::Stellar => 1,  // SCP, ledger close is final
            ChainId::Ton => 2,
        }
    }

    /// Estimated block (or ledger) time in seconds.
    pub fn block_time_secs(&self) -> u64 {
        match self {
            ChainId::Base => 2,
            ChainId::Arbitrum => 1,
            ChainId::Sui => 1,
            ChainId::Stellar => 5,
            ChainId::Ton => 5,
        }
    }

    /// The token identifier that denotes the chain's native coin.
    pub fn native_sentinel(&self) -> &'static str {
        match self.vm_family() {
            VmFamily::Evm => EVM_NATIVE_SENTINEL,
            _ => NON_EVM_NATIVE_SENTINEL,
        }
    }

    /// Short lowercase name used in config files and persisted state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Sui => "sui",
            ChainId::Stellar => "stellar",
            ChainId::Ton => "ton",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(ChainId::Base),
            "arbitrum" => Ok(ChainId::Arbitrum),
            "sui" => Ok(ChainId::Sui),
            "stellar" => Ok(ChainId::Stellar),
            "ton" => Ok(ChainId::Ton),
            other => Err(format!("unknown chain: {other}")),
        }
    }
}

/// Token identifier on a specific chain.
///
/// The contents are chain-native: a 20-byte hex address on EVM, an
/// object/asset locator elsewhere. The native coin uses the chain's
/// sentinel value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    /// The native-coin token for `chain`.
    pub fn native(chain: ChainId) -> Self {
        TokenId(chain.native_sentinel().to_string())
    }

    /// Whether this token is the chain's native coin.
    ///
    /// Pure string comparison; never touches the network.
    pub fn is_native(&self, chain: ChainId) -> bool {
        match chain.vm_family() {
            VmFamily::Evm => self.0.eq_ignore_ascii_case(EVM_NATIVE_SENTINEL),
            _ => self.0 == NON_EVM_NATIVE_SENTINEL,
        }
    }

    /// Raw chain-native identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        TokenId(s.to_string())
    }
}
