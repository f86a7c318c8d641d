//! # Core Domain Entities
//!
//! The resolver's data model.
//!
//! ## Clusters
//!
//! - **Plan**: `SwapOrder`, `TimelockSchedule`, `FillPart` — the
//!   immutable description of what should happen.
//! - **Progress**: `EscrowRecord`, `TxReceipt` — per-leg on-chain
//!   results.
//! - **Aggregate**: `SwapState`, `SwapStatus` — the single owning
//!   record the store persists.

use crate::chain::{ChainId, TokenId};
use crate::secret::{hex32, SecretBytes};
use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: THE PLAN
// =============================================================================

/// 128-bit opaque order identifier, hex-encoded in display and storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(#[serde(with = "hex16")] pub [u8; 16]);

impl OrderId {
    /// Mint a fresh random id.
    pub fn random() -> Self {
        OrderId(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Lowercase hex, 32 chars, no separators.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes, for deterministic escrow-id derivation.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.to_hex())
    }
}

impl FromStr for OrderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| format!("bad order id: {e}"))?;
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| "order id must be 16 bytes".to_string())?;
        Ok(OrderId(bytes))
    }
}

mod hex16 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 16], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 16], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected 16 bytes"))
    }
}

/// The seven relative timelock offsets, in seconds from the lock time
/// of the respective side.
///
/// The asymmetry rule `dst_cancellation < src_cancellation` is what
/// makes the refund path safe: by the time the source side becomes
/// cancellable, the destination side has either been claimed (secret
/// public) or refunded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockSchedule {
    /// Finality lock on src: minimum wait after lock before claim.
    pub src_withdrawal: u64,
    /// After this, anyone may claim src with the revealed secret.
    pub src_public_withdrawal: u64,
    /// After this, the maker may refund src.
    pub src_cancellation: u64,
    /// After this, anyone may refund src.
    pub src_public_cancellation: u64,
    /// Finality lock on dst.
    pub dst_withdrawal: u64,
    /// Public claim opens on dst.
    pub dst_public_withdrawal: u64,
    /// Maker may refund dst.
    pub dst_cancellation: u64,
}

/// Safety deposits the resolver posts on each side to discourage
/// abandonment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyDeposit {
    /// Posted alongside the source escrow.
    pub src: Amount,
    /// Posted alongside the destination escrow.
    pub dst: Amount,
}

/// One part of a partially-fillable order.
///
/// Each part carries an independent secret: revealing part *i*'s
/// pre-image discloses nothing about its siblings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillPart {
    /// 1-based part index, stable across the order's life.
    pub part_id: u8,
    /// Source-side amount of this part; parts sum to `src_amount`.
    pub src_amount: Amount,
    /// Destination-side amount of this part.
    pub dst_amount: Amount,
    /// This part's secret.
    pub secret: SecretBytes,
    /// SHA-256 of this part's secret.
    #[serde(with = "hex32")]
    pub secret_hash: [u8; 32],
}

/// The immutable plan for a swap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapOrder {
    /// Unique order identifier.
    pub order_id: OrderId,
    /// Chain-scoped address of the user requesting the swap.
    pub maker: String,
    /// Chain the maker's funds leave from.
    pub src_chain: ChainId,
    /// Chain the maker receives on.
    pub dst_chain: ChainId,
    /// Token offered on the source chain.
    pub src_token: TokenId,
    /// Token wanted on the destination chain.
    pub dst_token: TokenId,
    /// Amount offered, in src-chain smallest units.
    pub src_amount: Amount,
    /// Amount wanted, in dst-chain smallest units.
    pub dst_amount: Amount,
    /// The swap secret; never transmitted before reveal.
    pub secret: SecretBytes,
    /// SHA-256 of the secret, committed on both chains.
    #[serde(with = "hex32")]
    pub secret_hash: [u8; 32],
    /// Relative deadline schedule for both sides.
    pub timelock: TimelockSchedule,
    /// Resolver's safety deposits.
    pub safety_deposit: SafetyDeposit,
    /// Parts of a partially-fillable order; empty for whole-fill orders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_parts: Vec<FillPart>,
}

impl SwapOrder {
    /// Whether this order fills in independent parts.
    pub fn is_partial(&self) -> bool {
        !self.fill_parts.is_empty()
    }

    /// Look up a part by id.
    pub fn part(&self, part_id: u8) -> Option<&FillPart> {
        self.fill_parts.iter().find(|p| p.part_id == part_id)
    }
}

// =============================================================================
// CLUSTER B: ON-CHAIN PROGRESS
// =============================================================================

/// Which leg of the swap an escrow belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowSide {
    /// The maker's leg: maker funds in, resolver is the receiver.
    Src,
    /// The resolver's leg: resolver funds in, maker is the receiver.
    Dst,
}

impl EscrowSide {
    /// Short name used in logs and key derivation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowSide::Src => "src",
            EscrowSide::Dst => "dst",
        }
    }
}

impl fmt::Display for EscrowSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single escrow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    /// Lock submitted, not yet observed final.
    #[default]
    Pending,
    /// Funds locked, awaiting claim or expiry.
    Locked,
    /// Secret presented, funds paid to the receiver.
    Claimed,
    /// Past the cancellation deadline, funds returned to the sender.
    Refunded,
}

/// Receipt material for a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Chain the transaction landed on.
    pub chain: ChainId,
    /// Chain-native transaction hash.
    pub tx_hash: String,
    /// Display-only explorer link, if the chain config provides one.
    pub explorer_url: Option<String>,
}

/// One persisted transaction, in the order the resolver observed it.
///
/// The journal is how invariants about operation ordering (claim dst
/// before claim src, refund after deadline) stay checkable after the
/// fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    /// `lock`, `claim`, or `refund`.
    pub op: String,
    /// Which leg the transaction touched.
    pub side: EscrowSide,
    /// For partial orders, the part involved.
    pub part_id: Option<u8>,
    /// The receipt itself.
    pub receipt: TxReceipt,
}

/// Mutable per-leg state after locking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Which leg this escrow covers.
    pub side: EscrowSide,
    /// Chain this escrow lives on.
    pub chain: ChainId,
    /// Chain-native locator: contract address + escrow id, or object id.
    pub address: String,
    /// Hashlock committed on-chain at lock time; claims are checked
    /// against it locally before any transaction is sent.
    #[serde(with = "hex32")]
    pub secret_hash: [u8; 32],
    /// Chain block timestamp at which the lock was observed finalised.
    pub deploy_time: u64,
    /// Hash of the lock transaction.
    pub tx_hash: String,
    /// Display-only explorer link.
    pub explorer_url: Option<String>,
    /// Current escrow lifecycle stage.
    pub status: EscrowStatus,
}

// =============================================================================
// CLUSTER C: THE AGGREGATE
// =============================================================================

/// Aggregate swap status; the state machine's vertices.
///
/// Persisted in SCREAMING_SNAKE_CASE so stored state reads the same
/// as the operational runbooks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    /// Order persisted, nothing on chain yet.
    #[default]
    Created,
    /// Source escrow locked.
    SrcDeployed,
    /// Both escrows locked.
    DstDeployed,
    /// Both legs claimed.
    Completed,
    /// Locked legs refunded (or nothing was ever locked).
    Cancelled,
    /// Unrecoverable failure; surfaced to the operator.
    Failed,
}

impl SwapStatus {
    /// Whether `next` is reachable from `self` in one legal step.
    ///
    /// Every non-terminal state can reach `Failed`: an integrity
    /// violation marks the swap FAILED no matter how far it got.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;
        matches!(
            (self, next),
            (Created, SrcDeployed)
                | (Created, Failed)
                | (Created, Cancelled)
                | (SrcDeployed, DstDeployed)
                | (SrcDeployed, Cancelled)
                | (SrcDeployed, Failed)
                | (DstDeployed, Completed)
                | (DstDeployed, Cancelled)
                | (DstDeployed, Failed)
        )
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Completed | SwapStatus::Cancelled | SwapStatus::Failed
        )
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapStatus::Created => "CREATED",
            SwapStatus::SrcDeployed => "SRC_DEPLOYED",
            SwapStatus::DstDeployed => "DST_DEPLOYED",
            SwapStatus::Completed => "COMPLETED",
            SwapStatus::Cancelled => "CANCELLED",
            SwapStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Runtime state of one part of a partially-fillable order.
///
/// Parts move through the same state machine as whole orders, each
/// with its own pair of escrows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartState {
    /// Which `FillPart` of the order this tracks.
    pub part_id: u8,
    /// This part's position in the state machine.
    pub status: SwapStatus,
    /// Source escrow for this part, once locked.
    pub src_escrow: Option<EscrowRecord>,
    /// Destination escrow for this part, once locked.
    pub dst_escrow: Option<EscrowRecord>,
    /// Both legs claimed.
    pub withdrawn: bool,
    /// Refund path taken.
    pub cancelled: bool,
}

impl PartState {
    /// Fresh part state in `Created`.
    pub fn new(part_id: u8) -> Self {
        Self {
            part_id,
            status: SwapStatus::Created,
            src_escrow: None,
            dst_escrow: None,
            withdrawn: false,
            cancelled: false,
        }
    }
}

/// The aggregate record the store persists: plan plus progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapState {
    /// The immutable plan.
    pub order: SwapOrder,
    /// Aggregate status; mutated only through store transitions.
    pub status: SwapStatus,
    /// Source escrow, populated on `SRC_DEPLOYED`.
    pub src_escrow: Option<EscrowRecord>,
    /// Destination escrow, populated on `DST_DEPLOYED`.
    pub dst_escrow: Option<EscrowRecord>,
    /// Per-part progress for partially-fillable orders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<PartState>,
    /// Transaction journal, append-only, in persistence order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipts: Vec<ReceiptEntry>,
    /// Wall clock at creation. Observability only; never compared to
    /// on-chain deadlines.
    pub created_at: u64,
    /// Wall clock of the last mutation. Observability only.
    pub updated_at: u64,
}

impl SwapState {
    /// Fresh state for a newly created order.
    pub fn new(order: SwapOrder, now: u64) -> Self {
        let parts = order
            .fill_parts
            .iter()
            .map(|p| PartState::new(p.part_id))
            .collect();
        Self {
            order,
            status: SwapStatus::Created,
            src_escrow: None,
            dst_escrow: None,
            parts,
            receipts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Part state by id, if this is a partial order.
    pub fn part_state(&self, part_id: u8) -> Option<&PartState> {
        self.parts.iter().find(|p| p.part_id == part_id)
    }

    /// Mutable part state by id.
    pub fn part_state_mut(&mut self, part_id: u8) -> Option<&mut PartState> {
        self.parts.iter_mut().find(|p| p.part_id == part_id)
    }
}
