//! # Move Chain Adapter
//!
//! HTLC operations against the Move chain's escrow package. The lock
//! Move call creates a **shared escrow object**; claim and refund
//! identify the escrow by its object id. Byte arguments (secret hash,
//! secret) travel as `vector<u8>`, which the gateway JSON encodes as
//! number arrays.

use crate::adapter::{derive_escrow_id, precheck_claim, precheck_refund, ChainAdapter};
use crate::config::ChainConfig;
use crate::gateway::fields::{str_field, u64_field};
use crate::gateway::GatewayClient;
use async_trait::async_trait;
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, EscrowStatus, OrderId, SecretBytes, SwapError,
    SwapOrder, TimelockSchedule, TokenId, TxReceipt, VmFamily,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Move chain adapter over the escrow package gateway.
pub struct MoveAdapter {
    chain: ChainId,
    config: ChainConfig,
    client: GatewayClient,
}

impl MoveAdapter {
    /// Construct from a chain config entry; `contract_address` carries
    /// the escrow package id.
    pub fn new(config: ChainConfig) -> Result<Self, SwapError> {
        if config.chain_id.vm_family() != VmFamily::Move {
            return Err(SwapError::UnsupportedChain(format!(
                "{} is not a Move chain",
                config.chain_id
            )));
        }
        config.validate()?;
        let client = GatewayClient::new(config.rpc_url.clone())?;
        Ok(Self {
            chain: config.chain_id,
            config,
            client,
        })
    }

    fn package_id(&self) -> &str {
        &self.config.contract_address
    }

    /// Signer key for a side. Source locks use the maker-side role;
    /// everything else runs as the taker-side resolver.
    fn signer_for(&self, side: EscrowSide, lock: bool) -> &str {
        if lock && side == EscrowSide::Src {
            return &self.config.signer_secret_primary;
        }
        self.config
            .signer_secret_secondary
            .as_deref()
            .unwrap_or(&self.config.signer_secret_primary)
    }

    fn receipt_from(&self, digest: String) -> TxReceipt {
        TxReceipt {
            chain: self.chain,
            explorer_url: self.config.explorer_url(&digest),
            tx_hash: digest,
        }
    }

    fn record_from(&self, side: EscrowSide, result: &Value) -> Result<EscrowRecord, SwapError> {
        // The escrow object id is the only durable locator; without it
        // there is nothing to claim or refund against.
        let object_id = str_field(result, "object_id")?;
        let digest = str_field(result, "tx_digest").unwrap_or_default();
        let deploy_time = u64_field(result, "timestamp")?;
        let secret_hash = bytes32_field(result, "secret_hash")?;

        Ok(EscrowRecord {
            side,
            chain: self.chain,
            address: object_id,
            secret_hash,
            deploy_time,
            explorer_url: if digest.is_empty() {
                None
            } else {
                self.config.explorer_url(&digest)
            },
            tx_hash: digest,
            status: parse_status(result)?,
        })
    }
}

#[async_trait]
impl ChainAdapter for MoveAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn lock(&self, order: &SwapOrder, side: EscrowSide) -> Result<EscrowRecord, SwapError> {
        // Idempotency pre-flight through the package's escrow registry.
        if let Some(existing) = self.get_escrow_by_order_id(order.order_id, side).await? {
            debug!(order_id = %order.order_id, %side, "lock retry resolved to existing escrow object");
            return Ok(existing);
        }

        let escrow_id = derive_escrow_id(order.order_id, side);
        let (token, amount, deposit, receiver) = match side {
            EscrowSide::Src => (
                &order.src_token,
                order.src_amount,
                order.safety_deposit.src,
                // Resolver claims the source leg; the gateway resolves
                // the role to its on-chain address.
                "resolver".to_string(),
            ),
            EscrowSide::Dst => (
                &order.dst_token,
                order.dst_amount,
                order.safety_deposit.dst,
                order.maker.clone(),
            ),
        };

        let timelock = match side {
            EscrowSide::Src => json!({
                "withdrawal": order.timelock.src_withdrawal,
                "public_withdrawal": order.timelock.src_public_withdrawal,
                "cancellation": order.timelock.src_cancellation,
                "public_cancellation": order.timelock.src_public_cancellation,
            }),
            EscrowSide::Dst => json!({
                "withdrawal": order.timelock.dst_withdrawal,
                "public_withdrawal": order.timelock.dst_public_withdrawal,
                "cancellation": order.timelock.dst_cancellation,
            }),
        };

        info!(order_id = %order.order_id, %side, chain = %self.chain, "locking escrow object");
        let result = self
            .client
            .call(
                "htlc_lock",
                json!({
                    "package": self.package_id(),
                    "escrow_id": escrow_id.to_vec(),
                    "secret_hash": order.secret_hash.to_vec(),
                    "receiver": receiver,
                    "coin_type": coin_type(token, self.chain),
                    "amount": amount.to_string(),
                    "safety_deposit": deposit.to_string(),
                    "timelock": timelock,
                    "signer": self.signer_for(side, true),
                }),
            )
            .await?;

        self.record_from(side, &result)
    }

    async fn claim(
        &self,
        escrow: &EscrowRecord,
        secret: &SecretBytes,
    ) -> Result<TxReceipt, SwapError> {
        precheck_claim(escrow, secret)?;

        info!(object_id = %escrow.address, side = %escrow.side, "claiming escrow object");
        let result = self
            .client
            .call(
                "htlc_claim",
                json!({
                    "package": self.package_id(),
                    "object_id": escrow.address,
                    "secret": secret.expose().to_vec(),
                    "signer": self.signer_for(escrow.side, false),
                }),
            )
            .await?;

        Ok(self.receipt_from(str_field(&result, "tx_digest")?))
    }

    async fn refund(
        &self,
        escrow: &EscrowRecord,
        timelock: &TimelockSchedule,
    ) -> Result<TxReceipt, SwapError> {
        let chain_now = self.block_timestamp().await?;
        precheck_refund(escrow, timelock, chain_now)?;

        warn!(object_id = %escrow.address, side = %escrow.side, "refunding escrow object");
        let result = self
            .client
            .call(
                "htlc_refund",
                json!({
                    "package": self.package_id(),
                    "object_id": escrow.address,
                    "signer": self.signer_for(escrow.side, false),
                }),
            )
            .await?;

        Ok(self.receipt_from(str_field(&result, "tx_digest")?))
    }

    async fn balance(&self, address: &str, token: &TokenId) -> Result<Amount, SwapError> {
        let result = self
            .client
            .call(
                "get_balance",
                json!({
                    "address": address,
                    "coin_type": coin_type(token, self.chain),
                }),
            )
            .await?;
        let raw = str_field(&result, "balance")?;
        Amount::from_dec_str(&raw)
            .map_err(|e| SwapError::ChainUnavailable(format!("bad balance `{raw}`: {e}")))
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        let result = self.client.call("latest_checkpoint", json!({})).await?;
        u64_field(&result, "timestamp")
    }

    async fn get_escrow_by_order_id(
        &self,
        order_id: OrderId,
        side: EscrowSide,
    ) -> Result<Option<EscrowRecord>, SwapError> {
        let escrow_id = derive_escrow_id(order_id, side);
        let result = self
            .client
            .call(
                "htlc_get_escrow",
                json!({
                    "package": self.package_id(),
                    "escrow_id": escrow_id.to_vec(),
                }),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(self.record_from(side, &result)?))
    }
}

/// The fully-qualified coin type the package expects; the native
/// sentinel maps to the chain's gas coin.
fn coin_type(token: &TokenId, chain: ChainId) -> String {
    if token.is_native(chain) {
        "0x2::sui::SUI".to_string()
    } else {
        token.as_str().to_string()
    }
}

fn parse_status(result: &Value) -> Result<EscrowStatus, SwapError> {
    match result.get("status").and_then(Value::as_str) {
        Some("locked") | None => Ok(EscrowStatus::Locked),
        Some("claimed") => Ok(EscrowStatus::Claimed),
        Some("refunded") => Ok(EscrowStatus::Refunded),
        Some(other) => Err(SwapError::IntegrityViolation(format!(
            "unknown escrow status `{other}`"
        ))),
    }
}

fn bytes32_field(value: &Value, key: &str) -> Result<[u8; 32], SwapError> {
    let arr = value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| SwapError::ReceiptIndeterminate(format!("missing field `{key}`")))?;
    if arr.len() != 32 {
        return Err(SwapError::ReceiptIndeterminate(format!(
            "field `{key}` must be 32 bytes, got {}",
            arr.len()
        )));
    }
    let mut out = [0u8; 32];
    for (i, v) in arr.iter().enumerate() {
        out[i] = v
            .as_u64()
            .filter(|b| *b <= u8::MAX as u64)
            .ok_or_else(|| SwapError::ReceiptIndeterminate(format!("field `{key}` not bytes")))?
            as u8;
    }
    Ok(out)
}
