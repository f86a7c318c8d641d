//! # TVM Adapter
//!
//! HTLC operations against the TVM chain's escrow contract. TVM
//! wallets are sequence-numbered: every outbound message carries the
//! wallet's current seqno, so sends through one wallet are serialised
//! the same way the EVM adapter serialises nonces.

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
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// TVM chain adapter.
pub struct TvmAdapter {
    chain: ChainId,
    config: ChainConfig,
    client: GatewayClient,
    /// Seqno ordering: one in-flight external message per wallet.
    seqno_guard: Mutex<()>,
}

impl TvmAdapter {
    /// Construct from a chain config entry.
    pub fn new(config: ChainConfig) -> Result<Self, SwapError> {
        if config.chain_id.vm_family() != VmFamily::Tvm {
            return Err(SwapError::UnsupportedChain(format!(
                "{} is not a TVM chain",
                config.chain_id
            )));
        }
        config.validate()?;
        let client = GatewayClient::new(config.rpc_url.clone())?;
        Ok(Self {
            chain: config.chain_id,
            config,
            client,
            seqno_guard: Mutex::new(()),
        })
    }

    fn signer_for(&self, side: EscrowSide, lock: bool) -> &str {
        if lock && side == EscrowSide::Src {
            return &self.config.signer_secret_primary;
        }
        self.config
            .signer_secret_secondary
            .as_deref()
            .unwrap_or(&self.config.signer_secret_primary)
    }

    /// Send one external message through the wallet, seqno-ordered.
    async fn send_message(&self, method: &str, params: Value) -> Result<Value, SwapError> {
        let _seqno_order = self.seqno_guard.lock().await;
        self.client.call(method, params).await
    }

    fn receipt_from(&self, hash: String) -> TxReceipt {
        TxReceipt {
            chain: self.chain,
            explorer_url: self.config.explorer_url(&hash),
            tx_hash: hash,
        }
    }

    fn locator(&self, escrow_id: [u8; 32]) -> String {
        format!("{}:{}", self.config.contract_address, hex::encode(escrow_id))
    }
}

#[async_trait]
impl ChainAdapter for TvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn lock(&self, order: &SwapOrder, side: EscrowSide) -> Result<EscrowRecord, SwapError> {
        if let Some(existing) = self.get_escrow_by_order_id(order.order_id, side).await? {
            debug!(order_id = %order.order_id, %side, "lock retry resolved to existing escrow");
            return Ok(existing);
        }

        let escrow_id = derive_escrow_id(order.order_id, side);
        let (token, amount, deposit, receiver) = match side {
            EscrowSide::Src => (
                &order.src_token,
                order.src_amount,
                order.safety_deposit.src,
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
            EscrowSide::Src => json!([
                order.timelock.src_withdrawal,
                order.timelock.src_public_withdrawal,
                order.timelock.src_cancellation,
                order.timelock.src_public_cancellation,
            ]),
            EscrowSide::Dst => json!([
                order.timelock.dst_withdrawal,
                order.timelock.dst_public_withdrawal,
                order.timelock.dst_cancellation,
            ]),
        };

        info!(order_id = %order.order_id, %side, chain = %self.chain, "locking escrow");
        let result = self
            .send_message(
                "htlc_lock",
                json!({
                    "contract": self.config.contract_address,
                    "escrow_id": hex::encode(escrow_id),
                    "secret_hash": hex::encode(order.secret_hash),
                    "receiver": receiver,
                    "token": token_identifier(token, self.chain),
                    "amount": amount.to_string(),
                    "safety_deposit": deposit.to_string(),
                    "timelock": timelock,
                    "signer": self.signer_for(side, true),
                }),
            )
            .await?;

        let hash = str_field(&result, "tx_hash")?;
        Ok(EscrowRecord {
            side,
            chain: self.chain,
            address: self.locator(escrow_id),
            secret_hash: order.secret_hash,
            deploy_time: u64_field(&result, "utime")?,
            explorer_url: self.config.explorer_url(&hash),
            tx_hash: hash,
            status: EscrowStatus::Locked,
        })
    }

    async fn claim(
        &self,
        escrow: &EscrowRecord,
        secret: &SecretBytes,
    ) -> Result<TxReceipt, SwapError> {
        precheck_claim(escrow, secret)?;

        info!(escrow = %escrow.address, side = %escrow.side, "claiming escrow");
        let result = self
            .send_message(
                "htlc_claim",
                json!({
                    "contract": self.config.contract_address,
                    "escrow": escrow.address,
                    "secret": hex::encode(secret.expose()),
                    "signer": self.signer_for(escrow.side, false),
                }),
            )
            .await?;
        Ok(self.receipt_from(str_field(&result, "tx_hash")?))
    }

    async fn refund(
        &self,
        escrow: &EscrowRecord,
        timelock: &TimelockSchedule,
    ) -> Result<TxReceipt, SwapError> {
        let chain_now = self.block_timestamp().await?;
        precheck_refund(escrow, timelock, chain_now)?;

        warn!(escrow = %escrow.address, side = %escrow.side, "refunding escrow");
        let result = self
            .send_message(
                "htlc_refund",
                json!({
                    "contract": self.config.contract_address,
                    "escrow": escrow.address,
                    "signer": self.signer_for(escrow.side, false),
                }),
            )
            .await?;
        Ok(self.receipt_from(str_field(&result, "tx_hash")?))
    }

    async fn balance(&self, address: &str, token: &TokenId) -> Result<Amount, SwapError> {
        let result = self
            .client
            .call(
                "get_balance",
                json!({
                    "address": address,
                    "token": token_identifier(token, self.chain),
                }),
            )
            .await?;
        let raw = str_field(&result, "balance")?;
        Amount::from_dec_str(&raw)
            .map_err(|e| SwapError::ChainUnavailable(format!("bad balance `{raw}`: {e}")))
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        let result = self.client.call("masterchain_info", json!({})).await?;
        u64_field(&result, "utime")
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
                    "contract": self.config.contract_address,
                    "escrow_id": hex::encode(escrow_id),
                }),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let status = match str_field(&result, "status")?.as_str() {
            "locked" => EscrowStatus::Locked,
            "claimed" => EscrowStatus::Claimed,
            "refunded" => EscrowStatus::Refunded,
            other => {
                return Err(SwapError::IntegrityViolation(format!(
                    "unknown escrow status `{other}`"
                )))
            }
        };

        let secret_hash_hex = str_field(&result, "secret_hash")?;
        let raw = hex::decode(&secret_hash_hex)
            .map_err(|e| SwapError::ReceiptIndeterminate(format!("secret_hash: {e}")))?;
        let secret_hash: [u8; 32] = raw
            .try_into()
            .map_err(|_| SwapError::ReceiptIndeterminate("secret_hash must be 32 bytes".into()))?;

        Ok(Some(EscrowRecord {
            side,
            chain: self.chain,
            address: self.locator(escrow_id),
            secret_hash,
            deploy_time: u64_field(&result, "utime")?,
            tx_hash: str_field(&result, "tx_hash").unwrap_or_default(),
            explorer_url: None,
            status,
        }))
    }
}

/// Jetton master address, or the native sentinel.
fn token_identifier(token: &TokenId, chain: ChainId) -> String {
    if token.is_native(chain) {
        "native".to_string()
    } else {
        token.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_identifier() {
        assert_eq!(
            token_identifier(&TokenId::native(ChainId::Ton), ChainId::Ton),
            "native"
        );
        assert_eq!(
            token_identifier(&TokenId::from("EQjetton"), ChainId::Ton),
            "EQjetton"
        );
    }

    #[test]
    fn test_non_tvm_chain_rejected() {
        let config = ChainConfig {
            chain_id: ChainId::Stellar,
            rpc_url: "https://gw.example.org".to_string(),
            contract_address: "EQescrow".to_string(),
            explorer_url_template: None,
            signer_secret_primary: "key".to_string(),
            signer_secret_secondary: None,
            confirmations_override: None,
        };
        assert!(TvmAdapter::new(config).is_err());
    }
}
