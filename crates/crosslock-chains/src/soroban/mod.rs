//! # Soroban Adapter
//!
//! HTLC operations against the Soroban escrow contract. Invocation
//! parameters are XDR-typed `ScVal`s ([`xdr`]); the contract entry for
//! locking is `create_escrow(secret_hash, timelock, receiver,
//! order_id, amount)`, with the safety deposit folded into the
//! transfer the contract pulls from the invoker.

pub mod xdr;

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

/// Soroban contract adapter.
pub struct SorobanAdapter {
    chain: ChainId,
    config: ChainConfig,
    client: GatewayClient,
}

impl SorobanAdapter {
    /// Construct from a chain config entry; `contract_address` is the
    /// escrow contract id.
    pub fn new(config: ChainConfig) -> Result<Self, SwapError> {
        if config.chain_id.vm_family() != VmFamily::Soroban {
            return Err(SwapError::UnsupportedChain(format!(
                "{} is not a Soroban chain",
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

    fn signer_for(&self, side: EscrowSide, lock: bool) -> &str {
        if lock && side == EscrowSide::Src {
            return &self.config.signer_secret_primary;
        }
        self.config
            .signer_secret_secondary
            .as_deref()
            .unwrap_or(&self.config.signer_secret_primary)
    }

    /// Invoke a contract function with XDR-encoded arguments.
    async fn invoke(
        &self,
        function: &str,
        args: Vec<Vec<u8>>,
        signer: &str,
    ) -> Result<Value, SwapError> {
        let args_hex: Vec<String> = args.iter().map(|a| xdr::to_hex(a)).collect();
        self.client
            .call(
                "invoke_contract",
                json!({
                    "contract": self.config.contract_address,
                    "function": xdr::to_hex(&xdr::scv_symbol(function)),
                    "args_xdr": args_hex,
                    "signer": signer,
                }),
            )
            .await
    }

    fn receipt_from(&self, hash: String) -> TxReceipt {
        TxReceipt {
            chain: self.chain,
            explorer_url: self.config.explorer_url(&hash),
            tx_hash: hash,
        }
    }

    /// Side-appropriate timelock offsets as an XDR `u64` vector the
    /// contract unpacks positionally.
    fn timelock_args(order: &SwapOrder, side: EscrowSide) -> Vec<Vec<u8>> {
        match side {
            EscrowSide::Src => vec![
                xdr::scv_u64(order.timelock.src_withdrawal),
                xdr::scv_u64(order.timelock.src_public_withdrawal),
                xdr::scv_u64(order.timelock.src_cancellation),
                xdr::scv_u64(order.timelock.src_public_cancellation),
            ],
            EscrowSide::Dst => vec![
                xdr::scv_u64(order.timelock.dst_withdrawal),
                xdr::scv_u64(order.timelock.dst_public_withdrawal),
                xdr::scv_u64(order.timelock.dst_cancellation),
            ],
        }
    }
}

#[async_trait]
impl ChainAdapter for SorobanAdapter {
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

        let amount_i128 = to_u128(amount)?;
        let deposit_i128 = to_u128(deposit)?;

        // create_escrow(secret_hash, timelock..., receiver, order_id,
        // amount) plus the token and deposit arms the contract takes.
        let mut args = vec![xdr::scv_bytes(&order.secret_hash)];
        args.extend(Self::timelock_args(order, side));
        args.push(xdr::scv_string(&receiver));
        args.push(xdr::scv_bytes(&escrow_id));
        args.push(xdr::scv_i128(amount_i128));
        args.push(xdr::scv_i128(deposit_i128));
        args.push(xdr::scv_string(&asset_code(token, self.chain)));

        info!(order_id = %order.order_id, %side, chain = %self.chain, "locking escrow");
        let result = self
            .invoke("create_escrow", args, self.signer_for(side, true))
            .await?;

        let hash = str_field(&result, "tx_hash")?;
        let deploy_time = u64_field(&result, "ledger_close_time")?;

        Ok(EscrowRecord {
            side,
            chain: self.chain,
            address: format!(
                "{}:{}",
                self.config.contract_address,
                hex::encode(escrow_id)
            ),
            secret_hash: order.secret_hash,
            deploy_time,
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

        let escrow_id = locator_escrow_id(&escrow.address)?;
        let args = vec![xdr::scv_bytes(&escrow_id), xdr::scv_bytes(&secret.expose())];

        info!(escrow = %escrow.address, side = %escrow.side, "claiming escrow");
        let result = self
            .invoke("claim", args, self.signer_for(escrow.side, false))
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

        let escrow_id = locator_escrow_id(&escrow.address)?;
        let args = vec![xdr::scv_bytes(&escrow_id)];

        warn!(escrow = %escrow.address, side = %escrow.side, "refunding escrow");
        let result = self
            .invoke("refund", args, self.signer_for(escrow.side, false))
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
                    "asset": asset_code(token, self.chain),
                }),
            )
            .await?;
        let raw = str_field(&result, "balance")?;
        Amount::from_dec_str(&raw)
            .map_err(|e| SwapError::ChainUnavailable(format!("bad balance `{raw}`: {e}")))
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        let result = self.client.call("latest_ledger", json!({})).await?;
        u64_field(&result, "close_time")
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
                "get_escrow",
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
            address: format!(
                "{}:{}",
                self.config.contract_address,
                hex::encode(escrow_id)
            ),
            secret_hash,
            deploy_time: u64_field(&result, "deployed_at")?,
            tx_hash: str_field(&result, "tx_hash").unwrap_or_default(),
            explorer_url: None,
            status,
        }))
    }
}

/// The asset identifier the contract's token client expects.
fn asset_code(token: &TokenId, chain: ChainId) -> String {
    if token.is_native(chain) {
        "XLM".to_string()
    } else {
        token.as_str().to_string()
    }
}

fn locator_escrow_id(address: &str) -> Result<[u8; 32], SwapError> {
    let (_, id_str) = address
        .rsplit_once(':')
        .ok_or_else(|| SwapError::Validation(format!("bad escrow locator: {address}")))?;
    let raw = hex::decode(id_str)
        .map_err(|e| SwapError::Validation(format!("bad escrow id: {e}")))?;
    raw.try_into()
        .map_err(|_| SwapError::Validation("escrow id must be 32 bytes".into()))
}

/// Amounts cross the XDR boundary as `i128`; anything wider than 128
/// bits cannot be represented on this chain.
fn to_u128(amount: Amount) -> Result<u128, SwapError> {
    if amount > Amount::from(u128::MAX) {
        return Err(SwapError::Validation(format!(
            "amount {amount} exceeds i128 range"
        )));
    }
    Ok(amount.as_u128())
}
