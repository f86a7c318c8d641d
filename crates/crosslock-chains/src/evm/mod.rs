//! # EVM Adapter
//!
//! HTLC operations over JSON-RPC for the EVM rollups. One escrow
//! contract per chain exposes `createEscrow` / `claim` / `refund` /
//! `getEscrow`; escrow ids are the deterministic `(order_id, side)`
//! derivation, which is what makes lock retries collapse onto the
//! same escrow.
//!
//! Wire specifics honoured here:
//! - the committed hashlock is SHA-256 of the secret (keccak appears
//!   only as ABI machinery, never as a hashlock)
//! - the escrow id is emitted by `EscrowCreated` at topic index 1
//! - the native-coin sentinel is the all-zero 20-byte address
//! - nonce ordering is serialised per wallet

pub mod calldata;
pub mod timelocks;

use crate::adapter::{derive_escrow_id, precheck_claim, precheck_refund, ChainAdapter};
use crate::config::ChainConfig;
use async_trait::async_trait;
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, EscrowStatus, OrderId, SecretBytes, SwapError,
    SwapOrder, TimelockSchedule, TokenId, TxReceipt, VmFamily,
};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, H256, U256,
};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Per-call RPC deadline.
const CALL_TIMEOUT: Duration = Duration::from_secs(45);

type EvmClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Numeric EIP-155 chain id.
fn numeric_chain_id(chain: ChainId) -> Result<u64, SwapError> {
    match chain {
        ChainId::Base => Ok(8453),
        ChainId::Arbitrum => Ok(42161),
        other => Err(SwapError::UnsupportedChain(format!(
            "{other} is not an EVM chain"
        ))),
    }
}

/// EVM rollup adapter.
pub struct EvmAdapter {
    chain: ChainId,
    config: ChainConfig,
    provider: Provider<Http>,
    /// Maker-side resolver signer: source locks and source refunds.
    primary: Arc<EvmClient>,
    /// Taker-side resolver signer: destination locks and all claims.
    secondary: Arc<EvmClient>,
    contract: Address,
    confirmations: usize,
    /// Nonce ordering is per wallet; sends through a wallet are
    /// serialised by its guard.
    primary_guard: Mutex<()>,
    secondary_guard: Mutex<()>,
}

impl EvmAdapter {
    /// Construct from a chain config entry. Signers are acquired here
    /// and live as long as the adapter.
    pub fn new(config: ChainConfig) -> Result<Self, SwapError> {
        if config.chain_id.vm_family() != VmFamily::Evm {
            return Err(SwapError::UnsupportedChain(format!(
                "{} is not an EVM chain",
                config.chain_id
            )));
        }
        config.validate()?;

        let chain = config.chain_id;
        let chain_num = numeric_chain_id(chain)?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SwapError::Validation(format!("bad rpc url: {e}")))?;

        let primary_wallet = parse_wallet(&config.signer_secret_primary, chain_num)?;
        let secondary_wallet = match &config.signer_secret_secondary {
            Some(key) => parse_wallet(key, chain_num)?,
            None => primary_wallet.clone(),
        };

        let contract = Address::from_str(&config.contract_address)
            .map_err(|e| SwapError::Validation(format!("bad contract address: {e}")))?;

        let confirmations = config.required_confirmations() as usize;
        let primary = Arc::new(SignerMiddleware::new(provider.clone(), primary_wallet));
        let secondary = Arc::new(SignerMiddleware::new(provider.clone(), secondary_wallet));

        Ok(Self {
            chain,
            config,
            provider,
            primary,
            secondary,
            contract,
            confirmations,
            primary_guard: Mutex::new(()),
            secondary_guard: Mutex::new(()),
        })
    }

    /// Address of the taker-side resolver signer: the receiver of
    /// source escrows on this chain.
    pub fn resolver_address(&self) -> Address {
        self.secondary.signer().address()
    }

    fn signer_for(&self, side: EscrowSide, op: Op) -> (&Arc<EvmClient>, &Mutex<()>) {
        match (side, op) {
            // Source locks and refunds run under the maker-side role.
            (EscrowSide::Src, Op::Lock) | (EscrowSide::Src, Op::Refund) => {
                (&self.primary, &self.primary_guard)
            }
            // Everything else is the taker-side resolver's business.
            _ => (&self.secondary, &self.secondary_guard),
        }
    }

    /// Send a contract call and wait for its finalised receipt.
    async fn send_and_confirm(
        &self,
        client: &Arc<EvmClient>,
        guard: &Mutex<()>,
        data: Vec<u8>,
        value: U256,
        op_name: &str,
    ) -> Result<TransactionReceipt, SwapError> {
        let _nonce_order = guard.lock().await;

        let tx = TransactionRequest::new()
            .to(self.contract)
            .data(Bytes::from(data))
            .value(value);

        let pending = with_deadline(op_name, client.send_transaction(tx, None))
            .await?
            .map_err(|e| map_send_error(op_name, &e.to_string()))?;

        let receipt = with_deadline(op_name, pending.confirmations(self.confirmations))
            .await?
            .map_err(|e| SwapError::ReceiptIndeterminate(format!("{op_name}: {e}")))?
            .ok_or_else(|| {
                SwapError::ReceiptIndeterminate(format!("{op_name}: receipt dropped"))
            })?;

        if receipt.status != Some(1u64.into()) {
            return Err(SwapError::ContractReverted(format!(
                "{op_name} reverted in tx {:#x}",
                receipt.transaction_hash
            )));
        }

        Ok(receipt)
    }

    /// Block timestamp of the block a receipt landed in.
    async fn receipt_timestamp(&self, receipt: &TransactionReceipt) -> Result<u64, SwapError> {
        let number = receipt.block_number.ok_or_else(|| {
            SwapError::ReceiptIndeterminate("receipt missing block number".into())
        })?;
        let block = with_deadline("get_block", self.provider.get_block(number))
            .await?
            .map_err(|e| SwapError::ChainUnavailable(format!("get_block: {e}")))?
            .ok_or_else(|| SwapError::ReceiptIndeterminate("lock block not found".into()))?;
        Ok(block.timestamp.as_u64())
    }

    /// Pull the escrow id out of the `EscrowCreated` event, topic 1.
    fn extract_escrow_id(&self, receipt: &TransactionReceipt) -> Result<[u8; 32], SwapError> {
        let topic0 = H256::from(calldata::event_topic(calldata::SIG_EVENT_ESCROW_CREATED));
        for log in &receipt.logs {
            if log.address == self.contract && log.topics.first() == Some(&topic0) {
                if let Some(escrow_topic) = log.topics.get(1) {
                    return Ok(escrow_topic.to_fixed_bytes());
                }
            }
        }
        // No event, or a permissioned node stripped the logs. Never
        // fabricate an id; the orchestrator retries the lookup path.
        Err(SwapError::ReceiptIndeterminate(
            "EscrowCreated event not found in lock receipt".into(),
        ))
    }

    fn escrow_locator(&self, escrow_id: [u8; 32]) -> String {
        format!("{:#x}:{}", self.contract, hex::encode(escrow_id))
    }

    fn receipt_of(&self, tx_hash: H256) -> TxReceipt {
        let hash = format!("{tx_hash:#x}");
        TxReceipt {
            chain: self.chain,
            explorer_url: self.config.explorer_url(&hash),
            tx_hash: hash,
        }
    }

    /// ERC-20 allowance for the token branch: approve, then lock.
    async fn approve_token(
        &self,
        client: &Arc<EvmClient>,
        guard: &Mutex<()>,
        token: Address,
        amount: U256,
    ) -> Result<(), SwapError> {
        let _nonce_order = guard.lock().await;

        let tx = TransactionRequest::new()
            .to(token)
            .data(Bytes::from(calldata::approve_call(self.contract, amount)));

        let pending = with_deadline("approve", client.send_transaction(tx, None))
            .await?
            .map_err(|e| map_send_error("approve", &e.to_string()))?;
        let receipt = with_deadline("approve", pending.confirmations(self.confirmations))
            .await?
            .map_err(|e| SwapError::ReceiptIndeterminate(format!("approve: {e}")))?
            .ok_or_else(|| SwapError::ReceiptIndeterminate("approve receipt dropped".into()))?;

        if receipt.status != Some(1u64.into()) {
            return Err(SwapError::ContractReverted("approve reverted".into()));
        }
        Ok(())
    }

    async fn view_escrow(&self, escrow_id: [u8; 32]) -> Result<Option<calldata::EscrowView>, SwapError> {
        let typed: TypedTransaction = TransactionRequest::new()
            .to(self.contract)
            .data(Bytes::from(calldata::get_escrow_call(escrow_id)))
            .into();

        let raw = with_deadline("getEscrow", self.provider.call(&typed, None))
            .await?
            .map_err(|e| SwapError::ChainUnavailable(format!("getEscrow: {e}")))?;

        if raw.is_empty() {
            return Ok(None);
        }
        let view = calldata::decode_escrow_view(&raw)?;
        if view.deployed_at == 0 {
            return Ok(None);
        }
        Ok(Some(view))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    Lock,
    Claim,
    Refund,
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn lock(&self, order: &SwapOrder, side: EscrowSide) -> Result<EscrowRecord, SwapError> {
        let escrow_id = derive_escrow_id(order.order_id, side);

        // Idempotency pre-flight: a retry after an ambiguous outcome
        // must land on the existing escrow, not mint a second one.
        if let Some(existing) = self.get_escrow_by_order_id(order.order_id, side).await? {
            debug!(order_id = %order.order_id, %side, "lock retry resolved to existing escrow");
            return Ok(existing);
        }

        let (token_id, amount, deposit, receiver) = match side {
            EscrowSide::Src => (
                &order.src_token,
                to_u256(order.src_amount),
                to_u256(order.safety_deposit.src),
                self.resolver_address(),
            ),
            EscrowSide::Dst => (
                &order.dst_token,
                to_u256(order.dst_amount),
                to_u256(order.safety_deposit.dst),
                Address::from_str(&order.maker)
                    .map_err(|e| SwapError::Validation(format!("maker address: {e}")))?,
            ),
        };

        let (client, guard) = self.signer_for(side, Op::Lock);

        // Native detection is a pure sentinel comparison.
        let is_native = token_id.is_native(self.chain);
        let (token_address, value) = if is_native {
            (Address::zero(), amount + deposit)
        } else {
            let token_address = Address::from_str(token_id.as_str())
                .map_err(|e| SwapError::Validation(format!("token address: {e}")))?;
            self.approve_token(client, guard, token_address, amount).await?;
            (token_address, deposit)
        };

        let schedule_word = timelocks::pack_timelocks(&order.timelock, 0);
        let data = calldata::create_escrow_call(
            escrow_id,
            order.secret_hash,
            receiver,
            token_address,
            amount,
            deposit,
            schedule_word,
        );

        info!(order_id = %order.order_id, %side, chain = %self.chain, native = is_native, "locking escrow");
        let receipt = self
            .send_and_confirm(client, guard, data, value, "createEscrow")
            .await?;

        let emitted_id = self.extract_escrow_id(&receipt)?;
        if emitted_id != escrow_id {
            return Err(SwapError::IntegrityViolation(format!(
                "contract emitted escrow id {} for derivation {}",
                hex::encode(emitted_id),
                hex::encode(escrow_id)
            )));
        }

        let deploy_time = self.receipt_timestamp(&receipt).await?;
        let tx_hash = format!("{:#x}", receipt.transaction_hash);

        Ok(EscrowRecord {
            side,
            chain: self.chain,
            address: self.escrow_locator(escrow_id),
            secret_hash: order.secret_hash,
            deploy_time,
            explorer_url: self.config.explorer_url(&tx_hash),
            tx_hash,
            status: EscrowStatus::Locked,
        })
    }

    async fn claim(
        &self,
        escrow: &EscrowRecord,
        secret: &SecretBytes,
    ) -> Result<TxReceipt, SwapError> {
        // Local hash check first; a bad pre-image never reaches the wire.
        precheck_claim(escrow, secret)?;

        let (_, escrow_id) = parse_escrow_locator(&escrow.address)?;
        let data = calldata::claim_call(escrow_id, secret.expose());

        let (client, guard) = self.signer_for(escrow.side, Op::Claim);
        info!(escrow = %escrow.address, side = %escrow.side, "claiming escrow");
        let receipt = self
            .send_and_confirm(client, guard, data, U256::zero(), "claim")
            .await?;
        Ok(self.receipt_of(receipt.transaction_hash))
    }

    async fn refund(
        &self,
        escrow: &EscrowRecord,
        timelock: &TimelockSchedule,
    ) -> Result<TxReceipt, SwapError> {
        let chain_now = self.block_timestamp().await?;
        precheck_refund(escrow, timelock, chain_now)?;

        let (_, escrow_id) = parse_escrow_locator(&escrow.address)?;
        let data = calldata::refund_call(escrow_id);

        let (client, guard) = self.signer_for(escrow.side, Op::Refund);
        warn!(escrow = %escrow.address, side = %escrow.side, "refunding escrow");
        let receipt = self
            .send_and_confirm(client, guard, data, U256::zero(), "refund")
            .await?;
        Ok(self.receipt_of(receipt.transaction_hash))
    }

    async fn balance(&self, address: &str, token: &TokenId) -> Result<Amount, SwapError> {
        let owner = Address::from_str(address)
            .map_err(|e| SwapError::Validation(format!("address: {e}")))?;

        if token.is_native(self.chain) {
            let balance = with_deadline("get_balance", self.provider.get_balance(owner, None))
                .await?
                .map_err(|e| SwapError::ChainUnavailable(format!("get_balance: {e}")))?;
            return Ok(from_u256(balance));
        }

        let token_address = Address::from_str(token.as_str())
            .map_err(|e| SwapError::Validation(format!("token address: {e}")))?;
        let typed: TypedTransaction = TransactionRequest::new()
            .to(token_address)
            .data(Bytes::from(calldata::balance_of_call(owner)))
            .into();
        let raw = with_deadline("balanceOf", self.provider.call(&typed, None))
            .await?
            .map_err(|e| SwapError::ChainUnavailable(format!("balanceOf: {e}")))?;

        if raw.len() < 32 {
            return Err(SwapError::ChainUnavailable("balanceOf: short return".into()));
        }
        Ok(Amount::from_big_endian(&raw[..32]))
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        let block = with_deadline(
            "latest_block",
            self.provider.get_block(BlockNumber::Latest),
        )
        .await?
        .map_err(|e| SwapError::ChainUnavailable(format!("latest_block: {e}")))?
        .ok_or_else(|| SwapError::ChainUnavailable("no latest block".into()))?;
        Ok(block.timestamp.as_u64())
    }

    async fn get_escrow_by_order_id(
        &self,
        order_id: OrderId,
        side: EscrowSide,
    ) -> Result<Option<EscrowRecord>, SwapError> {
        let escrow_id = derive_escrow_id(order_id, side);
        let view = match self.view_escrow(escrow_id).await? {
            Some(view) => view,
            None => return Ok(None),
        };

        let status = match view.status {
            0 => EscrowStatus::Locked,
            1 => EscrowStatus::Claimed,
            2 => EscrowStatus::Refunded,
            other => {
                return Err(SwapError::IntegrityViolation(format!(
                    "escrow status ordinal {other} out of range"
                )))
            }
        };

        // Receipt material is unavailable through the view path; the
        // record carries the locator and timestamps, which is what the
        // orchestrator needs to continue.
        Ok(Some(EscrowRecord {
            side,
            chain: self.chain,
            address: self.escrow_locator(escrow_id),
            secret_hash: view.secret_hash,
            deploy_time: view.deployed_at,
            tx_hash: String::new(),
            explorer_url: None,
            status,
        }))
    }
}

fn parse_wallet(key: &str, chain_num: u64) -> Result<LocalWallet, SwapError> {
    let wallet: LocalWallet = key
        .trim_start_matches("0x")
        .parse()
        .map_err(|e| SwapError::Validation(format!("bad signer key: {e}")))?;
    Ok(wallet.with_chain_id(chain_num))
}

/// Split a `contract:escrow_id` locator back into its halves.
pub fn parse_escrow_locator(address: &str) -> Result<(Address, [u8; 32]), SwapError> {
    let (contract_str, id_str) = address.rsplit_once(':').ok_or_else(|| {
        SwapError::Validation(format!("bad escrow locator: {address}"))
    })?;
    let contract = Address::from_str(contract_str)
        .map_err(|e| SwapError::Validation(format!("bad escrow contract: {e}")))?;
    let raw = hex::decode(id_str)
        .map_err(|e| SwapError::Validation(format!("bad escrow id: {e}")))?;
    let escrow_id: [u8; 32] = raw
        .try_into()
        .map_err(|_| SwapError::Validation("escrow id must be 32 bytes".into()))?;
    Ok((contract, escrow_id))
}

/// Wrap an RPC future in the adapter's call deadline.
async fn with_deadline<F, T>(op: &str, fut: F) -> Result<T, SwapError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(CALL_TIMEOUT, fut)
        .await
        .map_err(|_| SwapError::Timeout(format!("{op}: call deadline exceeded")))
}

/// Classify a send-path error string into the taxonomy.
fn map_send_error(op: &str, message: &str) -> SwapError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds") {
        SwapError::InsufficientFunds
    } else if lower.contains("revert") || lower.contains("execution reverted") {
        SwapError::ContractReverted(format!("{op}: {message}"))
    } else {
        SwapError::ChainUnavailable(format!("{op}: {message}"))
    }
}

fn to_u256(amount: Amount) -> U256 {
    let mut buf = [0u8; 32];
    amount.to_big_endian(&mut buf);
    U256::from_big_endian(&buf)
}

fn from_u256(value: U256) -> Amount {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    Amount::from_big_endian(&buf)
}
