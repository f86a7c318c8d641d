//! # ABI Calldata
//!
//! Selector and argument encoding for the HTLC escrow contract and the
//! ERC-20 surface the token branch needs. Function signatures are kept
//! inline; the contract ABI is small enough that generated bindings
//! would be noise.

use crosslock_types::SwapError;
use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Address, U256};
use sha3::{Digest, Keccak256};

/// HTLC escrow entrypoints.
pub const SIG_CREATE_ESCROW: &str =
    "createEscrow(bytes32,bytes32,address,address,uint256,uint256,uint256)";
pub const SIG_CLAIM: &str = "claim(bytes32,bytes32)";
pub const SIG_REFUND: &str = "refund(bytes32)";
pub const SIG_GET_ESCROW: &str = "getEscrow(bytes32)";

/// ERC-20 surface for the token branch.
pub const SIG_APPROVE: &str = "approve(address,uint256)";
pub const SIG_BALANCE_OF: &str = "balanceOf(address)";

/// `EscrowCreated(bytes32 indexed escrowId, bytes32 secretHash,
/// address receiver)` — escrow id sits at topic index 1.
pub const SIG_EVENT_ESCROW_CREATED: &str = "EscrowCreated(bytes32,bytes32,address)";

/// 4-byte selector of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// keccak-256 of an event signature (topic 0).
pub fn event_topic(signature: &str) -> [u8; 32] {
    Keccak256::digest(signature.as_bytes()).into()
}

/// Selector plus ABI-encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(ethers::abi::encode(args));
    data
}

/// `createEscrow` calldata.
#[allow(clippy::too_many_arguments)]
pub fn create_escrow_call(
    escrow_id: [u8; 32],
    secret_hash: [u8; 32],
    receiver: Address,
    token: Address,
    amount: U256,
    safety_deposit: U256,
    packed_timelocks: U256,
) -> Vec<u8> {
    encode_call(
        SIG_CREATE_ESCROW,
        &[
            Token::FixedBytes(escrow_id.to_vec()),
            Token::FixedBytes(secret_hash.to_vec()),
            Token::Address(receiver),
            Token::Address(token),
            Token::Uint(amount),
            Token::Uint(safety_deposit),
            Token::Uint(packed_timelocks),
        ],
    )
}

/// `claim` calldata.
pub fn claim_call(escrow_id: [u8; 32], secret: [u8; 32]) -> Vec<u8> {
    encode_call(
        SIG_CLAIM,
        &[
            Token::FixedBytes(escrow_id.to_vec()),
            Token::FixedBytes(secret.to_vec()),
        ],
    )
}

/// `refund` calldata.
pub fn refund_call(escrow_id: [u8; 32]) -> Vec<u8> {
    encode_call(SIG_REFUND, &[Token::FixedBytes(escrow_id.to_vec())])
}

/// `getEscrow` calldata.
pub fn get_escrow_call(escrow_id: [u8; 32]) -> Vec<u8> {
    encode_call(SIG_GET_ESCROW, &[Token::FixedBytes(escrow_id.to_vec())])
}

/// `approve` calldata.
pub fn approve_call(spender: Address, amount: U256) -> Vec<u8> {
    encode_call(
        SIG_APPROVE,
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

/// `balanceOf` calldata.
pub fn balance_of_call(owner: Address) -> Vec<u8> {
    encode_call(SIG_BALANCE_OF, &[Token::Address(owner)])
}

/// Decoded view of an on-chain escrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowView {
    /// Committed hashlock.
    pub secret_hash: [u8; 32],
    /// Receiver encoded at lock time.
    pub receiver: Address,
    /// Locked token (zero address for native).
    pub token: Address,
    /// Locked amount.
    pub amount: U256,
    /// Block timestamp of the lock; zero means "no such escrow".
    pub deployed_at: u64,
    /// Contract-side status ordinal (0 locked, 1 claimed, 2 refunded).
    pub status: u8,
}

/// Decode the `getEscrow` return tuple.
pub fn decode_escrow_view(data: &[u8]) -> Result<EscrowView, SwapError> {
    let tokens = decode(
        &[
            ParamType::FixedBytes(32),
            ParamType::Address,
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(8),
        ],
        data,
    )
    .map_err(|e| SwapError::ReceiptIndeterminate(format!("getEscrow decode: {e}")))?;

    let mut iter = tokens.into_iter();
    let secret_hash = match iter.next() {
        Some(Token::FixedBytes(b)) if b.len() == 32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(&b);
            out
        }
        _ => return Err(SwapError::ReceiptIndeterminate("bad secretHash".into())),
    };
    let receiver = match iter.next() {
        Some(Token::Address(a)) => a,
        _ => return Err(SwapError::ReceiptIndeterminate("bad receiver".into())),
    };
    let token = match iter.next() {
        Some(Token::Address(a)) => a,
        _ => return Err(SwapError::ReceiptIndeterminate("bad token".into())),
    };
    let amount = match iter.next() {
        Some(Token::Uint(u)) => u,
        _ => return Err(SwapError::ReceiptIndeterminate("bad amount".into())),
    };
    let deployed_at = match iter.next() {
        Some(Token::Uint(u)) => u.as_u64(),
        _ => return Err(SwapError::ReceiptIndeterminate("bad deployedAt".into())),
    };
    let status = match iter.next() {
        Some(Token::Uint(u)) => u.as_u64() as u8,
        _ => return Err(SwapError::ReceiptIndeterminate("bad status".into())),
    };

    Ok(EscrowView {
        secret_hash,
        receiver,
        token,
        amount,
        deployed_at,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_known_value() {
        // keccak("transfer(address,uint256)")[0..4] == a9059cbb — the
        // canonical check that our selector path is real keccak.
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_calldata_layout() {
        let data = claim_call([1u8; 32], [2u8; 32]);
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[0..4], &selector(SIG_CLAIM));
        assert_eq!(&data[4..36], &[1u8; 32]);
        assert_eq!(&data[36..68], &[2u8; 32]);
    }

    #[test]
    fn test_escrow_view_round_trip() {
        let encoded = ethers::abi::encode(&[
            Token::FixedBytes(vec![7u8; 32]),
            Token::Address(Address::from_low_u64_be(0xBEEF)),
            Token::Address(Address::zero()),
            Token::Uint(U256::from(1_000u64)),
            Token::Uint(U256::from(1_700_000_000u64)),
            Token::Uint(U256::from(1u8)),
        ]);
        let view = decode_escrow_view(&encoded).unwrap();
        assert_eq!(view.secret_hash, [7u8; 32]);
        assert_eq!(view.receiver, Address::from_low_u64_be(0xBEEF));
        assert_eq!(view.token, Address::zero());
        assert_eq!(view.amount, U256::from(1_000u64));
        assert_eq!(view.deployed_at, 1_700_000_000);
        assert_eq!(view.status, 1);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_escrow_view(&[0u8; 7]).is_err());
    }

    #[test]
    fn test_event_topic_stable() {
        let topic = event_topic(SIG_EVENT_ESCROW_CREATED);
        assert_eq!(topic, event_topic(SIG_EVENT_ESCROW_CREATED));
        assert_ne!(topic, [0u8; 32]);
    }
}
