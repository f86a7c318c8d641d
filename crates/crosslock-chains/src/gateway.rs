//! # Gateway Transport
//!
//! JSON-RPC client shared by the Move, Soroban, and TVM adapters.
//! Every call carries a finite deadline; on expiry the caller receives
//! `Timeout` and treats the outcome as indeterminate.

use crosslock_types::SwapError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC 2.0 client over HTTP.
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl GatewayClient {
    /// Client for `base_url` with the default call deadline.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SwapError> {
        Self::with_timeout(base_url, DEFAULT_CALL_TIMEOUT)
    }

    /// Client with an explicit per-call deadline.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SwapError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::ChainUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC call and return the `result` value.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, SwapError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(url = %self.base_url, method, "gateway call");

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(method, e))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SwapError::ChainUnavailable(format!("{method}: bad response: {e}")))?;

        if let Some(err) = payload.get("error") {
            return Err(map_rpc_error(method, err));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| SwapError::ChainUnavailable(format!("{method}: missing result")))
    }
}

fn map_transport_error(method: &str, err: reqwest::Error) -> SwapError {
    if err.is_timeout() {
        SwapError::Timeout(format!("{method}: call deadline exceeded"))
    } else {
        SwapError::ChainUnavailable(format!("{method}: {err}"))
    }
}

/// JSON-RPC error object → taxonomy. Execution failures are
/// deterministic rejections; everything else is transport.
fn map_rpc_error(method: &str, err: &Value) -> SwapError {
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);

    // Server-defined execution errors sit at -32000 and below; the
    // fixed protocol errors (-32600..-32700) mean our request never
    // executed.
    if (-32099..=-32000).contains(&code) {
        if message.to_ascii_lowercase().contains("insufficient") {
            SwapError::InsufficientFunds
        } else {
            SwapError::ContractReverted(format!("{method}: {message}"))
        }
    } else {
        SwapError::ChainUnavailable(format!("{method}: rpc error {code}: {message}"))
    }
}

/// Field access helpers for gateway responses.
pub mod fields {
    use super::*;

    /// Required string field.
    pub fn str_field(value: &Value, key: &str) -> Result<String, SwapError> {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SwapError::ReceiptIndeterminate(format!("missing field `{key}`")))
    }

    /// Required u64 field, accepting number or decimal string.
    pub fn u64_field(value: &Value, key: &str) -> Result<u64, SwapError> {
        let field = value
            .get(key)
            .ok_or_else(|| SwapError::ReceiptIndeterminate(format!("missing field `{key}`")))?;
        match field {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| SwapError::ReceiptIndeterminate(format!("field `{key}` not u64"))),
            Value::String(s) => s
                .parse::<u64>()
                .map_err(|_| SwapError::ReceiptIndeterminate(format!("field `{key}` not u64"))),
            _ => Err(SwapError::ReceiptIndeterminate(format!(
                "field `{key}` has wrong type"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_mapping_execution() {
        let err = json!({"code": -32000, "message": "execution failed: bad-amount"});
        assert!(matches!(
            map_rpc_error("lock", &err),
            SwapError::ContractReverted(_)
        ));
    }

    #[test]
    fn test_rpc_error_mapping_insufficient() {
        let err = json!({"code": -32000, "message": "insufficient balance for transfer"});
        assert!(matches!(
            map_rpc_error("lock", &err),
            SwapError::InsufficientFunds
        ));
    }

    #[test]
    fn test_rpc_error_mapping_protocol() {
        let err = json!({"code": -32601, "message": "method not found"});
        assert!(matches!(
            map_rpc_error("lock", &err),
            SwapError::ChainUnavailable(_)
        ));
    }

    #[test]
    fn test_field_helpers() {
        let value = json!({"tx": "0xabc", "time": 42, "time_str": "43"});
        assert_eq!(fields::str_field(&value, "tx").unwrap(), "0xabc");
        assert_eq!(fields::u64_field(&value, "time").unwrap(), 42);
        assert_eq!(fields::u64_field(&value, "time_str").unwrap(), 43);
        assert!(fields::str_field(&value, "missing").is_err());
    }
}
