//!
//! JSON-RPC client for the Solana ledger.
//!
//! This module provides an async client for the subset of the cluster RPC
//! the engine needs: account reads, balance reads, recency tokens,
//! transaction submission and signature status. Read paths retry transient
//! transport failures; submission never does.

use super::types::*;
use super::LedgerClient;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Live Solana JSON-RPC ledger client
#[derive(Clone)]
pub struct RpcLedgerClient {
	/// The underlying HTTP client for JSON-RPC requests.
	http_client: Client,
	/// The cluster RPC endpoint.
	rpc_url: String,
}

impl RpcLedgerClient {
	/// Create a new ledger client.
	///
	/// # Arguments
	/// * `rpc_url` - The HTTP endpoint of the cluster RPC node.
	pub fn new(rpc_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			rpc_url,
		}
	}

	/// Execute a single JSON-RPC call.
	///
	/// # Arguments
	/// * `method` - The RPC method name.
	/// * `params` - Positional parameters for the method.
	///
	/// # Returns
	/// The `result` member of the response, or an `RpcError` carrying the
	/// response's `error` member when the node rejected the call.
	async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params,
		});

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(RpcError::Malformed(format!(
				"HTTP error: {}",
				response.status()
			)));
		}

		let response_json: Value = response.json().await?;

		if let Some(error) = response_json.get("error") {
			return Err(RpcError::RpcFailure {
				code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
				message: error
					.get("message")
					.and_then(Value::as_str)
					.unwrap_or("unknown RPC error")
					.to_string(),
				data: error.get("data").cloned(),
			});
		}

		response_json
			.get("result")
			.cloned()
			.ok_or(RpcError::NoData)
	}

	/// Execute a read-only call, retrying transient transport failures.
	///
	/// Node-side rejections are permanent; only HTTP-level failures are
	/// retried, bounded by [`read_backoff`].
	async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, RpcError> {
		retry(read_backoff(), || async {
			self.call(method, params.clone()).await.map_err(|e| match e {
				RpcError::HttpError(_) => {
					debug!("Transient RPC transport failure on {}: retrying", method);
					backoff::Error::transient(e)
				}
				other => backoff::Error::permanent(other),
			})
		})
		.await
	}
}

/// Retry policy for read-path RPC calls.
fn read_backoff() -> ExponentialBackoff {
	ExponentialBackoff {
		max_elapsed_time: Some(Duration::from_secs(10)),
		..ExponentialBackoff::default()
	}
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
	async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
		let result = self
			.call_with_retry(
				"getAccountInfo",
				json!([
					address.to_string(),
					{"encoding": "base64", "commitment": "confirmed"},
				]),
			)
			.await?;

		let value = result.get("value").ok_or(RpcError::NoData)?;
		if value.is_null() {
			return Ok(None);
		}

		let encoded = value
			.get("data")
			.and_then(|data| data.get(0))
			.and_then(Value::as_str)
			.ok_or_else(|| RpcError::Malformed("account data missing from response".to_string()))?;

		let bytes = BASE64
			.decode(encoded)
			.map_err(|e| RpcError::Malformed(format!("account data is not base64: {e}")))?;

		Ok(Some(bytes))
	}

	async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
		let result = self
			.call_with_retry(
				"getBalance",
				json!([address.to_string(), {"commitment": "confirmed"}]),
			)
			.await?;

		result
			.get("value")
			.and_then(Value::as_u64)
			.ok_or_else(|| RpcError::Malformed("balance missing from response".to_string()))
	}

	async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
		let result = self
			.call("getLatestBlockhash", json!([{"commitment": "confirmed"}]))
			.await?;

		let blockhash = result
			.get("value")
			.and_then(|value| value.get("blockhash"))
			.and_then(Value::as_str)
			.ok_or_else(|| RpcError::Malformed("blockhash missing from response".to_string()))?;

		Hash::from_str(blockhash)
			.map_err(|e| RpcError::Malformed(format!("blockhash not parseable: {e}")))
	}

	async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
		let wire = bincode::serialize(transaction)
			.map_err(|e| RpcError::Malformed(format!("transaction not serializable: {e}")))?;

		debug!("Submitting {} byte transaction", wire.len());

		let result = self
			.call(
				"sendTransaction",
				json!([BASE64.encode(wire), {"encoding": "base64"}]),
			)
			.await?;

		let signature = result
			.as_str()
			.ok_or_else(|| RpcError::Malformed("signature missing from response".to_string()))?;

		Signature::from_str(signature)
			.map_err(|e| RpcError::Malformed(format!("signature not parseable: {e}")))
	}

	async fn signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, RpcError> {
		let result = self
			.call_with_retry(
				"getSignatureStatuses",
				json!([[signature.to_string()], {"searchTransactionHistory": false}]),
			)
			.await?;

		let status = result
			.get("value")
			.and_then(|value| value.get(0))
			.ok_or(RpcError::NoData)?;

		if status.is_null() {
			return Ok(None);
		}

		let confirmation = status
			.get("confirmationStatus")
			.and_then(Value::as_str)
			.and_then(Confirmation::parse)
			.unwrap_or(Confirmation::Processed);

		let err = match status.get("err") {
			None | Some(Value::Null) => None,
			Some(err) => Some(err.clone()),
		};

		Ok(Some(SignatureStatus { confirmation, err }))
	}
}
