//! Types for ledger RPC integration

use serde::{Deserialize, Serialize};

/// Commitment level a signature has reached on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
	/// Seen by the node, not yet voted on.
	Processed,
	/// Voted on by a supermajority.
	Confirmed,
	/// Rooted; will not be rolled back.
	Finalized,
}

impl Confirmation {
	/// Parse the `confirmationStatus` string the RPC reports.
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"processed" => Some(Self::Processed),
			"confirmed" => Some(Self::Confirmed),
			"finalized" => Some(Self::Finalized),
			_ => None,
		}
	}
}

/// Status of a submitted signature as reported by the cluster.
#[derive(Debug, Clone)]
pub struct SignatureStatus {
	/// Commitment level reached so far.
	pub confirmation: Confirmation,
	/// Execution error recorded on the ledger, if the transaction landed
	/// but failed. Kept as raw JSON; classification happens at the
	/// operation boundary.
	pub err: Option<serde_json::Value>,
}

impl SignatureStatus {
	/// Whether the signature has reached the target commitment.
	pub fn is_confirmed(&self) -> bool {
		matches!(
			self.confirmation,
			Confirmation::Confirmed | Confirmation::Finalized
		)
	}
}

/// Error types for ledger RPC operations
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("RPC error {code}: {message}")]
	RpcFailure {
		code: i64,
		message: String,
		data: Option<serde_json::Value>,
	},

	#[error("no result in RPC response")]
	NoData,

	#[error("malformed RPC response: {0}")]
	Malformed(String),
}
