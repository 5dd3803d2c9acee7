//!
//! Transaction submission and confirmation.
//!
//! Provides a sender for handing signed transactions to the ledger and
//! watching them to the target commitment, plus the classification of
//! submission and execution failures into the operation error taxonomy.

use crate::ledger::{LedgerClient, RpcError};
use crate::transaction::{OperationError, ProgramRejection};

use serde_json::Value;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cadence of signature-status polling while confirming.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Submits signed transactions and waits for confirmation.
pub struct TransactionSender {
    ledger: Arc<dyn LedgerClient>,
    confirm_timeout: Duration,
}

impl TransactionSender {
    /// Creates a sender confirming against `ledger` within `confirm_timeout`
    pub fn new(ledger: Arc<dyn LedgerClient>, confirm_timeout: Duration) -> Self {
        Self {
            ledger,
            confirm_timeout,
        }
    }

    /// Submit a fully signed transaction.
    ///
    /// Never retries: a stale recency token is surfaced as
    /// [`OperationError::StaleRecencyToken`] and the caller retries through
    /// a fresh blockhash, which naturally invalidates any duplicate copy
    /// still in flight.
    pub async fn submit(&self, transaction: &Transaction) -> Result<Signature, OperationError> {
        debug!("SENDING");
        let signature = self
            .ledger
            .send_transaction(transaction)
            .await
            .map_err(classify_send_error)?;
        debug!("SENT {}", signature);
        Ok(signature)
    }

    /// Block until `signature` reaches the target commitment or the
    /// timeout elapses.
    ///
    /// The wait is bounded; on expiry the result is a `Network` failure
    /// with the attempt's outcome unknown, never an indefinite hang.
    pub async fn confirm(&self, signature: &Signature) -> Result<(), OperationError> {
        let deadline = Instant::now() + self.confirm_timeout;

        loop {
            match self.ledger.signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        warn!("Transaction {} failed on the ledger: {}", signature, err);
                        return Err(classify_execution_error(err));
                    }
                    if status.is_confirmed() {
                        info!("Transaction {} confirmed", signature);
                        return Ok(());
                    }
                    debug!("Transaction {} at {:?}", signature, status.confirmation);
                }
                Ok(None) => {
                    debug!("Transaction {} not yet observed", signature);
                }
                Err(e) => {
                    // Transient status-poll failures do not fail the wait;
                    // the deadline bounds them.
                    warn!("Status poll failed for {}: {}", signature, e);
                }
            }

            if Instant::now() >= deadline {
                return Err(OperationError::Network(format!(
                    "confirmation timed out after {:?}",
                    self.confirm_timeout
                )));
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }
}

/// Classify a submission failure.
pub fn classify_send_error(error: RpcError) -> OperationError {
    match error {
        RpcError::RpcFailure {
            message, data, ..
        } => {
            if message.contains("already been processed") || message.contains("Blockhash not found")
            {
                return OperationError::StaleRecencyToken;
            }
            if let Some(err) = data.as_ref().and_then(|d| d.get("err")) {
                if !err.is_null() {
                    return classify_execution_error(err);
                }
            }
            OperationError::Network(message)
        }
        other => OperationError::Network(other.to_string()),
    }
}

/// Classify an execution error recorded for a landed (or simulated)
/// transaction.
pub fn classify_execution_error(err: &Value) -> OperationError {
    match custom_error_code(err) {
        Some(code) => OperationError::ProgramRejected(ProgramRejection::from_code(code)),
        None => OperationError::ProgramRejected(ProgramRejection::Other(err.to_string())),
    }
}

/// Extract the custom program error code from an
/// `{"InstructionError": [index, {"Custom": code}]}` value.
fn custom_error_code(err: &Value) -> Option<u64> {
    err.get("InstructionError")?
        .as_array()?
        .get(1)?
        .get("Custom")?
        .as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn already_processed_reads_as_stale_token() {
        let error = RpcError::RpcFailure {
            code: -32002,
            message: "Transaction simulation failed: This transaction has already been processed"
                .to_string(),
            data: None,
        };
        assert!(matches!(
            classify_send_error(error),
            OperationError::StaleRecencyToken
        ));
    }

    #[test]
    fn missing_blockhash_reads_as_stale_token() {
        let error = RpcError::RpcFailure {
            code: -32002,
            message: "Transaction simulation failed: Blockhash not found".to_string(),
            data: None,
        };
        assert!(matches!(
            classify_send_error(error),
            OperationError::StaleRecencyToken
        ));
    }

    #[test]
    fn custom_codes_map_to_the_program_taxonomy() {
        let cases = [
            (6000, ProgramRejection::AmountMustBePositive),
            (6001, ProgramRejection::InsufficientStakedAmount),
            (6002, ProgramRejection::Unauthorized),
            (6003, ProgramRejection::Overflow),
            (6004, ProgramRejection::Underflow),
            (6005, ProgramRejection::InvalidTimestamp),
        ];
        for (code, expected) in cases {
            let err = json!({"InstructionError": [0, {"Custom": code}]});
            match classify_execution_error(&err) {
                OperationError::ProgramRejected(rejection) => assert_eq!(rejection, expected),
                other => panic!("expected program rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_codes_are_carried_not_dropped() {
        let err = json!({"InstructionError": [0, {"Custom": 6042}]});
        assert!(matches!(
            classify_execution_error(&err),
            OperationError::ProgramRejected(ProgramRejection::Other(_))
        ));
    }

    #[test]
    fn send_failure_with_embedded_execution_error_is_a_rejection() {
        let error = RpcError::RpcFailure {
            code: -32002,
            message: "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1771"
                .to_string(),
            data: Some(json!({"err": {"InstructionError": [0, {"Custom": 6001}]}, "logs": []})),
        };
        assert!(matches!(
            classify_send_error(error),
            OperationError::ProgramRejected(ProgramRejection::InsufficientStakedAmount)
        ));
    }

    #[test]
    fn transport_failures_stay_network() {
        let error = RpcError::RpcFailure {
            code: -32005,
            message: "Node is behind".to_string(),
            data: None,
        };
        assert!(matches!(
            classify_send_error(error),
            OperationError::Network(_)
        ));
    }
}
