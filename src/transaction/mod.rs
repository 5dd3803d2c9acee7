/// Instruction builders for the staking program and the payout transfer
pub mod builder;
/// Custodial payout signer
pub mod custodian;
/// Per-operation state machine
pub mod orchestrator;
/// Submission, confirmation and error classification
pub mod sender;

pub use custodian::CustodialSigner;
pub use orchestrator::{ClaimOutcome, OperationPhase, TransactionOrchestrator};

/// Number of decimal places of the staked currency.
pub const TOKEN_DECIMALS: u32 = 9;

/// Points consumed per whole unit of payout currency.
pub const POINTS_PER_UNIT: u64 = 100_000;

/// Claimable points below this are rejected before anything is built.
pub const MIN_CLAIM_POINTS: u64 = 50_000;

/// Business-rule rejection reported by the remote program, mapped 1:1
/// from its custom error codes. Not retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramRejection {
	#[error("amount must be greater than zero")]
	AmountMustBePositive,

	#[error("unstake amount exceeds the staked balance")]
	InsufficientStakedAmount,

	#[error("signer is not the position owner")]
	Unauthorized,

	#[error("arithmetic overflow on the ledger")]
	Overflow,

	#[error("arithmetic underflow on the ledger")]
	Underflow,

	#[error("ledger clock produced an invalid timestamp")]
	InvalidTimestamp,

	#[error("program error: {0}")]
	Other(String),
}

impl ProgramRejection {
	/// Map a custom program error code to its rejection.
	pub fn from_code(code: u64) -> Self {
		match code {
			6000 => Self::AmountMustBePositive,
			6001 => Self::InsufficientStakedAmount,
			6002 => Self::Unauthorized,
			6003 => Self::Overflow,
			6004 => Self::Underflow,
			6005 => Self::InvalidTimestamp,
			other => Self::Other(format!("custom program error {other}")),
		}
	}
}

/// Failure of one orchestrated operation.
///
/// Every remote call site converts its faults into one of these; a failed
/// operation never corrupts the published snapshot, which is only replaced
/// by a successful read.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
	/// Rejected locally before any network call.
	#[error("validation failed: {0}")]
	Validation(String),

	/// Another operation is between BUILDING and CONFIRMING; wait for it.
	#[error("another operation is in flight, please wait")]
	OperationInFlight,

	/// The recency token went stale before the node saw the transaction.
	/// Retrying is safe; a fresh token is fetched on every attempt.
	#[error("recency token went stale; retry to resubmit with a fresh one")]
	StaleRecencyToken,

	#[error("remote program rejected the operation: {0}")]
	ProgramRejected(ProgramRejection),

	/// Transport or timeout failure. Safe to retry, but the outcome of
	/// this attempt is unknown to the caller.
	#[error("network failure: {0}")]
	Network(String),

	#[error("signer declined: {0}")]
	UserRejected(String),

	#[error("claimable points {points} are below the minimum claim of {minimum}")]
	BelowMinimumClaim { points: u64, minimum: u64 },

	#[error("claimable points {points} would pay out zero whole units")]
	BelowClaimThreshold { points: u64 },

	/// Points were consumed on the ledger but the payout transfer did not
	/// complete. Surfaced distinctly so the holder can be compensated out
	/// of band; never folded into `Network`.
	#[error("points were claimed but the payout failed: {0}")]
	PayoutAfterClaimFailed(String),
}
