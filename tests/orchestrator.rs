//! Integration tests for the transaction orchestrator against the
//! in-memory ledger.

mod common;

use common::{harness, harness_without_custodian, LEDGER_EPOCH, ONE_TOKEN};
use solana_stake_sync::transaction::{OperationError, OperationPhase, MIN_CLAIM_POINTS};
use std::time::Duration;

#[tokio::test]
async fn stake_initializes_the_position_first() {
    let h = harness();
    h.ledger.credit(&h.owner(), 5 * ONE_TOKEN);

    let snapshot = h.snapshot().await;
    assert!(snapshot.position.is_none());

    h.orchestrator
        .stake(&snapshot, 2 * ONE_TOKEN)
        .await
        .expect("stake should initialize and then stake");

    let position = h.ledger.position(&h.owner()).expect("position created");
    assert_eq!(position.owner, h.owner());
    assert_eq!(position.staked_amount, 2 * ONE_TOKEN);
    assert_eq!(position.total_points, 0);
    assert_eq!(position.last_updated_time, LEDGER_EPOCH);

    // The staked lamports moved out of the wallet.
    assert_eq!(h.ledger.lamports(&h.owner()), 3 * ONE_TOKEN);
    assert_eq!(*h.orchestrator.phase().borrow(), OperationPhase::Confirmed);
}

#[tokio::test]
async fn stake_checkpoints_accrued_points_on_the_ledger() {
    let h = harness();
    h.ledger.credit(&h.owner(), 5 * ONE_TOKEN);
    // Ten tokens staked for one ledger-day before the new stake lands.
    h.ledger
        .seed_position(&h.owner(), 10 * ONE_TOKEN, 0, LEDGER_EPOCH - 86_400);

    let snapshot = h.snapshot().await;
    h.orchestrator
        .stake(&snapshot, ONE_TOKEN)
        .await
        .expect("stake on existing position");

    let position = h.ledger.position(&h.owner()).unwrap();
    assert_eq!(position.staked_amount, 11 * ONE_TOKEN);
    assert_eq!(position.total_points, 864_000);
    assert_eq!(position.last_updated_time, LEDGER_EPOCH);
}

#[tokio::test]
async fn zero_stake_is_rejected_without_any_network_call() {
    let h = harness();
    h.ledger.credit(&h.owner(), ONE_TOKEN);
    let snapshot = h.snapshot().await;

    let before = h.ledger.network_ops();
    let err = h.orchestrator.stake(&snapshot, 0).await.unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
    assert_eq!(h.ledger.network_ops(), before);
}

#[tokio::test]
async fn stake_exceeding_balance_plus_fee_buffer_is_rejected_locally() {
    let h = harness();
    h.ledger.credit(&h.owner(), ONE_TOKEN);
    let snapshot = h.snapshot().await;

    let before = h.ledger.network_ops();
    // Exactly the balance fails: the fee buffer must still be covered.
    let err = h.orchestrator.stake(&snapshot, ONE_TOKEN).await.unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
    assert_eq!(h.ledger.network_ops(), before);
}

#[tokio::test]
async fn unstake_returns_lamports_to_the_wallet() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 5 * ONE_TOKEN, 0, LEDGER_EPOCH);

    let snapshot = h.snapshot().await;
    h.orchestrator
        .unstake(&snapshot, 2 * ONE_TOKEN)
        .await
        .expect("unstake within staked balance");

    let position = h.ledger.position(&h.owner()).unwrap();
    assert_eq!(position.staked_amount, 3 * ONE_TOKEN);
    assert_eq!(h.ledger.lamports(&h.owner()), 2 * ONE_TOKEN);
}

#[tokio::test]
async fn unstake_exceeding_staked_amount_is_rejected_locally() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 5 * ONE_TOKEN, 0, LEDGER_EPOCH);

    let snapshot = h.snapshot().await;
    let before = h.ledger.network_ops();
    let err = h
        .orchestrator
        .unstake(&snapshot, 6 * ONE_TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
    assert_eq!(h.ledger.network_ops(), before);
}

#[tokio::test]
async fn unstake_without_a_position_is_rejected_locally() {
    let h = harness();
    let snapshot = h.snapshot().await;
    let err = h.orchestrator.unstake(&snapshot, 1).await.unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
}

#[tokio::test]
async fn initialize_twice_is_rejected_locally() {
    let h = harness();
    h.ledger.seed_position(&h.owner(), 0, 0, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;
    let err = h.orchestrator.initialize(&snapshot).await.unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
}

#[tokio::test]
async fn claim_below_the_minimum_is_rejected_before_any_call() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 0, MIN_CLAIM_POINTS - 1, LEDGER_EPOCH);

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.claimable_points, 49_999);

    let before = h.ledger.network_ops();
    let err = h.orchestrator.claim(&snapshot).await.unwrap_err();
    assert!(matches!(
        err,
        OperationError::BelowMinimumClaim {
            points: 49_999,
            minimum: MIN_CLAIM_POINTS
        }
    ));
    assert_eq!(h.ledger.network_ops(), before);
}

#[tokio::test]
async fn claim_that_would_pay_zero_whole_units_is_rejected_distinctly() {
    // 60 000 points clear the minimum gate but floor to zero whole units.
    let h = harness();
    h.ledger.seed_position(&h.owner(), 0, 60_000, LEDGER_EPOCH);

    let snapshot = h.snapshot().await;
    let before = h.ledger.network_ops();
    let err = h.orchestrator.claim(&snapshot).await.unwrap_err();
    assert!(matches!(
        err,
        OperationError::BelowClaimThreshold { points: 60_000 }
    ));
    assert_eq!(h.ledger.network_ops(), before);

    // The 50 000 boundary passes the minimum gate and still floors to
    // zero: same distinct rejection, no points consumed.
    h.ledger.seed_position(&h.owner(), 0, 50_000, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;
    let err = h.orchestrator.claim(&snapshot).await.unwrap_err();
    assert!(matches!(
        err,
        OperationError::BelowClaimThreshold { points: 50_000 }
    ));
    assert_eq!(h.ledger.position(&h.owner()).unwrap().total_points, 50_000);
}

#[tokio::test]
async fn claim_pays_out_whole_units_from_the_custodial_balance() {
    let h = harness();
    h.ledger.seed_position(&h.owner(), 0, 250_000, LEDGER_EPOCH);
    h.ledger.credit(&h.custodian, 10 * ONE_TOKEN);

    let snapshot = h.snapshot().await;
    let outcome = h.orchestrator.claim(&snapshot).await.expect("claim");

    assert_eq!(outcome.claimed_points, 250_000);
    assert_eq!(outcome.payout_lamports, 2 * ONE_TOKEN);
    assert_ne!(outcome.claim_signature, outcome.payout_signature);

    // Points consumed on the ledger, payout arrived in the wallet.
    assert_eq!(h.ledger.position(&h.owner()).unwrap().total_points, 0);
    assert_eq!(h.ledger.lamports(&h.owner()), 2 * ONE_TOKEN);
    assert_eq!(h.ledger.lamports(&h.custodian), 8 * ONE_TOKEN);
}

#[tokio::test]
async fn payout_failure_after_claim_is_surfaced_as_its_own_error() {
    let h = harness();
    h.ledger.seed_position(&h.owner(), 0, 250_000, LEDGER_EPOCH);
    h.ledger.credit(&h.custodian, 10 * ONE_TOKEN);

    let snapshot = h.snapshot().await;
    let balance_before = snapshot.wallet_balance;

    h.ledger.fail_next_transfer();
    let err = h.orchestrator.claim(&snapshot).await.unwrap_err();
    assert!(matches!(err, OperationError::PayoutAfterClaimFailed(_)));

    // Known inconsistency window: the next snapshot shows the points
    // reduced with no corresponding balance increase.
    let after = h.snapshot().await;
    assert_eq!(after.position.unwrap().total_points, 0);
    assert_eq!(after.claimable_points, 0);
    assert_eq!(after.wallet_balance, balance_before);
    assert_eq!(h.ledger.lamports(&h.custodian), 10 * ONE_TOKEN);
}

#[tokio::test]
async fn claim_without_a_custodian_is_rejected_locally() {
    let h = harness_without_custodian();
    h.ledger.seed_position(&h.owner(), 0, 250_000, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;
    let err = h.orchestrator.claim(&snapshot).await.unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
}

#[tokio::test]
async fn second_operation_while_confirming_is_rejected_immediately() {
    let h = harness();
    h.ledger.credit(&h.owner(), 10 * ONE_TOKEN);
    h.ledger.seed_position(&h.owner(), 0, 0, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;

    h.ledger.hold_confirmations(true);

    let orchestrator = h.orchestrator.clone();
    let first_snapshot = snapshot.clone();
    let first =
        tokio::spawn(async move { orchestrator.stake(&first_snapshot, ONE_TOKEN).await });

    // Let the first operation reach CONFIRMING.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*h.orchestrator.phase().borrow(), OperationPhase::Confirming);

    let err = h
        .orchestrator
        .stake(&snapshot, ONE_TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::OperationInFlight));

    h.ledger.hold_confirmations(false);
    first
        .await
        .expect("task join")
        .expect("held stake completes once confirmations resume");
}

#[tokio::test]
async fn stale_recency_token_is_surfaced_as_retryable() {
    let h = harness();
    h.ledger.credit(&h.owner(), 10 * ONE_TOKEN);
    h.ledger.seed_position(&h.owner(), 0, 0, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;

    h.ledger
        .fail_next_send("Transaction simulation failed: Blockhash not found");
    let err = h
        .orchestrator
        .stake(&snapshot, ONE_TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::StaleRecencyToken));

    // A plain retry fetches a fresh token and goes through.
    h.orchestrator
        .stake(&snapshot, ONE_TOKEN)
        .await
        .expect("retry after stale token");
    assert_eq!(
        h.ledger.position(&h.owner()).unwrap().staked_amount,
        ONE_TOKEN
    );
}

#[tokio::test]
async fn failed_operation_does_not_corrupt_subsequent_reads() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 5 * ONE_TOKEN, 123, LEDGER_EPOCH);
    let snapshot = h.snapshot().await;

    h.ledger.fail_next_send("Node is behind");
    let err = h
        .orchestrator
        .unstake(&snapshot, ONE_TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::Network(_)));

    let after = h.snapshot().await;
    let position = after.position.expect("position still readable");
    assert_eq!(position.staked_amount, 5 * ONE_TOKEN);
    assert_eq!(position.total_points, 123);
}
