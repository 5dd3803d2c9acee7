//! Integration tests for the polling sync service.

mod common;

use common::{harness, LEDGER_EPOCH, ONE_TOKEN};
use solana_stake_sync::sync::SyncService;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn activation_publishes_an_immediate_snapshot() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 3 * ONE_TOKEN, 77, LEDGER_EPOCH);
    h.ledger.credit(&h.owner(), ONE_TOKEN);

    // A long interval proves the first read does not wait for a tick.
    let service = SyncService::start(h.reader(), Duration::from_secs(3600));
    let mut snapshots = service.subscribe();

    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .expect("first snapshot within the timeout")
        .expect("sync loop alive");

    let snapshot = snapshots.borrow().clone().expect("snapshot published");
    assert_eq!(snapshot.wallet_balance, ONE_TOKEN);
    let position = snapshot.position.expect("position decoded");
    assert_eq!(position.staked_amount, 3 * ONE_TOKEN);
    assert!(snapshot.soft_errors.is_empty());

    service.stop().await;
}

#[tokio::test]
async fn confirmed_operation_forces_an_out_of_band_refresh() {
    let h = harness();
    h.ledger.credit(&h.owner(), 10 * ONE_TOKEN);
    h.ledger.seed_position(&h.owner(), 0, 0, LEDGER_EPOCH);

    let service = SyncService::start(h.reader(), Duration::from_secs(3600));
    let mut snapshots = service.subscribe();
    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .expect("initial snapshot")
        .expect("sync loop alive");
    let initial = snapshots.borrow().clone().unwrap();
    assert_eq!(initial.position.as_ref().unwrap().staked_amount, 0);

    // Wire the refresh handle the way the engine composes it, then stake.
    let orchestrator = std::sync::Arc::new(
        solana_stake_sync::transaction::TransactionOrchestrator::new(
            h.ledger.clone(),
            h.wallet.clone(),
            h.program_id,
        )
        .with_refresh_handle(service.refresh_handle())
        .with_confirm_timeout(Duration::from_secs(2)),
    );
    orchestrator
        .stake(&initial, 2 * ONE_TOKEN)
        .await
        .expect("stake");

    // The refreshed snapshot lands well before the hour-long tick.
    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .expect("forced refresh within the timeout")
        .expect("sync loop alive");
    let refreshed = snapshots.borrow().clone().unwrap();
    assert_eq!(
        refreshed.position.unwrap().staked_amount,
        2 * ONE_TOKEN
    );

    service.stop().await;
}

#[tokio::test]
async fn balance_read_failure_degrades_without_losing_the_position() {
    let h = harness();
    h.ledger
        .seed_position(&h.owner(), 3 * ONE_TOKEN, 77, LEDGER_EPOCH);
    h.ledger.credit(&h.owner(), ONE_TOKEN);
    h.ledger.fail_balance_reads(true);

    let snapshot = h.snapshot().await;

    // The two reads are independent: the position still decodes while the
    // balance defaults to zero with a reported soft error.
    assert!(snapshot.position.is_some());
    assert_eq!(snapshot.wallet_balance, 0);
    assert_eq!(snapshot.soft_errors.len(), 1);
    assert!(snapshot.soft_errors[0].contains("balance read failed"));
}

#[tokio::test]
async fn deactivation_cancels_the_pending_timer() {
    let h = harness();
    let service = SyncService::start(h.reader(), Duration::from_millis(50));
    let mut snapshots = service.subscribe();

    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .expect("initial snapshot")
        .expect("sync loop alive");

    service.stop().await;

    // The publisher is gone: no recurring work survives deactivation.
    assert!(snapshots.changed().await.is_err());
}
