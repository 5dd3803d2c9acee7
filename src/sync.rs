use crate::position::reader::{LiveSnapshot, SnapshotReader};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle for forcing an out-of-band snapshot refresh.
///
/// The orchestrator pokes this after every confirmed operation so the UI
/// reflects the new state promptly instead of waiting for the next tick.
#[derive(Clone)]
pub struct RefreshHandle {
	notify: Arc<Notify>,
}

impl RefreshHandle {
	/// Request an immediate re-read. Non-blocking; coalesces with any
	/// refresh already pending.
	pub fn request(&self) {
		self.notify.notify_one();
	}
}

/// Polling sync loop owning the published [`LiveSnapshot`].
///
/// On activation it performs one immediate read, then re-reads on a fixed
/// interval until [`SyncService::stop`] deactivates it. Snapshots are
/// replaced wholesale through a `watch` channel; consumers never observe a
/// partially updated snapshot.
pub struct SyncService {
	snapshot_rx: watch::Receiver<Option<LiveSnapshot>>,
	refresh: RefreshHandle,
	shutdown_tx: watch::Sender<bool>,
	task: JoinHandle<()>,
}

impl SyncService {
	/// Spawn the sync loop for `reader`, polling every `poll_interval`.
	pub fn start(reader: SnapshotReader, poll_interval: Duration) -> Self {
		let (snapshot_tx, snapshot_rx) = watch::channel(None);
		let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
		let notify = Arc::new(Notify::new());
		let refresh = RefreshHandle {
			notify: notify.clone(),
		};

		let loop_notify = notify.clone();
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(poll_interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			info!(
				"Sync loop started, polling every {} seconds",
				poll_interval.as_secs()
			);

			loop {
				tokio::select! {
					// The first tick fires immediately: activation performs
					// one read before the interval kicks in.
					_ = ticker.tick() => {}
					_ = loop_notify.notified() => {
						debug!("Forced refresh requested");
					}
					_ = shutdown_rx.changed() => {
						info!("Sync loop deactivated");
						break;
					}
				}

				let snapshot = reader.read_snapshot().await;

				// A read that completes after deactivation is discarded
				// with the task; never publish past a disconnect.
				if *shutdown_rx.borrow() {
					info!("Sync loop deactivated, discarding in-flight read");
					break;
				}

				debug!(
					"Publishing snapshot: staked={:?}, claimable={}",
					snapshot.position.as_ref().map(|p| p.staked_amount),
					snapshot.claimable_points
				);
				snapshot_tx.send_replace(Some(snapshot));
			}
		});

		Self {
			snapshot_rx,
			refresh,
			shutdown_tx,
			task,
		}
	}

	/// Subscribe to published snapshots. The receiver holds `None` until
	/// the first read completes.
	pub fn subscribe(&self) -> watch::Receiver<Option<LiveSnapshot>> {
		self.snapshot_rx.clone()
	}

	/// Latest published snapshot, if any.
	pub fn latest(&self) -> Option<LiveSnapshot> {
		self.snapshot_rx.borrow().clone()
	}

	/// Handle for requesting out-of-band refreshes.
	pub fn refresh_handle(&self) -> RefreshHandle {
		self.refresh.clone()
	}

	/// Deactivate the loop: cancel the pending timer and join the task.
	/// No recurring work survives this call.
	pub async fn stop(self) {
		let _ = self.shutdown_tx.send(true);
		// Wake the loop in case it is parked on the notify branch.
		self.refresh.request();
		let _ = self.task.await;
	}
}
