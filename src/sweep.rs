//! Background refresh sweep that preempts credential expiry.
//!
//! The scheduler walks every stored credential on its own timer, independent of
//! request flow, and refreshes those nearing expiry with a wide buffer so a
//! user-facing request never has to pay the refresh latency. Per-entry failures
//! are logged and isolated: one dead grant never aborts the rest of the sweep,
//! and the ticker keeps running after a failed iteration.

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::GrantType,
	vault::CredentialVault,
};

/// Wide buffer used by the sweep so expiry is preempted well ahead of requests.
pub const SWEEP_REFRESH_BUFFER: Duration = Duration::minutes(30);

const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Periodic refresh sweep over every stored credential.
#[derive(Debug)]
pub struct RefreshScheduler {
	vault: Arc<CredentialVault>,
	interval: std::time::Duration,
	buffer: Duration,
}
impl RefreshScheduler {
	/// Creates a scheduler with the default hourly interval and 30-minute buffer.
	pub fn new(vault: Arc<CredentialVault>) -> Self {
		Self { vault, interval: DEFAULT_SWEEP_INTERVAL, buffer: SWEEP_REFRESH_BUFFER }
	}

	/// Overrides the sweep interval.
	pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
		self.interval = interval;

		self
	}

	/// Overrides the refresh buffer.
	pub fn with_buffer(mut self, buffer: Duration) -> Self {
		self.buffer = buffer;

		self
	}

	/// Spawns the sweep loop on the current runtime.
	///
	/// The first sweep runs immediately; later sweeps follow the configured
	/// interval until [`SchedulerHandle::shutdown`] is called.
	pub fn spawn(self) -> SchedulerHandle {
		let notify = Arc::new(tokio::sync::Notify::new());
		let shutdown = notify.clone();
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(self.interval);

			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = shutdown.notified() => break,
					_ = ticker.tick() => self.sweep_once().await,
				}
			}
		});

		SchedulerHandle { task, notify }
	}

	/// Runs one sweep iteration; failures are isolated per credential.
	pub async fn sweep_once(&self) {
		const KIND: FlowKind = FlowKind::Sweep;

		let span = FlowSpan::new(KIND, "sweep_once");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		span.instrument(async {
			let keys = match self.vault.list_keys().await {
				Ok(keys) => keys,
				Err(err) => {
					obs::record_warning("sweep_list_failed", &err.to_string());
					obs::record_flow_outcome(KIND, FlowOutcome::Failure);

					return;
				},
			};

			for key in keys {
				let handle = match self.vault.registry().get(&key.provider) {
					Ok(handle) => handle,
					Err(err) => {
						obs::record_warning("sweep_unknown_provider", &err.to_string());

						continue;
					},
				};

				if !handle.supports(GrantType::RefreshToken) {
					continue;
				}
				if let Err(err) = self.vault.ensure_fresh_by_key(&key, self.buffer).await {
					obs::record_warning(
						"sweep_refresh_failed",
						&format!("provider={} user={} error={err}", key.provider, key.user),
					);
				}
			}

			obs::record_flow_outcome(KIND, FlowOutcome::Success);
		})
		.await;
	}
}

/// Handle owning the spawned sweep task.
#[derive(Debug)]
pub struct SchedulerHandle {
	task: tokio::task::JoinHandle<()>,
	notify: Arc<tokio::sync::Notify>,
}
impl SchedulerHandle {
	/// Stops the sweep loop and waits for the task to finish.
	pub async fn shutdown(self) {
		self.notify.notify_one();

		let _ = self.task.await;
	}

	/// Returns `true` while the sweep task is still running.
	pub fn is_running(&self) -> bool {
		!self.task.is_finished()
	}
}
