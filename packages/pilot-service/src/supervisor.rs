//! Owns detached background work so shutdown can cancel and drain it.

use std::{future::Future, time::Duration};

use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Upper bound for work detached from an already-acknowledged webhook.
pub const BACKGROUND_DEADLINE: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
	Finished,
	TimedOut,
	Cancelled,
}

#[derive(Clone, Debug, Default)]
pub struct Supervisor {
	cancel: CancellationToken,
	tracker: TaskTracker,
}
impl Supervisor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	pub fn is_shutting_down(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Number of tracked tasks still running.
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	/// Runs `work` in the background, bounded by `deadline` and by shutdown.
	pub fn spawn_detached<F>(
		&self,
		name: &'static str,
		deadline: Duration,
		work: F,
	) -> tokio::task::JoinHandle<TaskExit>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let cancel = self.cancel.clone();

		self.tracker.spawn(async move {
			tokio::select! {
				_ = cancel.cancelled() => {
					tracing::warn!(task = name, "Background task cancelled by shutdown.");

					TaskExit::Cancelled
				},
				result = tokio::time::timeout(deadline, work) => match result {
					Ok(()) => TaskExit::Finished,
					Err(_) => {
						tracing::warn!(
							task = name,
							deadline_ms = deadline.as_millis() as u64,
							"Background task exceeded its deadline."
						);

						TaskExit::TimedOut
					},
				},
			}
		})
	}

	/// Runs a long-lived service that receives the shutdown token itself.
	pub fn spawn_service<F, Fut>(&self, name: &'static str, service: F)
	where
		F: FnOnce(CancellationToken) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let work = service(self.cancel.clone());

		self.tracker.spawn(async move {
			work.await;

			tracing::info!(task = name, "Background service stopped.");
		});
	}

	/// Cancels all tracked work and waits for it to drain.
	pub async fn shutdown(&self) {
		self.cancel.cancel();
		self.tracker.close();
		self.tracker.wait().await;

		tracing::info!("Background work drained.");
	}
}
