//! Keeps the vector index in step with note-store change webhooks.

use std::{sync::Arc, time::Duration};

use pilot_domain::memo_webhook::{MemoActivity, MemoWebhookPayload};

use crate::{Error, NoteStore, Result, VectorIndex};

pub const REEMBED_ATTEMPTS: u32 = 3;
pub const REEMBED_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub base_delay: Duration,
}
impl RetryPolicy {
	/// Wait after the `attempt`-th failure (1-based): `base * 2^(attempt - 1)`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		self.base_delay.saturating_mul(1_u32 << attempt.saturating_sub(1).min(16))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { attempts: REEMBED_ATTEMPTS, base_delay: REEMBED_BASE_DELAY }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReembedOutcome {
	Embedded { memo_id: String },
	Deleted { memo_id: String },
	Ignored { reason: String },
}

pub struct ReEmbedder {
	notes: Arc<dyn NoteStore>,
	index: Arc<dyn VectorIndex>,
	policy: RetryPolicy,
}
impl ReEmbedder {
	pub fn new(
		notes: Arc<dyn NoteStore>,
		index: Arc<dyn VectorIndex>,
		policy: RetryPolicy,
	) -> Self {
		Self { notes, index, policy }
	}

	/// Applies one webhook, retrying from the fetch step on every failure.
	pub async fn handle(&self, payload: &MemoWebhookPayload) -> Result<ReembedOutcome> {
		let activity = payload.activity();

		if activity == MemoActivity::Other {
			return Ok(ReembedOutcome::Ignored {
				reason: format!("unsupported activity {}", payload.activity_type),
			});
		}

		let Some(memo_id) = payload.memo_id() else {
			return Err(Error::invalid_request("Webhook payload has no memo name or uid."));
		};
		let attempts = self.policy.attempts.max(1);
		let mut attempt = 1;

		loop {
			match self.apply(activity, &memo_id).await {
				Ok(outcome) => return Ok(outcome),
				Err(err) if attempt < attempts => {
					let delay = self.policy.backoff(attempt);

					tracing::warn!(
						memo_id = %memo_id,
						attempt,
						delay_ms = delay.as_millis() as u64,
						error = %err,
						"Vector sync attempt failed. Retrying."
					);
					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(err) => {
					tracing::error!(
						memo_id = %memo_id,
						attempts,
						error = %err,
						"Vector sync exhausted retries; data drift occurred."
					);

					return Err(err);
				},
			}
		}
	}

	async fn apply(&self, activity: MemoActivity, memo_id: &str) -> Result<ReembedOutcome> {
		match activity {
			MemoActivity::Created | MemoActivity::Updated => {
				let task = self.notes.get_task(memo_id).await?;

				self.index.embed_task(&task).await?;

				tracing::info!(memo_id = %task.id, "Task re-embedded.");

				Ok(ReembedOutcome::Embedded { memo_id: task.id })
			},
			MemoActivity::Deleted => {
				self.index.delete_task(memo_id).await?;

				tracing::info!(memo_id, "Task removed from the vector index.");

				Ok(ReembedOutcome::Deleted { memo_id: memo_id.to_string() })
			},
			MemoActivity::Other => {
				Ok(ReembedOutcome::Ignored { reason: "unsupported activity".to_string() })
			},
		}
	}
}
