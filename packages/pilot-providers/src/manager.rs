//! Priority-ordered provider chain with per-provider retry and a global deadline.

use std::{sync::Arc, time::Duration};

use tokio::time::{self, Instant};

use crate::{Error, GenerateRequest, GenerateResponse, LlmProvider, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPolicy {
	pub fallback_enabled: bool,
	pub retry_attempts: u32,
	/// Attempt `k` (zero-based) waits `k * retry_delay` before running.
	pub retry_delay: Duration,
	pub max_total_timeout: Option<Duration>,
}
impl ChainPolicy {
	pub fn from_config(cfg: &pilot_config::LlmChain) -> Self {
		Self {
			fallback_enabled: cfg.fallback_enabled,
			retry_attempts: cfg.retry_attempts.max(1),
			retry_delay: Duration::from_millis(cfg.retry_delay_ms),
			max_total_timeout: (cfg.max_total_timeout_ms > 0)
				.then(|| Duration::from_millis(cfg.max_total_timeout_ms)),
		}
	}
}

impl Default for ChainPolicy {
	fn default() -> Self {
		Self {
			fallback_enabled: true,
			retry_attempts: 3,
			retry_delay: Duration::from_secs(1),
			max_total_timeout: None,
		}
	}
}

pub struct ProviderManager {
	providers: Vec<Arc<dyn LlmProvider>>,
	policy: ChainPolicy,
}
impl ProviderManager {
	/// Providers are tried in the given order.
	pub fn new(providers: Vec<Arc<dyn LlmProvider>>, policy: ChainPolicy) -> Result<Self> {
		if providers.is_empty() {
			return Err(Error::NoProviders);
		}

		Ok(Self { providers, policy })
	}

	pub fn provider_names(&self) -> Vec<&str> {
		self.providers.iter().map(|provider| provider.name()).collect()
	}

	pub fn policy(&self) -> ChainPolicy {
		self.policy
	}

	pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
		let deadline = self.policy.max_total_timeout.map(|timeout| Instant::now() + timeout);
		let mut last_error = None;
		let mut tried = 0;

		for provider in &self.providers {
			if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
				return Err(Error::Timeout { tried });
			}

			tried += 1;

			match self.try_provider(provider.as_ref(), request, deadline).await {
				Ok(response) => {
					tracing::info!(
						provider = %response.provider_name,
						model = %response.model_name,
						input_tokens = response.usage.input_tokens,
						output_tokens = response.usage.output_tokens,
						"LLM generation succeeded."
					);

					return Ok(response);
				},
				Err(Attempt::DeadlineExceeded) => return Err(Error::Timeout { tried }),
				Err(Attempt::Failed(err)) => {
					tracing::warn!(
						provider = provider.name(),
						model = provider.model(),
						attempts = self.policy.retry_attempts,
						error = %err,
						"LLM provider failed after all retries."
					);

					last_error = Some(err);

					if !self.policy.fallback_enabled {
						break;
					}
				},
			}
		}

		match last_error {
			Some(last) => Err(Error::AllProvidersFailed { last: Box::new(last) }),
			None => Err(Error::NoProviders),
		}
	}

	async fn try_provider(
		&self,
		provider: &dyn LlmProvider,
		request: &GenerateRequest,
		deadline: Option<Instant>,
	) -> Result<GenerateResponse, Attempt> {
		let attempts = self.policy.retry_attempts.max(1);
		let mut last_error = None;

		for attempt in 0..attempts {
			if attempt > 0 {
				let backoff = self.policy.retry_delay * attempt;

				sleep_within(backoff, deadline).await?;
			}

			let outcome = match deadline {
				Some(deadline) => time::timeout_at(deadline, provider.generate(request))
					.await
					.map_err(|_| Attempt::DeadlineExceeded)?,
				None => provider.generate(request).await,
			};

			match outcome {
				Ok(response) => return Ok(response),
				Err(err) => {
					tracing::debug!(
						provider = provider.name(),
						attempt = attempt + 1,
						error = %err,
						"LLM provider attempt failed."
					);

					last_error = Some(err);
				},
			}
		}

		Err(Attempt::Failed(last_error.unwrap_or(Error::NoProviders)))
	}
}

enum Attempt {
	Failed(Error),
	DeadlineExceeded,
}

async fn sleep_within(duration: Duration, deadline: Option<Instant>) -> Result<(), Attempt> {
	let wake = Instant::now() + duration;

	match deadline {
		Some(deadline) if deadline <= wake => {
			time::sleep_until(deadline).await;

			Err(Attempt::DeadlineExceeded)
		},
		_ => {
			time::sleep_until(wake).await;

			Ok(())
		},
	}
}
