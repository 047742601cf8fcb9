//! Per-user rolling conversation memory.

use std::{collections::HashMap, time::Duration};

use tokio::{sync::RwLock, time::Instant};
use tokio_util::sync::CancellationToken;

use pilot_providers::{Message, Role};

pub const SESSION_WINDOW: usize = 10;
pub const SESSION_TTL: Duration = Duration::from_secs(10 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Session {
	messages: Vec<Message>,
	last_updated: Instant,
}

pub struct SessionStore {
	sessions: RwLock<HashMap<String, Session>>,
	window: usize,
	ttl: Duration,
}
impl SessionStore {
	pub fn new(window: usize, ttl: Duration) -> Self {
		Self { sessions: RwLock::new(HashMap::new()), window: window.max(1), ttl }
	}

	pub async fn history(&self, user_id: &str) -> Vec<Message> {
		self.sessions
			.read()
			.await
			.get(user_id)
			.map(|session| session.messages.clone())
			.unwrap_or_default()
	}

	/// Appends to the user's session, creating it on first use, and keeps the last `window`.
	pub async fn append(&self, user_id: &str, message: Message) {
		let mut sessions = self.sessions.write().await;
		let session = sessions.entry(user_id.to_string()).or_insert_with(|| Session {
			messages: Vec::new(),
			last_updated: Instant::now(),
		});

		session.messages.push(message);

		let overflow = session.messages.len().saturating_sub(self.window);

		session.messages.drain(..overflow);

		session.last_updated = Instant::now();
	}

	pub async fn reset(&self, user_id: &str) -> bool {
		self.sessions.write().await.remove(user_id).is_some()
	}

	/// Text lines of the latest messages, oldest first, as `role: text`.
	pub async fn recent_lines(&self, user_id: &str, limit: usize) -> Vec<String> {
		let history = self.history(user_id).await;
		let lines: Vec<String> = history
			.iter()
			.filter_map(|message| {
				let text = message.text()?;
				let role = match message.role {
					Role::User => "user",
					Role::Assistant => "assistant",
					Role::System | Role::Tool => return None,
				};

				Some(format!("{role}: {text}"))
			})
			.collect();
		let skip = lines.len().saturating_sub(limit);

		lines.into_iter().skip(skip).collect()
	}

	pub async fn len(&self) -> usize {
		self.sessions.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	/// Drops sessions idle for longer than the TTL and returns how many were removed.
	pub async fn sweep(&self) -> usize {
		let now = Instant::now();
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();

		sessions.retain(|_, session| now.duration_since(session.last_updated) <= self.ttl);

		before - sessions.len()
	}

	/// Sweeps every `interval` until `cancel` fires.
	pub async fn run_sweeper(&self, interval: Duration, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);

		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					tracing::debug!("Session sweeper stopped.");

					return;
				},
				_ = ticker.tick() => {
					let evicted = self.sweep().await;

					if evicted > 0 {
						tracing::info!(evicted, "Evicted idle agent sessions.");
					}
				},
			}
		}
	}
}
impl Default for SessionStore {
	fn default() -> Self {
		Self::new(SESSION_WINDOW, SESSION_TTL)
	}
}
