//! Bot API client for outbound messages and webhook registration.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

/// Bot API hard limit for one message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4_096;

pub struct TelegramClient {
	api_base: String,
	token: String,
	client: Client,
}
impl TelegramClient {
	pub fn new(cfg: &pilot_config::Telegram) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			api_base: cfg.api_base.trim_end_matches('/').to_string(),
			token: cfg.bot_token.clone(),
			client,
		})
	}

	/// Sends `text`, split into several messages when it exceeds the Bot API limit.
	pub async fn send_message(
		&self,
		chat_id: i64,
		text: &str,
		parse_mode: Option<&str>,
	) -> Result<()> {
		for chunk in split_message(text, MAX_MESSAGE_CHARS) {
			let mut body = serde_json::json!({ "chat_id": chat_id, "text": chunk });

			if let Some(mode) = parse_mode {
				body["parse_mode"] = serde_json::Value::String(mode.to_string());
			}

			self.call("sendMessage", &body).await?;
		}

		Ok(())
	}

	pub async fn set_webhook(&self, url: &str) -> Result<()> {
		self.call("setWebhook", &serde_json::json!({ "url": url })).await
	}

	async fn call(&self, method: &str, body: &serde_json::Value) -> Result<()> {
		let url = format!("{}/bot{}/{method}", self.api_base, self.token);
		let response = self.client.post(url).json(body).send().await?;
		let reply: BotReply = crate::ensure_success("telegram", response).await?.json().await?;

		if !reply.ok {
			return Err(Error::InvalidResponse {
				message: format!(
					"Telegram {method} was rejected: {}",
					reply.description.unwrap_or_default()
				),
			});
		}

		Ok(())
	}
}

/// Splits on line boundaries where possible, never inside a codepoint.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_chars = 0;

	for line in text.split_inclusive('\n') {
		let line_chars = line.chars().count();

		if current_chars + line_chars > max_chars && !current.is_empty() {
			chunks.push(std::mem::take(&mut current));

			current_chars = 0;
		}

		if line_chars > max_chars {
			let chars: Vec<char> = line.chars().collect();

			for piece in chars.chunks(max_chars) {
				chunks.push(piece.iter().collect());
			}

			continue;
		}

		current.push_str(line);

		current_chars += line_chars;
	}

	if !current.is_empty() || chunks.is_empty() {
		chunks.push(current);
	}

	chunks
}

#[derive(Debug, Deserialize)]
struct BotReply {
	ok: bool,
	#[serde(default)]
	description: Option<String>,
}
