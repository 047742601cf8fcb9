//! Intent classification for free-form chat messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pilot_domain::text;
use pilot_providers::{GenerateRequest, Message};

use crate::{LanguageModel, Result};

pub const ROUTER_TEMPERATURE: f32 = 0.1;
pub const ROUTER_MAX_TOKENS: u32 = 256;
/// History lines quoted to the classifier.
pub const ROUTER_HISTORY_LINES: usize = 4;

const FALLBACK_CONFIDENCE: u8 = 50;
const FALLBACK_REASONING: &str = "fallback";

const ROUTER_INSTRUCTION: &str = r#"You route messages for a personal task assistant.
Classify the user's latest message into exactly one intent:
- CREATE_TASK: the user describes one or more things to do, with or without dates or priorities.
- SEARCH_TASK: the user wants to find or list existing tasks.
- MANAGE_CHECKLIST: the user wants to check, uncheck or inspect checklist items or progress of a task.
- CONVERSATION: greetings, questions about the assistant, or anything else.

Reply with a single JSON object and nothing else:
{"intent": "CREATE_TASK", "confidence": 90, "reasoning": "short explanation"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
	CreateTask,
	SearchTask,
	ManageChecklist,
	Conversation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
	pub intent: Intent,
	/// 0..=100.
	pub confidence: u8,
	pub reasoning: String,
}
impl Classification {
	pub fn fallback() -> Self {
		Self {
			intent: Intent::Conversation,
			confidence: FALLBACK_CONFIDENCE,
			reasoning: FALLBACK_REASONING.to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
struct RawClassification {
	intent: Intent,
	#[serde(default)]
	confidence: f64,
	#[serde(default)]
	reasoning: String,
}

pub struct IntentRouter {
	llm: Arc<dyn LanguageModel>,
}
impl IntentRouter {
	pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
		Self { llm }
	}

	/// Provider failures propagate. Unusable replies degrade to [`Classification::fallback`].
	pub async fn classify(
		&self,
		message: &str,
		recent_history: &[String],
	) -> Result<Classification> {
		let prompt = build_prompt(message, recent_history);
		let request = GenerateRequest::new(vec![Message::user(prompt)])
			.with_system(ROUTER_INSTRUCTION)
			.with_temperature(ROUTER_TEMPERATURE)
			.with_max_tokens(ROUTER_MAX_TOKENS);
		let response = self.llm.generate(&request).await?;
		let Some(reply) = response.text().filter(|reply| !reply.trim().is_empty()) else {
			tracing::warn!("Router received an empty reply. Using fallback intent.");

			return Ok(Classification::fallback());
		};

		Ok(parse_classification(&reply))
	}
}

pub fn parse_classification(reply: &str) -> Classification {
	let payload = text::sanitize_json_payload(reply);

	match serde_json::from_str::<RawClassification>(payload) {
		Ok(raw) => Classification {
			intent: raw.intent,
			confidence: raw.confidence.clamp(0.0, 100.0).round() as u8,
			reasoning: raw.reasoning,
		},
		Err(err) => {
			tracing::warn!(
				error = %err,
				"Router reply is not a classification. Using fallback intent."
			);

			Classification::fallback()
		},
	}
}

fn build_prompt(message: &str, recent_history: &[String]) -> String {
	let skip = recent_history.len().saturating_sub(ROUTER_HISTORY_LINES);
	let history: Vec<&str> = recent_history[skip..].iter().map(String::as_str).collect();

	if history.is_empty() {
		return format!("Message: {message}");
	}

	format!("Recent conversation:\n{}\n\nMessage: {message}", history.join("\n"))
}
