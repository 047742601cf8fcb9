//! Tool-calling agent loop with per-user session memory.

pub mod session;
pub mod time_context;

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use pilot_domain::task::Scope;
use pilot_providers::{GenerateRequest, Message, Part};

use crate::{
	Error, LanguageModel, Result,
	agent::session::{SWEEP_INTERVAL, SessionStore},
	tools::ToolRegistry,
};

pub const MAX_STEPS: usize = 5;
pub const AGENT_TEMPERATURE: f32 = 0.7;
pub const AGENT_MAX_TOKENS: u32 = 2_048;
pub const MAX_STEPS_REPLY: &str = "I thought about this for too long without reaching an answer. Could you narrow the question down a little?";
pub const TOOL_NOT_FOUND: &str = "tool not found";

const PERSONA: &str = "You are a friendly personal task assistant talking through a chat app.
You help the user find tasks, track checklist progress, check their calendar and plan their time.
Use the available tools whenever the answer depends on the user's data. Never invent task ids.
Answer in the user's language, briefly, in plain text.";

pub struct Agent {
	llm: Arc<dyn LanguageModel>,
	tools: ToolRegistry,
	sessions: Arc<SessionStore>,
	timezone: Tz,
}
impl Agent {
	pub fn new(
		llm: Arc<dyn LanguageModel>,
		tools: ToolRegistry,
		sessions: Arc<SessionStore>,
		timezone: Tz,
	) -> Self {
		Self { llm, tools, sessions, timezone }
	}

	pub fn sessions(&self) -> &Arc<SessionStore> {
		&self.sessions
	}

	pub fn tools(&self) -> &ToolRegistry {
		&self.tools
	}

	pub async fn reset_session(&self, user_id: &str) -> bool {
		self.sessions.reset(user_id).await
	}

	/// Runs the session sweeper until `cancel` fires.
	pub async fn run_sweeper(&self, cancel: CancellationToken) {
		self.sessions.run_sweeper(SWEEP_INTERVAL, cancel).await;
	}

	pub async fn process_query(&self, scope: &Scope, query: &str) -> Result<String> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::EmptyInput);
		}

		self.sessions.append(&scope.user_id, Message::user(query)).await;

		let history = self.sessions.history(&scope.user_id).await;
		let reply = self.run_loop(scope, history).await?;

		self.sessions.append(&scope.user_id, Message::assistant(reply.clone())).await;

		Ok(reply)
	}

	async fn run_loop(&self, scope: &Scope, mut conversation: Vec<Message>) -> Result<String> {
		let now = Utc::now().with_timezone(&self.timezone);
		let system = format!("{PERSONA}\n\n{}", time_context::time_context(now));
		let declarations = self.tools.declarations();

		for step in 1..=MAX_STEPS {
			let request = GenerateRequest::new(conversation.clone())
				.with_system(system.clone())
				.with_tools(declarations.clone())
				.with_temperature(AGENT_TEMPERATURE)
				.with_max_tokens(AGENT_MAX_TOKENS);
			let response = self.llm.generate(&request).await?;
			let Some(first) = response.content.parts.first() else {
				return Err(Error::EmptyLlmResponse);
			};

			match first {
				Part::Text { text } => return Ok(text.clone()),
				Part::FunctionCall { name, args } => {
					tracing::debug!(
						user_id = %scope.user_id,
						step,
						tool = %name,
						"Agent requested a tool."
					);

					let output = self.call_tool(scope, name, args).await;

					conversation.push(Message::function_call(name.clone(), args.clone()));
					conversation.push(Message::function_response(name.clone(), output));
				},
				Part::FunctionResponse { .. } => return Err(Error::EmptyLlmResponse),
			}
		}

		tracing::info!(
			user_id = %scope.user_id,
			max_steps = MAX_STEPS,
			"Agent hit the step limit."
		);

		Ok(MAX_STEPS_REPLY.to_string())
	}

	/// Tool failures become `{"error": ...}` so the model can recover on the next step.
	async fn call_tool(
		&self,
		scope: &Scope,
		name: &str,
		args: &serde_json::Map<String, Value>,
	) -> Value {
		let Some(tool) = self.tools.get(name) else {
			tracing::warn!(tool = name, "Agent requested an unknown tool.");

			return json!({ "error": TOOL_NOT_FOUND });
		};

		match tool.invoke(scope, args).await {
			Ok(output) => output,
			Err(err) => {
				tracing::warn!(
					user_id = %scope.user_id,
					tool = name,
					error = %err,
					"Tool call failed."
				);

				json!({ "error": err.to_string() })
			},
		}
	}
}
