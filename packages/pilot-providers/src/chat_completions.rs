//! Adapter for the chat-completions wire format with `tool_calls` / `tool_call_id`.

use std::collections::{HashMap, VecDeque};

use reqwest::{Client, header::HeaderMap};
use serde_json::{Map, Value};

use crate::{
	BoxFuture, Error, GenerateRequest, GenerateResponse, LlmProvider, Message, Part, Result, Role,
	Usage,
};

/// Wire details that differ between first-party endpoints and compatible servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
	/// Assistant tool-call turns send `content: null` and tool turns carry `name`.
	Native,
	/// Assistant tool-call turns send an empty string and tool turns omit `name`.
	Compatible,
}

pub struct ChatCompletionsProvider {
	name: String,
	model: String,
	endpoint: String,
	headers: HeaderMap,
	dialect: Dialect,
	client: Client,
}
impl ChatCompletionsProvider {
	pub fn new(
		cfg: &pilot_config::LlmProviderConfig,
		base_url: &str,
		dialect: Dialect,
	) -> Result<Self> {
		if cfg.api_key.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: format!("Provider {} requires an api_key.", cfg.name),
			});
		}

		let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

		Ok(Self {
			name: cfg.name.clone(),
			model: cfg.model.clone(),
			endpoint,
			headers: crate::auth_headers(&cfg.api_key, &Map::new())?,
			dialect,
			client: crate::http_client(cfg.timeout_ms)?,
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	async fn call(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
		let body = encode_request(&self.model, request, self.dialect);
		let response = self
			.client
			.post(&self.endpoint)
			.headers(self.headers.clone())
			.json(&body)
			.send()
			.await?;
		let json: Value = crate::ensure_success(&self.name, response).await?.json().await?;
		let (content, usage) = decode_response(&json)?;

		Ok(GenerateResponse {
			content,
			provider_name: self.name.clone(),
			model_name: self.model.clone(),
			usage,
		})
	}
}

impl LlmProvider for ChatCompletionsProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn model(&self) -> &str {
		&self.model
	}

	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, Result<GenerateResponse>> {
		Box::pin(self.call(request))
	}
}

pub fn encode_request(model: &str, request: &GenerateRequest, dialect: Dialect) -> Value {
	let mut body = serde_json::json!({
		"model": model,
		"messages": encode_messages(request, dialect),
		"temperature": request.temperature,
		"max_tokens": request.max_tokens,
	});

	if !request.tools.is_empty() {
		let tools: Vec<Value> = request
			.tools
			.iter()
			.map(|tool| {
				serde_json::json!({
					"type": "function",
					"function": {
						"name": tool.name,
						"description": tool.description,
						"parameters": tool.parameters,
					},
				})
			})
			.collect();

		body["tools"] = Value::Array(tools);
	}

	body
}

/// Encodes neutral messages, synthesizing call ids and pairing each response with the
/// oldest unanswered call of the same name.
pub fn encode_messages(request: &GenerateRequest, dialect: Dialect) -> Vec<Value> {
	let mut out = Vec::new();
	let mut pending: HashMap<String, VecDeque<String>> = HashMap::new();

	if let Some(instruction) = request.system_instruction.as_deref() {
		out.push(serde_json::json!({ "role": "system", "content": instruction }));
	}

	for (message_index, message) in request.messages.iter().enumerate() {
		match message.role {
			Role::System | Role::User => {
				let role = if message.role == Role::System { "system" } else { "user" };

				out.push(serde_json::json!({
					"role": role,
					"content": message.text().unwrap_or_default(),
				}));
			},
			Role::Assistant => {
				let mut tool_calls = Vec::new();

				for (part_index, part) in message.parts.iter().enumerate() {
					if let Part::FunctionCall { name, args } = part {
						let id = format!("call_{message_index}_{part_index}");
						let arguments = Value::Object(args.clone()).to_string();

						pending.entry(name.clone()).or_default().push_back(id.clone());
						tool_calls.push(serde_json::json!({
							"id": id,
							"type": "function",
							"function": { "name": name, "arguments": arguments },
						}));
					}
				}

				let text = message.text();
				let mut entry = serde_json::json!({ "role": "assistant" });

				entry["content"] = match (text, dialect, tool_calls.is_empty()) {
					(Some(text), _, _) => Value::String(text),
					(None, Dialect::Native, false) => Value::Null,
					(None, _, _) => Value::String(String::new()),
				};

				if !tool_calls.is_empty() {
					entry["tool_calls"] = Value::Array(tool_calls);
				}

				out.push(entry);
			},
			Role::Tool => {
				for (part_index, part) in message.parts.iter().enumerate() {
					let Part::FunctionResponse { name, response } = part else {
						continue;
					};
					let id = pending
						.get_mut(name)
						.and_then(VecDeque::pop_front)
						.unwrap_or_else(|| format!("call_{message_index}_{part_index}"));
					let content = match response {
						Value::String(text) => text.clone(),
						other => other.to_string(),
					};
					let mut entry = serde_json::json!({
						"role": "tool",
						"tool_call_id": id,
						"content": content,
					});

					if dialect == Dialect::Native {
						entry["name"] = Value::String(name.clone());
					}

					out.push(entry);
				}
			},
		}
	}

	out
}

pub fn decode_response(json: &Value) -> Result<(Message, Usage)> {
	let choices = json.get("choices").and_then(Value::as_array).ok_or_else(|| {
		let message = "Chat completion response is missing choices.".to_string();

		Error::InvalidResponse { message }
	})?;
	let usage = json
		.get("usage")
		.map(|usage| Usage {
			input_tokens: read_u32(usage, "prompt_tokens"),
			output_tokens: read_u32(usage, "completion_tokens"),
		})
		.unwrap_or_default();
	let Some(message) = choices.first().and_then(|choice| choice.get("message")) else {
		return Ok((Message::new(Role::Assistant, Vec::new()), usage));
	};

	Ok((decode_assistant(message), usage))
}

/// Maps wire messages back to neutral messages, resolving tool names from call ids.
pub fn decode_messages(messages: &[Value]) -> Vec<Message> {
	let mut names_by_id: HashMap<String, String> = HashMap::new();
	let mut out = Vec::new();

	for message in messages {
		match message.get("role").and_then(Value::as_str) {
			Some("assistant") => {
				for call in message.get("tool_calls").and_then(Value::as_array).into_iter().flatten()
				{
					if let (Some(id), Some(name)) = (
						call.get("id").and_then(Value::as_str),
						call.pointer("/function/name").and_then(Value::as_str),
					) {
						names_by_id.insert(id.to_string(), name.to_string());
					}
				}

				out.push(decode_assistant(message));
			},
			Some("tool") => {
				let name = message
					.get("tool_call_id")
					.and_then(Value::as_str)
					.and_then(|id| names_by_id.get(id).cloned())
					.or_else(|| message.get("name").and_then(Value::as_str).map(str::to_string))
					.unwrap_or_default();
				let raw = message.get("content").and_then(Value::as_str).unwrap_or_default();
				let response =
					serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

				out.push(Message::function_response(name, response));
			},
			Some("system") => out.push(Message::new(
				Role::System,
				vec![Part::text(message.get("content").and_then(Value::as_str).unwrap_or_default())],
			)),
			_ => out.push(Message::user(
				message.get("content").and_then(Value::as_str).unwrap_or_default(),
			)),
		}
	}

	out
}

fn decode_assistant(message: &Value) -> Message {
	let mut parts = Vec::new();

	if let Some(text) = message.get("content").and_then(Value::as_str)
		&& !text.is_empty()
	{
		parts.push(Part::text(text));
	}

	for call in message.get("tool_calls").and_then(Value::as_array).into_iter().flatten() {
		let Some(name) = call.pointer("/function/name").and_then(Value::as_str) else {
			continue;
		};
		let args = match call.pointer("/function/arguments") {
			Some(Value::String(raw)) => match serde_json::from_str(raw) {
				Ok(Value::Object(args)) => args,
				_ => Map::new(),
			},
			Some(Value::Object(args)) => args.clone(),
			_ => Map::new(),
		};

		parts.push(Part::FunctionCall { name: name.to_string(), args });
	}

	Message::new(Role::Assistant, parts)
}

fn read_u32(value: &Value, key: &str) -> u32 {
	value.get(key).and_then(Value::as_u64).map(|count| count as u32).unwrap_or(0)
}
