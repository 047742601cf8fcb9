//! Adapter for the `contents` / `parts` / `functionDeclarations` wire format.

use reqwest::Client;
use serde_json::{Map, Value};

use crate::{
	BoxFuture, Error, GenerateRequest, GenerateResponse, LlmProvider, Message, Part, Result, Role,
	Usage,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const WRAP_KEY: &str = "result";

pub struct GeminiProvider {
	name: String,
	model: String,
	base_url: String,
	api_key: String,
	client: Client,
}
impl GeminiProvider {
	pub fn new(cfg: &pilot_config::LlmProviderConfig) -> Result<Self> {
		if cfg.api_key.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: format!("Provider {} requires an api_key.", cfg.name),
			});
		}

		let base_url =
			cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();

		Ok(Self {
			name: cfg.name.clone(),
			model: cfg.model.clone(),
			base_url,
			api_key: cfg.api_key.clone(),
			client: crate::http_client(cfg.timeout_ms)?,
		})
	}

	async fn call(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
		let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
		let body = encode_request(request);
		let response = self
			.client
			.post(url)
			.header("x-goog-api-key", &self.api_key)
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

impl LlmProvider for GeminiProvider {
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

pub fn encode_request(request: &GenerateRequest) -> Value {
	let mut system_parts: Vec<Value> = Vec::new();

	if let Some(instruction) = request.system_instruction.as_deref() {
		system_parts.push(serde_json::json!({ "text": instruction }));
	}

	let mut contents = Vec::new();

	for message in &request.messages {
		let role = match message.role {
			Role::System => {
				system_parts.extend(
					message.parts.iter().filter_map(Part::as_text).map(|text| {
						serde_json::json!({ "text": text })
					}),
				);

				continue;
			},
			Role::User => "user",
			Role::Assistant => "model",
			Role::Tool => "function",
		};
		let parts: Vec<Value> = message.parts.iter().map(encode_part).collect();

		contents.push(serde_json::json!({ "role": role, "parts": parts }));
	}

	let mut body = serde_json::json!({
		"contents": contents,
		"generationConfig": {
			"temperature": request.temperature,
			"maxOutputTokens": request.max_tokens,
		},
	});

	if !system_parts.is_empty() {
		body["system_instruction"] = serde_json::json!({ "parts": system_parts });
	}
	if !request.tools.is_empty() {
		let declarations: Vec<Value> = request
			.tools
			.iter()
			.map(|tool| {
				serde_json::json!({
					"name": tool.name,
					"description": tool.description,
					"parameters": tool.parameters,
				})
			})
			.collect();

		body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
	}

	body
}

pub fn decode_response(json: &Value) -> Result<(Message, Usage)> {
	if let Some(error) = json.get("error") {
		return Err(Error::InvalidResponse {
			message: format!("Gemini response carries an error: {error}"),
		});
	}

	let usage = json
		.get("usageMetadata")
		.map(|meta| Usage {
			input_tokens: read_u32(meta, "promptTokenCount"),
			output_tokens: read_u32(meta, "candidatesTokenCount"),
		})
		.unwrap_or_default();
	let parts = json
		.get("candidates")
		.and_then(Value::as_array)
		.and_then(|candidates| candidates.first())
		.and_then(|candidate| candidate.pointer("/content/parts"))
		.and_then(Value::as_array)
		.map(|parts| parts.iter().filter_map(decode_part).collect())
		.unwrap_or_default();

	Ok((Message::new(Role::Assistant, parts), usage))
}

/// Maps wire `contents` back to neutral messages.
pub fn decode_contents(contents: &Value) -> Vec<Message> {
	let Some(items) = contents.as_array() else {
		return Vec::new();
	};

	items
		.iter()
		.map(|item| {
			let role = match item.get("role").and_then(Value::as_str) {
				Some("model") => Role::Assistant,
				Some("function") => Role::Tool,
				_ => Role::User,
			};
			let parts = item
				.get("parts")
				.and_then(Value::as_array)
				.map(|parts| parts.iter().filter_map(decode_part).collect())
				.unwrap_or_default();

			Message::new(role, parts)
		})
		.collect()
}

fn encode_part(part: &Part) -> Value {
	match part {
		Part::Text { text } => serde_json::json!({ "text": text }),
		Part::FunctionCall { name, args } => {
			serde_json::json!({ "functionCall": { "name": name, "args": args } })
		},
		Part::FunctionResponse { name, response } => {
			// The wire field is a protobuf Struct, so non-objects are wrapped. Objects that
			// already look wrapped get a second layer so decoding stays exact.
			let response = match response {
				Value::Object(map) if !is_wrapped(map) => response.clone(),
				other => serde_json::json!({ WRAP_KEY: other }),
			};

			serde_json::json!({ "functionResponse": { "name": name, "response": response } })
		},
	}
}

fn is_wrapped(map: &Map<String, Value>) -> bool {
	map.len() == 1 && map.contains_key(WRAP_KEY)
}

fn decode_part(part: &Value) -> Option<Part> {
	if let Some(call) = part.get("functionCall") {
		let name = call.get("name").and_then(Value::as_str)?.to_string();
		let args = match call.get("args") {
			Some(Value::Object(args)) => args.clone(),
			_ => Map::new(),
		};

		return Some(Part::FunctionCall { name, args });
	}
	if let Some(response) = part.get("functionResponse") {
		let name = response.get("name").and_then(Value::as_str)?.to_string();
		let response = match response.get("response") {
			Some(Value::Object(map)) if is_wrapped(map) => {
				map.get(WRAP_KEY).cloned().unwrap_or(Value::Null)
			},
			Some(value) => value.clone(),
			None => Value::Null,
		};

		return Some(Part::FunctionResponse { name, response });
	}
	if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
		return None;
	}

	part.get("text").and_then(Value::as_str).map(Part::text)
}

fn read_u32(value: &Value, key: &str) -> u32 {
	value.get(key).and_then(Value::as_u64).map(|count| count as u32).unwrap_or(0)
}
