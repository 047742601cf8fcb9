//! Provider-neutral request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
	System,
	Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
	Text { text: String },
	FunctionCall { name: String, args: Map<String, Value> },
	FunctionResponse { name: String, response: Value },
}
impl Part {
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text { text: text.into() }
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text { text } => Some(text),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
	pub role: Role,
	pub parts: Vec<Part>,
}
impl Message {
	pub fn new(role: Role, parts: Vec<Part>) -> Self {
		Self { role, parts }
	}

	pub fn user(text: impl Into<String>) -> Self {
		Self::new(Role::User, vec![Part::text(text)])
	}

	pub fn assistant(text: impl Into<String>) -> Self {
		Self::new(Role::Assistant, vec![Part::text(text)])
	}

	pub fn function_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
		Self::new(Role::Assistant, vec![Part::FunctionCall { name: name.into(), args }])
	}

	pub fn function_response(name: impl Into<String>, response: Value) -> Self {
		Self::new(Role::Tool, vec![Part::FunctionResponse { name: name.into(), response }])
	}

	/// Concatenated text parts, or `None` when the message carries no text.
	pub fn text(&self) -> Option<String> {
		let texts: Vec<&str> = self.parts.iter().filter_map(Part::as_text).collect();

		if texts.is_empty() { None } else { Some(texts.concat()) }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
	pub name: String,
	pub description: String,
	/// JSON schema of the arguments object.
	pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
	pub system_instruction: Option<String>,
	pub messages: Vec<Message>,
	pub tools: Vec<ToolDeclaration>,
	pub temperature: f32,
	pub max_tokens: u32,
}
impl GenerateRequest {
	pub fn new(messages: Vec<Message>) -> Self {
		Self {
			system_instruction: None,
			messages,
			tools: Vec::new(),
			temperature: 0.7,
			max_tokens: 1_024,
		}
	}

	pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
		self.system_instruction = Some(instruction.into());

		self
	}

	pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
		self.tools = tools;

		self
	}

	pub fn with_temperature(mut self, temperature: f32) -> Self {
		self.temperature = temperature;

		self
	}

	pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = max_tokens;

		self
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
	pub input_tokens: u32,
	pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
	pub content: Message,
	pub provider_name: String,
	pub model_name: String,
	pub usage: Usage,
}
impl GenerateResponse {
	pub fn text(&self) -> Option<String> {
		self.content.text()
	}
}
