use std::{collections::VecDeque, sync::Mutex};

use serde_json::{Map, Value};

use pilot_providers::{GenerateRequest, GenerateResponse, Message, Usage};
use pilot_service::{BoxFuture, LanguageModel};

use crate::lock;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
	Text(String),
	Call { name: String, args: Map<String, Value> },
	Fail(String),
}
impl Reply {
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}

	/// Non-object `args` become an empty argument map.
	pub fn call(name: impl Into<String>, args: Value) -> Self {
		let args = match args {
			Value::Object(map) => map,
			_ => Map::new(),
		};

		Self::Call { name: name.into(), args }
	}

	pub fn fail(message: impl Into<String>) -> Self {
		Self::Fail(message.into())
	}
}

/// Replays replies in order. The last reply repeats once the script runs dry.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
	script: Mutex<VecDeque<Reply>>,
	requests: Mutex<Vec<GenerateRequest>>,
}
impl ScriptedLlm {
	pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
		Self { script: Mutex::new(replies.into_iter().collect()), requests: Mutex::default() }
	}

	pub fn push(&self, reply: Reply) {
		lock(&self.script).push_back(reply);
	}

	pub fn calls(&self) -> usize {
		lock(&self.requests).len()
	}

	pub fn requests(&self) -> Vec<GenerateRequest> {
		lock(&self.requests).clone()
	}

	fn next_reply(&self) -> Option<Reply> {
		let mut script = lock(&self.script);

		if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
	}
}

impl LanguageModel for ScriptedLlm {
	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, pilot_providers::Result<GenerateResponse>> {
		lock(&self.requests).push(request.clone());

		let reply = self.next_reply();

		Box::pin(async move {
			let content = match reply {
				Some(Reply::Text(text)) => Message::assistant(text),
				Some(Reply::Call { name, args }) => Message::function_call(name, args),
				Some(Reply::Fail(message)) => {
					return Err(pilot_providers::Error::InvalidResponse { message });
				},
				None => {
					return Err(pilot_providers::Error::InvalidResponse {
						message: "Script is empty.".to_string(),
					});
				},
			};

			Ok(GenerateResponse {
				content,
				provider_name: "scripted".to_string(),
				model_name: "scripted".to_string(),
				usage: Usage::default(),
			})
		})
	}
}
