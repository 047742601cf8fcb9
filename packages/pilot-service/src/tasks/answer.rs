use serde::Serialize;

use pilot_domain::{task::Scope, text};
use pilot_providers::{GenerateRequest, Message};

use crate::{
	Error, Result,
	tasks::{SearchHit, SearchRequest, TaskService},
};

pub const MAX_TASKS_IN_CONTEXT: u32 = 5;
pub const MAX_CHARS_PER_TASK: usize = 800;
pub const ANSWER_TEMPERATURE: f32 = 0.3;
pub const ANSWER_MAX_TOKENS: u32 = 1_024;

const ANSWER_INSTRUCTION: &str = "You answer questions about the user's own tasks.
Use only the tasks provided in the context. Do not invent tasks, dates or details.
If the context does not contain the answer, say that you don't know.
Cite the link of every task you rely on.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
	pub answer: String,
	pub source_tasks: Vec<SearchHit>,
	pub source_count: usize,
}

impl TaskService {
	pub async fn answer_query(&self, scope: &Scope, query: &str) -> Result<AnswerResponse> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::invalid_request("Question is empty."));
		}

		let search = SearchRequest {
			query: query.to_string(),
			limit: Some(MAX_TASKS_IN_CONTEXT),
			tags: Vec::new(),
		};
		let sources = self.search(scope, &search).await?.results;
		let prompt = format!("{}\n\nQuestion: {query}", build_context(&sources));
		let request = GenerateRequest::new(vec![Message::user(prompt)])
			.with_system(ANSWER_INSTRUCTION)
			.with_temperature(ANSWER_TEMPERATURE)
			.with_max_tokens(ANSWER_MAX_TOKENS);
		let response = self.llm.generate(&request).await?;
		let answer = response.text().filter(|answer| !answer.trim().is_empty());
		let Some(answer) = answer else {
			return Err(Error::EmptyLlmResponse);
		};

		Ok(AnswerResponse { answer, source_count: sources.len(), source_tasks: sources })
	}
}

pub fn build_context(sources: &[SearchHit]) -> String {
	if sources.is_empty() {
		return "Context: no related tasks were found.".to_string();
	}

	let blocks: Vec<String> = sources
		.iter()
		.enumerate()
		.map(|(index, hit)| {
			format!(
				"### Task {} (relevance {:.0}%)\nLink: {}\n{}",
				index + 1,
				(hit.score * 100.0).clamp(0.0, 100.0),
				hit.memo_url,
				text::truncate_chars(hit.content.trim(), MAX_CHARS_PER_TASK),
			)
		})
		.collect();

	format!("Context:\n\n{}", blocks.join("\n\n"))
}
