use std::sync::Arc;

use serde_json::{Map, Value, json};

use pilot_domain::task::Scope;

use crate::{
	BoxFuture, Result,
	index::DEFAULT_SEARCH_LIMIT,
	tasks::{SearchRequest, TaskService},
	tools::{self, Tool},
};

pub const NAME: &str = "search_tasks";

pub struct SearchTasksTool {
	tasks: Arc<TaskService>,
}
impl SearchTasksTool {
	pub fn new(tasks: Arc<TaskService>) -> Self {
		Self { tasks }
	}

	async fn run(&self, scope: &Scope, args: &Map<String, Value>) -> Result<Value> {
		let request = SearchRequest {
			query: tools::required_str(args, "query")?.to_string(),
			limit: Some(tools::optional_u32(args, "limit")?.unwrap_or(DEFAULT_SEARCH_LIMIT)),
			tags: Vec::new(),
		};
		let response = self.tasks.search(scope, &request).await?;

		Ok(json!({ "count": response.count, "results": response.results }))
	}
}

impl Tool for SearchTasksTool {
	fn name(&self) -> &str {
		NAME
	}

	fn description(&self) -> &str {
		"Semantic search over the user's tasks. Returns matching tasks with their id, link, content and relevance score."
	}

	fn parameters(&self) -> Value {
		json!({
			"type": "object",
			"properties": {
				"query": { "type": "string", "description": "What to look for." },
				"limit": { "type": "integer", "description": "Maximum results. Defaults to 10." }
			},
			"required": ["query"]
		})
	}

	fn invoke<'a>(
		&'a self,
		scope: &'a Scope,
		args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.run(scope, args))
	}
}
