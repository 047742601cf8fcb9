use serde::Serialize;

use pilot_domain::task::Scope;

use crate::{
	Error, Result, VectorQuery,
	index::DEFAULT_SEARCH_LIMIT,
	tasks::TaskService,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
	pub query: String,
	pub limit: Option<u32>,
	pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
	pub memo_id: String,
	pub memo_url: String,
	pub content: String,
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchHit>,
	pub count: usize,
}

impl TaskService {
	/// Vector search hydrated with the current task content from the note store.
	pub async fn search(&self, scope: &Scope, request: &SearchRequest) -> Result<SearchResponse> {
		let query = request.query.trim();

		if query.is_empty() {
			return Err(Error::invalid_request("Search query is empty."));
		}

		let Some(index) = self.index.as_ref() else {
			return Err(Error::SearchUnavailable);
		};
		let vector_query = VectorQuery {
			query: query.to_string(),
			limit: request.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_SEARCH_LIMIT),
			tags: request.tags.clone(),
		};
		let hits = index.search_tasks(&vector_query).await?;
		let mut results = Vec::with_capacity(hits.len());

		for hit in hits {
			match self.notes.get_task(&hit.memo_id).await {
				Ok(task) => results.push(SearchHit {
					memo_id: hit.memo_id,
					memo_url: task.memo_url,
					content: task.content,
					score: hit.score,
				}),
				Err(err) => {
					tracing::warn!(
						user_id = %scope.user_id,
						memo_id = %hit.memo_id,
						error = %err,
						"Failed to hydrate search hit. Skipping."
					);
				},
			}
		}

		Ok(SearchResponse { count: results.len(), results })
	}
}
