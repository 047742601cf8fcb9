use std::{collections::HashSet, sync::Arc};

use serde::Serialize;

use pilot_domain::scm::MatchCriteria;
use pilot_storage::memos::ListTasksOptions;

use crate::{NoteStore, PayloadFilter, Result, VectorIndex, VectorQuery};

pub const MATCH_LIMIT: u32 = 20;
pub const EXACT_TAG_SCORE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchReason {
	ExactTag,
	SemanticKeyword,
}
impl MatchReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ExactTag => "exact-tag",
			Self::SemanticKeyword => "semantic-keyword",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMatch {
	pub memo_id: String,
	pub score: f32,
	pub reason: MatchReason,
}

pub struct TaskMatcher {
	notes: Arc<dyn NoteStore>,
	index: Option<Arc<dyn VectorIndex>>,
	limit: u32,
}
impl TaskMatcher {
	pub fn new(notes: Arc<dyn NoteStore>, index: Option<Arc<dyn VectorIndex>>, limit: u32) -> Self {
		Self { notes, index, limit: limit.max(1) }
	}

	/// Runs the exact-tag and keyword strategies concurrently. A failing strategy contributes
	/// no matches.
	pub async fn find(&self, criteria: &MatchCriteria) -> Vec<TaskMatch> {
		let (by_tag, by_keyword) = tokio::join!(self.exact_tag(criteria), self.semantic(criteria));
		let by_tag = by_tag.unwrap_or_else(|err| {
			tracing::warn!(
				strategy = MatchReason::ExactTag.as_str(),
				error = %err,
				"Task matching failed."
			);

			Vec::new()
		});
		let by_keyword = by_keyword.unwrap_or_else(|err| {
			tracing::warn!(
				strategy = MatchReason::SemanticKeyword.as_str(),
				error = %err,
				"Task matching failed."
			);

			Vec::new()
		});

		merge(by_tag, by_keyword)
	}

	async fn exact_tag(&self, criteria: &MatchCriteria) -> Result<Vec<TaskMatch>> {
		if criteria.tags.is_empty() {
			return Ok(Vec::new());
		}

		let memo_ids = match self.index.as_ref() {
			Some(index) => index
				.search_tasks_with_filter(&PayloadFilter::any_tag(&criteria.tags), self.limit)
				.await?
				.into_iter()
				.map(|hit| hit.memo_id)
				.collect(),
			None => self.list_by_tags(&criteria.tags).await?,
		};

		Ok(memo_ids
			.into_iter()
			.map(|memo_id| TaskMatch {
				memo_id,
				score: EXACT_TAG_SCORE,
				reason: MatchReason::ExactTag,
			})
			.collect())
	}

	/// Note-store listing used when no vector index is configured.
	async fn list_by_tags(&self, tags: &[String]) -> Result<Vec<String>> {
		let mut memo_ids = Vec::new();

		for tag in tags {
			let opts = ListTasksOptions { tag: Some(tag.clone()), limit: self.limit, offset: 0 };

			for task in self.notes.list_tasks(&opts).await? {
				// Server-side tag filters may match by prefix; `#pr/42` must not match `#pr/420`.
				let tagged = task.tags.iter().any(|candidate| candidate == tag);

				if tagged && !memo_ids.contains(&task.id) {
					memo_ids.push(task.id);
				}
			}
		}

		Ok(memo_ids)
	}

	async fn semantic(&self, criteria: &MatchCriteria) -> Result<Vec<TaskMatch>> {
		let Some(index) = self.index.as_ref() else {
			return Ok(Vec::new());
		};

		if criteria.keywords.is_empty() {
			return Ok(Vec::new());
		}

		let query =
			VectorQuery { query: criteria.keyword_query(), limit: self.limit, tags: Vec::new() };
		let hits = index.search_tasks(&query).await?;

		Ok(hits
			.into_iter()
			.filter(|hit| criteria.mentions_keyword(hit.content()))
			.map(|hit| TaskMatch {
				memo_id: hit.memo_id,
				score: hit.score,
				reason: MatchReason::SemanticKeyword,
			})
			.collect())
	}
}

/// Tag matches first, then keyword matches, de-duplicated by memo id.
pub fn merge(by_tag: Vec<TaskMatch>, by_keyword: Vec<TaskMatch>) -> Vec<TaskMatch> {
	let mut seen = HashSet::new();

	by_tag
		.into_iter()
		.chain(by_keyword)
		.filter(|found| seen.insert(found.memo_id.clone()))
		.collect()
}
