//! Semantic index of tasks over Qdrant and the embedding client.
//!
//! Point ids are derived from memo ids, so callers must always read the memo id back from
//! the `memo_id` payload field.

use qdrant_client::qdrant::{Condition, Filter};
use serde::Serialize;
use serde_json::{Map, Value};

use pilot_domain::{embedding_text, ids, markdown, task::Task};
use pilot_providers::embedding::Embedder;
use pilot_storage::qdrant::QdrantStore;

use crate::{BoxFuture, Error, Result, VectorIndex};

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

pub const PAYLOAD_MEMO_ID: &str = "memo_id";
pub const PAYLOAD_MEMO_URL: &str = "memo_url";
pub const PAYLOAD_CONTENT: &str = "content";
pub const PAYLOAD_TAGS: &str = "tags";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorQuery {
	pub query: String,
	pub limit: u32,
	/// When non-empty, hits must carry at least one of these tags.
	pub tags: Vec<String>,
}

/// One `should` clause: the payload field `key` matches any of `any`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
	pub key: String,
	pub any: Vec<String>,
}

/// Disjunction of field matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFilter {
	pub should: Vec<FieldMatch>,
}
impl PayloadFilter {
	pub fn any_tag(tags: &[String]) -> Self {
		Self { should: vec![FieldMatch { key: PAYLOAD_TAGS.to_string(), any: tags.to_vec() }] }
	}

	pub fn is_empty(&self) -> bool {
		self.should.iter().all(|clause| clause.any.is_empty())
	}

	fn to_qdrant(&self) -> Filter {
		Filter::should(
			self.should
				.iter()
				.filter(|clause| !clause.any.is_empty())
				.map(|clause| Condition::matches(clause.key.clone(), clause.any.clone())),
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	pub memo_id: String,
	pub score: f32,
	pub payload: Map<String, Value>,
}
impl SearchResult {
	/// Builds a result from a raw payload. Hits without a `memo_id` field are unusable.
	pub fn from_payload(score: f32, payload: Map<String, Value>) -> Option<Self> {
		let memo_id = payload.get(PAYLOAD_MEMO_ID)?.as_str()?.to_string();

		Some(Self { memo_id, score, payload })
	}

	pub fn content(&self) -> &str {
		self.payload.get(PAYLOAD_CONTENT).and_then(Value::as_str).unwrap_or_default()
	}

	pub fn memo_url(&self) -> &str {
		self.payload.get(PAYLOAD_MEMO_URL).and_then(Value::as_str).unwrap_or_default()
	}
}

/// Payload stored beside each task vector.
pub fn task_payload(task: &Task) -> Map<String, Value> {
	let tags = if task.tags.is_empty() {
		markdown::extract_tags(&task.content)
	} else {
		task.tags.clone()
	};
	let mut payload = Map::new();

	payload.insert(PAYLOAD_MEMO_ID.to_string(), Value::String(task.id.clone()));
	payload.insert(PAYLOAD_MEMO_URL.to_string(), Value::String(task.memo_url.clone()));
	payload.insert(PAYLOAD_CONTENT.to_string(), Value::String(task.content.clone()));
	payload.insert(
		PAYLOAD_TAGS.to_string(),
		Value::Array(tags.into_iter().map(Value::String).collect()),
	);
	payload.insert("create_time".to_string(), Value::String(task.create_time.to_rfc3339()));
	payload.insert("update_time".to_string(), Value::String(task.update_time.to_rfc3339()));

	payload
}

pub struct TaskIndex {
	store: QdrantStore,
	embedder: Embedder,
}
impl TaskIndex {
	pub fn new(store: QdrantStore, embedder: Embedder) -> Self {
		Self { store, embedder }
	}

	pub fn store(&self) -> &QdrantStore {
		&self.store
	}

	async fn embed_one(&self, text: String) -> Result<Vec<f32>> {
		let mut vectors = self.embedder.embed(&[text]).await?;

		vectors.pop().ok_or_else(|| Error::vector_store("Embedder returned no vector."))
	}

	async fn embed_task_inner(&self, task: &Task) -> Result<()> {
		let vector = self.embed_one(embedding_text::embedding_text(&task.content)).await?;
		let point_id = ids::vector_point_id(&task.id);

		self.store
			.upsert_point(point_id, vector, task_payload(task))
			.await
			.map_err(Error::vector_store)?;

		tracing::debug!(memo_id = %task.id, point_id = %point_id, "Task embedding upserted.");

		Ok(())
	}

	async fn search_inner(&self, query: &VectorQuery) -> Result<Vec<SearchResult>> {
		let vector = self.embed_one(query.query.clone()).await?;
		let filter = if query.tags.is_empty() {
			None
		} else {
			Some(PayloadFilter::any_tag(&query.tags).to_qdrant())
		};
		let hits = self
			.store
			.query_nearest(vector, query.limit.max(1), filter)
			.await
			.map_err(Error::vector_store)?;

		Ok(into_results(hits))
	}

	async fn filter_inner(&self, filter: &PayloadFilter, limit: u32) -> Result<Vec<SearchResult>> {
		if filter.is_empty() {
			return Ok(Vec::new());
		}

		let hits = self
			.store
			.scroll_filtered(filter.to_qdrant(), limit.max(1))
			.await
			.map_err(Error::vector_store)?;

		Ok(into_results(hits))
	}
}

impl VectorIndex for TaskIndex {
	fn embed_task<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.embed_task_inner(task))
	}

	fn search_tasks<'a>(
		&'a self,
		query: &'a VectorQuery,
	) -> BoxFuture<'a, Result<Vec<SearchResult>>> {
		Box::pin(self.search_inner(query))
	}

	fn search_tasks_with_filter<'a>(
		&'a self,
		filter: &'a PayloadFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchResult>>> {
		Box::pin(self.filter_inner(filter, limit))
	}

	fn delete_task<'a>(&'a self, memo_id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let point_id = ids::vector_point_id(memo_id);

			self.store.delete_point(point_id).await.map_err(Error::vector_store)
		})
	}
}

fn into_results(hits: Vec<pilot_storage::qdrant::VectorHit>) -> Vec<SearchResult> {
	hits.into_iter()
		.filter_map(|hit| {
			let point_id = hit.point_id;
			let result = SearchResult::from_payload(hit.score, hit.payload);

			if result.is_none() {
				tracing::warn!(%point_id, "Vector hit has no memo_id payload. Skipping.");
			}

			result
		})
		.collect()
}
