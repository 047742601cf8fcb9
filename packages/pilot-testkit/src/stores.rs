use std::sync::{
	Mutex,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use chrono::Utc;
use serde_json::{Map, Value};

use pilot_domain::{
	markdown,
	task::{self, Task, Visibility},
};
use pilot_service::{
	BoxFuture, Error, NoteStore, PayloadFilter, Result, SearchResult, VectorIndex, VectorQuery,
	index::{self, PAYLOAD_CONTENT, PAYLOAD_MEMO_ID, PAYLOAD_TAGS},
};
use pilot_storage::memos::{CreateTaskOptions, ListTasksOptions};

use crate::lock;

pub const TEST_BASE_URL: &str = "https://memos.test";

/// Note store kept in a vector, with call counters and injectable failures.
#[derive(Debug, Default)]
pub struct MemoryNotes {
	tasks: Mutex<Vec<Task>>,
	next_uid: AtomicUsize,
	creates: Mutex<Vec<CreateTaskOptions>>,
	updates: Mutex<Vec<(String, String)>>,
	gets: AtomicUsize,
	lists: Mutex<Vec<ListTasksOptions>>,
	failing_gets: AtomicUsize,
	failing_creates: Mutex<Vec<String>>,
	fail_updates: AtomicBool,
}
impl MemoryNotes {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a task directly, bypassing the call counters.
	pub fn seed(&self, content: &str) -> Task {
		let task = self.build(content.to_string(), Visibility::Private);

		lock(&self.tasks).push(task.clone());

		task
	}

	pub fn task(&self, id: &str) -> Option<Task> {
		let id = task::normalize_task_id(id);

		lock(&self.tasks).iter().find(|task| task.id == id).cloned()
	}

	pub fn tasks(&self) -> Vec<Task> {
		lock(&self.tasks).clone()
	}

	pub fn creates(&self) -> Vec<CreateTaskOptions> {
		lock(&self.creates).clone()
	}

	/// Successful updates as `(id, content)`.
	pub fn updates(&self) -> Vec<(String, String)> {
		lock(&self.updates).clone()
	}

	pub fn gets(&self) -> usize {
		self.gets.load(Ordering::SeqCst)
	}

	pub fn lists(&self) -> Vec<ListTasksOptions> {
		lock(&self.lists).clone()
	}

	/// The next `count` `get_task` calls fail.
	pub fn fail_next_gets(&self, count: usize) {
		self.failing_gets.store(count, Ordering::SeqCst);
	}

	/// Creates whose content contains `needle` fail.
	pub fn fail_creates_containing(&self, needle: &str) {
		lock(&self.failing_creates).push(needle.to_string());
	}

	pub fn fail_updates(&self, fail: bool) {
		self.fail_updates.store(fail, Ordering::SeqCst);
	}

	fn build(&self, content: String, visibility: Visibility) -> Task {
		let uid = format!("t{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1);
		let now = Utc::now();

		Task {
			id: task::normalize_task_id(&uid),
			memo_url: format!("{TEST_BASE_URL}/m/{uid}"),
			uid,
			tags: markdown::extract_tags(&content),
			content,
			visibility,
			create_time: now,
			update_time: now,
		}
	}

	fn injected() -> Error {
		Error::NoteStore { message: "Injected failure.".to_string() }
	}
}

impl NoteStore for MemoryNotes {
	fn create_task<'a>(&'a self, opts: &'a CreateTaskOptions) -> BoxFuture<'a, Result<Task>> {
		Box::pin(async move {
			lock(&self.creates).push(opts.clone());

			if lock(&self.failing_creates).iter().any(|needle| opts.content.contains(needle)) {
				return Err(Self::injected());
			}

			let content = markdown::append_tag_line(&opts.content, &opts.tags);
			let task = self.build(content, opts.visibility);

			lock(&self.tasks).push(task.clone());

			Ok(task)
		})
	}

	fn get_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Task>> {
		Box::pin(async move {
			self.gets.fetch_add(1, Ordering::SeqCst);

			let failing = self
				.failing_gets
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
				.is_ok();

			if failing {
				return Err(Self::injected());
			}

			self.task(id).ok_or_else(|| Error::NotFound { message: format!("{id} not found.") })
		})
	}

	fn update_task<'a>(&'a self, id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.fail_updates.load(Ordering::SeqCst) {
				return Err(Self::injected());
			}

			let id = task::normalize_task_id(id);
			let mut tasks = lock(&self.tasks);
			let Some(stored) = tasks.iter_mut().find(|task| task.id == id) else {
				return Err(Error::NotFound { message: format!("{id} not found.") });
			};

			stored.content = content.to_string();
			stored.tags = markdown::extract_tags(content);
			stored.update_time = Utc::now();

			lock(&self.updates).push((id, content.to_string()));

			Ok(())
		})
	}

	fn list_tasks<'a>(&'a self, opts: &'a ListTasksOptions) -> BoxFuture<'a, Result<Vec<Task>>> {
		Box::pin(async move {
			lock(&self.lists).push(opts.clone());

			let tag = opts.tag.as_deref().map(|tag| format!("#{}", tag.trim_start_matches('#')));

			Ok(lock(&self.tasks)
				.iter()
				.filter(|task| tag.as_ref().is_none_or(|tag| task.tags.contains(tag)))
				.skip(opts.offset as usize)
				.take(opts.limit as usize)
				.cloned()
				.collect())
		})
	}
}

/// Vector index over stored payloads. Scores are the share of query terms found in the content.
#[derive(Debug, Default)]
pub struct MemoryIndex {
	points: Mutex<Vec<Map<String, Value>>>,
	embeds: AtomicUsize,
	deletes: AtomicUsize,
	searches: Mutex<Vec<VectorQuery>>,
	filter_searches: Mutex<Vec<PayloadFilter>>,
	failing_embeds: AtomicUsize,
	fail_searches: AtomicBool,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Indexes a task directly, bypassing the call counters.
	pub fn seed(&self, task: &Task) {
		self.upsert(index::task_payload(task));
	}

	pub fn contains(&self, memo_id: &str) -> bool {
		lock(&self.points).iter().any(|payload| payload_str(payload, PAYLOAD_MEMO_ID) == memo_id)
	}

	pub fn payload(&self, memo_id: &str) -> Option<Map<String, Value>> {
		lock(&self.points)
			.iter()
			.find(|payload| payload_str(payload, PAYLOAD_MEMO_ID) == memo_id)
			.cloned()
	}

	pub fn embeds(&self) -> usize {
		self.embeds.load(Ordering::SeqCst)
	}

	pub fn deletes(&self) -> usize {
		self.deletes.load(Ordering::SeqCst)
	}

	pub fn searches(&self) -> Vec<VectorQuery> {
		lock(&self.searches).clone()
	}

	pub fn filter_searches(&self) -> Vec<PayloadFilter> {
		lock(&self.filter_searches).clone()
	}

	/// The next `count` `embed_task` calls fail.
	pub fn fail_next_embeds(&self, count: usize) {
		self.failing_embeds.store(count, Ordering::SeqCst);
	}

	pub fn fail_searches(&self, fail: bool) {
		self.fail_searches.store(fail, Ordering::SeqCst);
	}

	fn upsert(&self, payload: Map<String, Value>) {
		let memo_id = payload_str(&payload, PAYLOAD_MEMO_ID).to_string();
		let mut points = lock(&self.points);

		points.retain(|existing| payload_str(existing, PAYLOAD_MEMO_ID) != memo_id);
		points.push(payload);
	}

	fn injected() -> Error {
		Error::VectorStore { message: "Injected failure.".to_string() }
	}
}

impl VectorIndex for MemoryIndex {
	fn embed_task<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.embeds.fetch_add(1, Ordering::SeqCst);

			let failing = self
				.failing_embeds
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
				.is_ok();

			if failing {
				return Err(Self::injected());
			}

			self.upsert(index::task_payload(task));

			Ok(())
		})
	}

	fn search_tasks<'a>(
		&'a self,
		query: &'a VectorQuery,
	) -> BoxFuture<'a, Result<Vec<SearchResult>>> {
		Box::pin(async move {
			lock(&self.searches).push(query.clone());

			if self.fail_searches.load(Ordering::SeqCst) {
				return Err(Self::injected());
			}

			let terms = terms(&query.query);
			let mut hits: Vec<SearchResult> = lock(&self.points)
				.iter()
				.filter(|payload| {
					query.tags.is_empty() || has_any(payload, PAYLOAD_TAGS, &query.tags)
				})
				.filter_map(|payload| {
					let content = payload_str(payload, PAYLOAD_CONTENT).to_lowercase();
					let found = terms.iter().filter(|term| content.contains(term.as_str())).count();

					if found == 0 {
						return None;
					}

					SearchResult::from_payload(found as f32 / terms.len() as f32, payload.clone())
				})
				.collect();

			hits.sort_by(|a, b| b.score.total_cmp(&a.score));
			hits.truncate(query.limit as usize);

			Ok(hits)
		})
	}

	fn search_tasks_with_filter<'a>(
		&'a self,
		filter: &'a PayloadFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchResult>>> {
		Box::pin(async move {
			lock(&self.filter_searches).push(filter.clone());

			if self.fail_searches.load(Ordering::SeqCst) {
				return Err(Self::injected());
			}

			Ok(lock(&self.points)
				.iter()
				.filter(|payload| {
					filter.should.iter().any(|clause| has_any(payload, &clause.key, &clause.any))
				})
				.take(limit as usize)
				.filter_map(|payload| SearchResult::from_payload(1.0, payload.clone()))
				.collect())
		})
	}

	fn delete_task<'a>(&'a self, memo_id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.deletes.fetch_add(1, Ordering::SeqCst);
			lock(&self.points).retain(|payload| payload_str(payload, PAYLOAD_MEMO_ID) != memo_id);

			Ok(())
		})
	}
}

fn payload_str<'a>(payload: &'a Map<String, Value>, key: &str) -> &'a str {
	payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn has_any(payload: &Map<String, Value>, key: &str, wanted: &[String]) -> bool {
	match payload.get(key) {
		Some(Value::Array(values)) => values
			.iter()
			.filter_map(Value::as_str)
			.any(|value| wanted.iter().any(|candidate| candidate == value)),
		Some(Value::String(value)) => wanted.iter().any(|candidate| candidate == value),
		_ => false,
	}
}

fn terms(query: &str) -> Vec<String> {
	let mut terms: Vec<String> = Vec::new();

	for term in query.split(|ch: char| !ch.is_alphanumeric()).map(str::to_lowercase) {
		if !term.is_empty() && term != "or" && !terms.contains(&term) {
			terms.push(term);
		}
	}

	terms
}
