//! Thin client for the Memos `/api/v1` REST surface.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use pilot_domain::{
	markdown,
	task::{self, Task, Visibility},
};

use crate::{Error, Result};

pub const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskOptions {
	pub content: String,
	pub visibility: Visibility,
	pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTasksOptions {
	pub tag: Option<String>,
	pub limit: u32,
	pub offset: u32,
}
impl Default for ListTasksOptions {
	fn default() -> Self {
		Self { tag: None, limit: DEFAULT_LIST_LIMIT, offset: 0 }
	}
}

pub struct MemosClient {
	base_url: String,
	token: String,
	client: Client,
}
impl MemosClient {
	pub fn new(cfg: &pilot_config::Memos) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			base_url: cfg.base_url.trim_end_matches('/').to_string(),
			token: cfg.token.clone(),
			client,
		})
	}

	pub fn memo_url(&self, uid: &str) -> String {
		format!("{}/m/{uid}", self.base_url)
	}

	pub async fn create_task(&self, opts: &CreateTaskOptions) -> Result<Task> {
		let body = CreateMemoBody {
			content: markdown::append_tag_line(&opts.content, &opts.tags),
			visibility: opts.visibility.as_str(),
		};
		let response = self
			.client
			.post(format!("{}/api/v1/memos", self.base_url))
			.bearer_auth(&self.token)
			.json(&body)
			.send()
			.await?;
		let memo: Memo = crate::ensure_success("memos", response).await?.json().await?;

		Ok(self.to_task(memo))
	}

	/// Creates each task in turn. Failures are logged and left out of the result.
	pub async fn create_tasks_batch(&self, batch: &[CreateTaskOptions]) -> Vec<Task> {
		let mut created = Vec::with_capacity(batch.len());

		for (index, opts) in batch.iter().enumerate() {
			match self.create_task(opts).await {
				Ok(task) => created.push(task),
				Err(err) => {
					tracing::warn!(index, error = %err, "Failed to create memo in batch.");
				},
			}
		}

		created
	}

	pub async fn get_task(&self, id: &str) -> Result<Task> {
		let name = task::normalize_task_id(id);
		let response = self
			.client
			.get(format!("{}/api/v1/{name}", self.base_url))
			.bearer_auth(&self.token)
			.send()
			.await?;
		let memo: Memo = crate::ensure_success("memos", response).await?.json().await?;

		Ok(self.to_task(memo))
	}

	pub async fn update_task(&self, id: &str, content: &str) -> Result<()> {
		let name = task::normalize_task_id(id);
		let response = self
			.client
			.patch(format!("{}/api/v1/{name}", self.base_url))
			.query(&[("updateMask", "content")])
			.bearer_auth(&self.token)
			.json(&serde_json::json!({ "name": name, "content": content }))
			.send()
			.await?;

		crate::ensure_success("memos", response).await?;

		Ok(())
	}

	/// Lists recent memos, optionally narrowed to one tag.
	///
	/// The server pages by token, so `offset` is applied client-side.
	pub async fn list_tasks(&self, opts: &ListTasksOptions) -> Result<Vec<Task>> {
		let page_size = opts.limit.saturating_add(opts.offset).max(1);
		let mut query = vec![("pageSize".to_string(), page_size.to_string())];

		if let Some(tag) = opts.tag.as_deref() {
			let tag = tag.trim_start_matches('#');

			if tag.is_empty() {
				return Err(Error::InvalidArgument("Tag filter must be non-empty.".to_string()));
			}

			query.push(("filter".to_string(), format!("tag in [\"{tag}\"]")));
		}

		let response = self
			.client
			.get(format!("{}/api/v1/memos", self.base_url))
			.query(&query)
			.bearer_auth(&self.token)
			.send()
			.await?;
		let page: ListMemosResponse = crate::ensure_success("memos", response).await?.json().await?;

		Ok(page
			.memos
			.into_iter()
			.skip(opts.offset as usize)
			.take(opts.limit as usize)
			.map(|memo| self.to_task(memo))
			.collect())
	}

	fn to_task(&self, memo: Memo) -> Task {
		let uid = if memo.uid.is_empty() {
			task::uid_from_name(&memo.name).to_string()
		} else {
			memo.uid.clone()
		};
		let id = if memo.name.is_empty() { task::normalize_task_id(&uid) } else { memo.name };
		let tags = if memo.tags.is_empty() {
			markdown::extract_tags(&memo.content)
		} else {
			memo.tags.into_iter().map(|tag| format!("#{}", tag.trim_start_matches('#'))).collect()
		};
		let visibility =
			if memo.visibility == "PUBLIC" { Visibility::Public } else { Visibility::Private };

		Task {
			memo_url: self.memo_url(&uid),
			id,
			uid,
			content: memo.content,
			tags,
			visibility,
			create_time: memo.create_time.unwrap_or_default(),
			update_time: memo.update_time.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Serialize)]
struct CreateMemoBody<'a> {
	content: String,
	visibility: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Memo {
	name: String,
	uid: String,
	content: String,
	visibility: String,
	tags: Vec<String>,
	create_time: Option<DateTime<Utc>>,
	update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListMemosResponse {
	memos: Vec<Memo>,
}
