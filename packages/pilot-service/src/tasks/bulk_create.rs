use chrono::Duration;
use chrono_tz::Tz;
use serde::Serialize;

use pilot_domain::{
	dates,
	task::{ParsedTask, Scope, Task, TaskWithDate, Visibility},
	text,
};
use pilot_providers::{GenerateRequest, Message};
use pilot_storage::{calendar::NewEvent, memos::CreateTaskOptions};

use crate::{Error, Result, tasks::TaskService};

pub const PARSE_TEMPERATURE: f32 = 0.2;
pub const PARSE_MAX_TOKENS: u32 = 2_048;
pub const MIN_EVENT_MINUTES: u32 = 60;

const PARSE_INSTRUCTION: &str = r##"You turn a user's free-form message into a list of tasks.

Return ONLY a JSON array. No prose, no markdown, no code fences.
Each element has exactly these fields:
- "title": short imperative title.
- "description": one or two sentences of detail, or "".
- "due_date_relative": one of "today", "tomorrow", "yesterday", "in N days", "in N weeks", "in N months", "next monday" .. "next sunday", or a bare weekday such as "friday".
- "priority": one of "p0" (urgent), "p1" (high), "p2" (normal), "p3" (low). Use "p2" when unsure.
- "tags": array of "#category/value" tags such as "#project/smap" or "#type/review".
- "estimated_duration_minutes": integer, at least 15.

If the message contains no actionable task, return [].

Example input: "finish SMAP report tomorrow, review Ahamove code today p1"
Example output:
[{"title":"Finish SMAP report","description":"","due_date_relative":"tomorrow","priority":"p2","tags":["#project/smap","#type/report"],"estimated_duration_minutes":120},{"title":"Review Ahamove code","description":"","due_date_relative":"today","priority":"p1","tags":["#project/ahamove","#type/review"],"estimated_duration_minutes":60}]"##;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBulkRequest {
	pub raw_text: String,
	pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedTask {
	pub task: Task,
	pub title: String,
	pub due_date: String,
	pub priority: String,
	/// Empty when no calendar is configured or the event could not be created.
	pub calendar_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateBulkResponse {
	pub tasks: Vec<CreatedTask>,
	pub task_count: usize,
}

impl TaskService {
	pub async fn create_bulk(
		&self,
		scope: &Scope,
		request: &CreateBulkRequest,
	) -> Result<CreateBulkResponse> {
		self.create_bulk_at(scope, request, self.now()).await
	}

	/// Same as [`TaskService::create_bulk`] with relative dates resolved against `now`.
	pub async fn create_bulk_at(
		&self,
		scope: &Scope,
		request: &CreateBulkRequest,
		now: chrono::DateTime<Tz>,
	) -> Result<CreateBulkResponse> {
		if request.raw_text.trim().is_empty() {
			return Err(Error::EmptyInput);
		}

		let parsed = self.parse_tasks(&request.raw_text).await?;
		let mut created = Vec::with_capacity(parsed.len());

		for task in parsed {
			let resolved = TaskWithDate::resolve(task, now);
			let opts = CreateTaskOptions {
				content: resolved.render_body(),
				visibility: Visibility::Private,
				tags: resolved.parsed.store_tags(),
			};
			let stored = match self.notes.create_task(&opts).await {
				Ok(stored) => stored,
				Err(err) => {
					tracing::warn!(
						user_id = %scope.user_id,
						title = %resolved.parsed.title,
						error = %err,
						"Failed to write task. Skipping."
					);

					continue;
				},
			};
			let calendar_link = self.mirror_to_calendar(&resolved, &stored).await;

			created.push(CreatedTask {
				title: resolved.parsed.title.trim().to_string(),
				due_date: dates::format_ymd(&resolved.due_date_absolute),
				priority: resolved.parsed.priority(),
				calendar_link,
				task: stored,
			});
		}

		if created.is_empty() {
			return Err(Error::NoteStore { message: "No task could be saved.".to_string() });
		}

		tracing::info!(
			user_id = %scope.user_id,
			chat_id = request.chat_id,
			task_count = created.len(),
			"Created tasks from chat message."
		);

		Ok(CreateBulkResponse { task_count: created.len(), tasks: created })
	}

	pub async fn parse_tasks(&self, raw_text: &str) -> Result<Vec<ParsedTask>> {
		let request = GenerateRequest::new(vec![Message::user(raw_text.trim())])
			.with_system(PARSE_INSTRUCTION)
			.with_temperature(PARSE_TEMPERATURE)
			.with_max_tokens(PARSE_MAX_TOKENS);
		let response = self.llm.generate(&request).await?;
		let reply = response.text().unwrap_or_default();

		parse_task_array(&reply)
	}

	async fn mirror_to_calendar(&self, resolved: &TaskWithDate, stored: &Task) -> String {
		let Some(calendar) = self.calendar.as_ref() else {
			return String::new();
		};
		let minutes = resolved.parsed.estimated_duration_minutes.max(MIN_EVENT_MINUTES);
		let start_time = resolved.due_date_absolute.fixed_offset();
		let description = resolved.parsed.description.trim();
		let memo_line = format!("📝 Memos: {}", stored.memo_url);
		let event = NewEvent {
			calendar_id: None,
			summary: resolved.parsed.title.trim().to_string(),
			description: if description.is_empty() {
				memo_line
			} else {
				format!("{description}\n\n{memo_line}")
			},
			start_time,
			end_time: start_time + Duration::minutes(i64::from(minutes)),
			timezone: self.timezone.name().to_string(),
		};

		match calendar.create_event(&event).await {
			Ok(created) => created.html_link,
			Err(err) => {
				tracing::warn!(
					memo_id = %stored.id,
					error = %err,
					"Failed to create calendar event."
				);

				String::new()
			},
		}
	}
}

/// Extracts parsed tasks from a model reply. Unusable replies yield [`Error::NoTasksParsed`].
pub fn parse_task_array(reply: &str) -> Result<Vec<ParsedTask>> {
	let payload = text::sanitize_json_payload(reply);
	let parsed = match serde_json::from_str::<Vec<ParsedTask>>(payload) {
		Ok(tasks) => tasks,
		Err(array_err) => match serde_json::from_str::<ParsedTask>(payload) {
			Ok(task) => vec![task],
			Err(_) => {
				tracing::warn!(error = %array_err, "Task parser reply is not a task array.");

				return Err(Error::NoTasksParsed);
			},
		},
	};
	let tasks: Vec<ParsedTask> =
		parsed.into_iter().filter(|task| !task.title.trim().is_empty()).collect();

	if tasks.is_empty() {
		return Err(Error::NoTasksParsed);
	}

	Ok(tasks)
}
