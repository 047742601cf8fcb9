use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{dates, markdown};

pub const MEMO_NAME_PREFIX: &str = "memos/";
pub const DEFAULT_PRIORITY: &str = "p2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
	pub id: String,
	pub uid: String,
	pub content: String,
	pub tags: Vec<String>,
	pub memo_url: String,
	pub visibility: Visibility,
	pub create_time: DateTime<Utc>,
	pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
	#[default]
	Private,
	Public,
}
impl Visibility {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Private => "PRIVATE",
			Self::Public => "PUBLIC",
		}
	}
}

/// One task as emitted by the parsing model.
///
/// Optional fields accept both a missing key and an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTask {
	pub title: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub description: String,
	#[serde(default = "default_due_date_relative", deserialize_with = "null_as_today")]
	pub due_date_relative: String,
	#[serde(default = "default_priority", deserialize_with = "null_as_default_priority")]
	pub priority: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub tags: Vec<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub estimated_duration_minutes: u32,
}
impl ParsedTask {
	/// Lower-cased `p0`..`p3`, falling back to [`DEFAULT_PRIORITY`].
	pub fn priority(&self) -> String {
		let priority = self.priority.trim().to_lowercase();

		match priority.as_str() {
			"p0" | "p1" | "p2" | "p3" => priority,
			_ => DEFAULT_PRIORITY.to_string(),
		}
	}

	pub fn priority_tag(&self) -> String {
		format!("#priority/{}", self.priority())
	}

	/// Tags sent to the note store: the priority tag first, then the parsed tags.
	pub fn store_tags(&self) -> Vec<String> {
		let mut tags = vec![self.priority_tag()];

		for tag in &self.tags {
			let tag = normalize_tag(tag);

			if !tag.is_empty() && !tags.contains(&tag) {
				tags.push(tag);
			}
		}

		tags
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskWithDate {
	pub parsed: ParsedTask,
	pub due_date_absolute: DateTime<Tz>,
}
impl TaskWithDate {
	pub fn resolve(parsed: ParsedTask, now: DateTime<Tz>) -> Self {
		let due_date_absolute = dates::resolve_relative(&parsed.due_date_relative, now);

		Self { parsed, due_date_absolute }
	}

	/// Renders the markdown body written to the note store.
	pub fn render_body(&self) -> String {
		let parsed = &self.parsed;
		let mut lines = vec![format!("## {}", parsed.title.trim()), String::new()];
		let description = parsed.description.trim();

		if !description.is_empty() {
			lines.push(description.to_string());
			lines.push(String::new());
		}

		lines.push(format!("- **Due:** {}", dates::format_ymd(&self.due_date_absolute)));
		lines.push(format!("- **Priority:** {}", parsed.priority_tag()));

		if parsed.estimated_duration_minutes > 0 {
			lines.push(format!("- **Estimated:** {} min", parsed.estimated_duration_minutes));
		}

		markdown::append_tag_line(&lines.join("\n"), &parsed.store_tags())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
	pub user_id: String,
	#[serde(default)]
	pub username: Option<String>,
}
impl Scope {
	pub fn telegram(user_id: i64, username: Option<String>) -> Self {
		Self { user_id: format!("telegram_{user_id}"), username }
	}
}

/// Accepts either a bare uid or a full `memos/<uid>` name and returns the full name.
pub fn normalize_task_id(input: &str) -> String {
	let input = input.trim();

	if input.starts_with(MEMO_NAME_PREFIX) {
		input.to_string()
	} else {
		format!("{MEMO_NAME_PREFIX}{input}")
	}
}

pub fn uid_from_name(name: &str) -> &str {
	name.strip_prefix(MEMO_NAME_PREFIX).unwrap_or(name)
}

fn normalize_tag(tag: &str) -> String {
	let tag = tag.trim();

	if tag.is_empty() || tag.starts_with('#') { tag.to_string() } else { format!("#{tag}") }
}

fn default_due_date_relative() -> String {
	"today".to_string()
}

fn default_priority() -> String {
	DEFAULT_PRIORITY.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_today<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_due_date_relative))
}

fn null_as_default_priority<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_priority))
}
