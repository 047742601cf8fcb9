//! Chat messenger updates: command dispatch, intent routing and replies.

use std::{fmt::Write as _, sync::Arc};

use serde::Deserialize;

use pilot_domain::{
	checklist,
	task::{self, Scope},
	text,
};

use crate::{
	Error, Messenger, NoteStore, Result,
	agent::Agent,
	router::{Classification, Intent, IntentRouter, ROUTER_HISTORY_LINES},
	tasks::{CreateBulkRequest, CreateBulkResponse, SearchRequest, SearchResponse, TaskService},
	tools::checklist::progress_summary,
};

pub const FAILURE_REPLY: &str = "Sorry, I couldn't process that. Please try again.";
pub const EMPTY_TEXT_REPLY: &str =
	"Sorry, I couldn't process an empty message. Send /help to see what I can do.";
pub const SNIPPET_CHARS: usize = 120;

const HELP_TEXT: &str = "Hi! I keep your tasks in Memos and help you stay on top of them.

Just write what you need to do, for example \"finish the report tomorrow, call the bank today p1\", and I will create the tasks.
Ask me anything about your tasks in plain language.

Commands:
/search <query> - find tasks
/ask <question> - answer a question from your tasks
/progress <task_id> - checklist progress
/complete <task_id> - check every item of a task
/check <task_id> <item text> - check matching items
/uncheck <task_id> <item text> - uncheck matching items
/reset - forget our conversation
/help - show this message";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
	pub update_id: i64,
	#[serde(default)]
	pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
	pub message_id: i64,
	#[serde(default)]
	pub from: Option<ChatUser>,
	pub chat: Chat,
	#[serde(default)]
	pub date: i64,
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUser {
	pub id: i64,
	#[serde(default)]
	pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
	pub id: i64,
	#[serde(rename = "type", default)]
	pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
	Help,
	Reset,
	Search(&'a str),
	Ask(&'a str),
	Progress(&'a str),
	Complete(&'a str),
	Check { task_id: &'a str, item: &'a str, checked: bool },
	Unknown(&'a str),
}

/// Splits `/cmd@bot args` into a command. Returns `None` for non-command text.
fn parse_command(text: &str) -> Option<Command<'_>> {
	let text = text.trim();
	let rest = text.strip_prefix('/')?;
	let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
	let name = head.split('@').next().unwrap_or_default();
	let args = args.trim();
	let command = match name {
		"start" | "help" => Command::Help,
		"reset" => Command::Reset,
		"search" => Command::Search(args),
		"ask" => Command::Ask(args),
		"progress" => Command::Progress(args),
		"complete" => Command::Complete(args),
		"check" | "uncheck" => {
			let (task_id, item) = args.split_once(char::is_whitespace).unwrap_or((args, ""));

			Command::Check { task_id, item: item.trim(), checked: name == "check" }
		},
		_ => Command::Unknown(name),
	};

	Some(command)
}

pub struct ChatHandler {
	messenger: Arc<dyn Messenger>,
	router: IntentRouter,
	agent: Arc<Agent>,
	tasks: Arc<TaskService>,
	notes: Arc<dyn NoteStore>,
}
impl ChatHandler {
	pub fn new(
		messenger: Arc<dyn Messenger>,
		router: IntentRouter,
		agent: Arc<Agent>,
		tasks: Arc<TaskService>,
		notes: Arc<dyn NoteStore>,
	) -> Self {
		Self { messenger, router, agent, tasks, notes }
	}

	/// Processes one update end to end and sends the reply.
	///
	/// Updates without a text field are ignored. Blank text gets a guidance reply.
	pub async fn handle_update(&self, update: &Update) -> Result<()> {
		let Some(message) = update.message.as_ref() else {
			tracing::debug!(update_id = update.update_id, "Update has no message. Ignoring.");

			return Ok(());
		};
		let Some(text) = message.text.as_deref().map(str::trim) else {
			tracing::debug!(update_id = update.update_id, "Message has no text. Ignoring.");

			return Ok(());
		};

		if text.is_empty() {
			tracing::info!(update_id = update.update_id, "Message text is blank.");

			return self.messenger.send_message(message.chat.id, EMPTY_TEXT_REPLY).await;
		}

		let scope = match message.from.as_ref() {
			Some(user) => Scope::telegram(user.id, user.username.clone()),
			None => Scope::telegram(message.chat.id, None),
		};
		let reply = self.reply_for(&scope, message.chat.id, text).await;

		self.messenger.send_message(message.chat.id, &reply).await
	}

	/// Computes the reply for one text message. Failures become a short apology.
	pub async fn reply_for(&self, scope: &Scope, chat_id: i64, text: &str) -> String {
		let result = match parse_command(text) {
			Some(command) => self.run_command(scope, command).await,
			None => self.route(scope, chat_id, text).await,
		};

		match result {
			Ok(reply) => reply,
			Err(err) => {
				tracing::warn!(
					user_id = %scope.user_id,
					chat_id,
					error = %err,
					"Chat message failed."
				);

				FAILURE_REPLY.to_string()
			},
		}
	}

	async fn run_command(&self, scope: &Scope, command: Command<'_>) -> Result<String> {
		match command {
			Command::Help => Ok(HELP_TEXT.to_string()),
			Command::Reset => {
				self.agent.reset_session(&scope.user_id).await;

				Ok("Conversation cleared. Let's start fresh.".to_string())
			},
			Command::Search("") => Ok("Usage: /search <query>".to_string()),
			Command::Search(query) => self.search(scope, query).await,
			Command::Ask("") => Ok("Usage: /ask <question>".to_string()),
			Command::Ask(query) => self.ask(scope, query).await,
			Command::Progress("") => Ok("Usage: /progress <task_id>".to_string()),
			Command::Progress(task_id) => self.progress(task_id).await,
			Command::Complete("") => Ok("Usage: /complete <task_id>".to_string()),
			Command::Complete(task_id) => self.complete(task_id).await,
			Command::Check { task_id, item, checked } if task_id.is_empty() || item.is_empty() => {
				let name = if checked { "check" } else { "uncheck" };

				Ok(format!("Usage: /{name} <task_id> <item text>"))
			},
			Command::Check { task_id, item, checked } => self.check(task_id, item, checked).await,
			Command::Unknown(name) => {
				Ok(format!("Unknown command /{name}. Send /help for the list."))
			},
		}
	}

	async fn route(&self, scope: &Scope, chat_id: i64, text: &str) -> Result<String> {
		let history =
			self.agent.sessions().recent_lines(&scope.user_id, ROUTER_HISTORY_LINES).await;
		let classification = match self.router.classify(text, &history).await {
			Ok(classification) => classification,
			Err(err) => {
				tracing::warn!(error = %err, "Intent routing failed. Using fallback intent.");

				Classification::fallback()
			},
		};

		tracing::info!(
			user_id = %scope.user_id,
			intent = ?classification.intent,
			confidence = classification.confidence,
			"Message classified."
		);

		match classification.intent {
			Intent::CreateTask => {
				let request = CreateBulkRequest { raw_text: text.to_string(), chat_id };

				match self.tasks.create_bulk(scope, &request).await {
					Ok(response) => Ok(render_created(&response)),
					Err(Error::NoTasksParsed) => {
						tracing::info!(
							user_id = %scope.user_id,
							"No tasks parsed. Handing over to the agent."
						);

						self.agent.process_query(scope, text).await
					},
					Err(err) => Err(err),
				}
			},
			Intent::SearchTask => self.search(scope, text).await,
			Intent::ManageChecklist | Intent::Conversation => {
				self.agent.process_query(scope, text).await
			},
		}
	}

	async fn search(&self, scope: &Scope, query: &str) -> Result<String> {
		let request = SearchRequest { query: query.to_string(), ..Default::default() };

		match self.tasks.search(scope, &request).await {
			Ok(response) => Ok(render_search(query, &response)),
			Err(Error::SearchUnavailable) => {
				Ok("Search is not available right now. Please try again later.".to_string())
			},
			Err(err) => Err(err),
		}
	}

	async fn ask(&self, scope: &Scope, query: &str) -> Result<String> {
		match self.tasks.answer_query(scope, query).await {
			Ok(response) => Ok(response.answer),
			Err(Error::SearchUnavailable) => {
				Ok("Search is not available right now. Please try again later.".to_string())
			},
			Err(err) => Err(err),
		}
	}

	async fn progress(&self, task_id: &str) -> Result<String> {
		let task_id = task::normalize_task_id(task_id);
		let stored = match self.notes.get_task(&task_id).await {
			Ok(stored) => stored,
			Err(Error::NotFound { .. }) => return Ok(not_found(&task_id)),
			Err(err) => return Err(err),
		};
		let stats = checklist::stats(&stored.content);

		Ok(format!("📋 {task_id}\n{}", progress_summary(&stats)))
	}

	async fn complete(&self, task_id: &str) -> Result<String> {
		let task_id = task::normalize_task_id(task_id);
		let stored = match self.notes.get_task(&task_id).await {
			Ok(stored) => stored,
			Err(Error::NotFound { .. }) => return Ok(not_found(&task_id)),
			Err(err) => return Err(err),
		};
		let stats = checklist::stats(&stored.content);

		if stats.total == 0 {
			return Ok(progress_summary(&stats));
		}

		let completed = checklist::update_all(&stored.content, true);

		if completed != stored.content {
			self.notes.update_task(&task_id, &completed).await?;
		}

		Ok(progress_summary(&checklist::stats(&completed)))
	}

	async fn check(&self, task_id: &str, item: &str, checked: bool) -> Result<String> {
		let task_id = task::normalize_task_id(task_id);
		let stored = match self.notes.get_task(&task_id).await {
			Ok(stored) => stored,
			Err(Error::NotFound { .. }) => return Ok(not_found(&task_id)),
			Err(err) => return Err(err),
		};
		let outcome = checklist::update_one(&stored.content, item, checked);

		if !outcome.updated {
			return Ok(format!("No checklist item matches \"{item}\"."));
		}

		if outcome.content != stored.content {
			self.notes.update_task(&task_id, &outcome.content).await?;
		}

		let state = if checked { "Checked" } else { "Unchecked" };

		Ok(format!(
			"{state} {} item(s).\n{}",
			outcome.count,
			progress_summary(&checklist::stats(&outcome.content))
		))
	}
}

fn not_found(task_id: &str) -> String {
	format!("Task {task_id} was not found.")
}

fn render_created(response: &CreateBulkResponse) -> String {
	let mut reply = format!("✅ Created {} task(s):", response.task_count);

	for (position, created) in response.tasks.iter().enumerate() {
		let _ = write!(
			reply,
			"\n\n{}. {} ({}, due {})\n🔗 {}",
			position + 1,
			created.title,
			created.priority,
			created.due_date,
			created.task.memo_url
		);

		if !created.calendar_link.is_empty() {
			let _ = write!(reply, "\n📅 {}", created.calendar_link);
		}
	}

	reply
}

fn render_search(query: &str, response: &SearchResponse) -> String {
	if response.results.is_empty() {
		return format!("No tasks found for \"{query}\".");
	}

	let mut reply = format!("🔍 Found {} task(s) for \"{query}\":", response.count);

	for (position, hit) in response.results.iter().enumerate() {
		let _ = write!(
			reply,
			"\n\n{}. {} ({:.0}%)\n🔗 {}",
			position + 1,
			snippet(&hit.content),
			hit.score * 100.0,
			hit.memo_url
		);
	}

	reply
}

/// First non-empty line without markdown heading marks, bounded in characters.
fn snippet(content: &str) -> String {
	let line = content
		.lines()
		.map(|line| line.trim().trim_start_matches('#').trim())
		.find(|line| !line.is_empty())
		.unwrap_or_default();

	text::truncate_chars(line, SNIPPET_CHARS)
}
