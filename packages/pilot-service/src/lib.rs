pub mod agent;
pub mod chat;
pub mod index;
pub mod reembed;
pub mod router;
pub mod scm;
pub mod supervisor;
pub mod tasks;
pub mod tools;

mod error;

pub use error::{Error, Result};
pub use pilot_providers::BoxFuture;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use pilot_domain::task::Task;
use pilot_providers::{GenerateRequest, GenerateResponse, ProviderManager};
use pilot_storage::{
	calendar::{CalendarClient, CalendarEvent, NewEvent},
	memos::{CreateTaskOptions, ListTasksOptions, MemosClient},
	telegram::TelegramClient,
};

pub use index::{PayloadFilter, SearchResult, VectorQuery};

pub trait LanguageModel
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, pilot_providers::Result<GenerateResponse>>;
}

pub trait NoteStore
where
	Self: Send + Sync,
{
	fn create_task<'a>(&'a self, opts: &'a CreateTaskOptions) -> BoxFuture<'a, Result<Task>>;

	/// Partial success: failed writes are logged and left out.
	fn create_tasks_batch<'a>(
		&'a self,
		batch: &'a [CreateTaskOptions],
	) -> BoxFuture<'a, Vec<Task>> {
		Box::pin(async move {
			let mut created = Vec::with_capacity(batch.len());

			for (index, opts) in batch.iter().enumerate() {
				match self.create_task(opts).await {
					Ok(task) => created.push(task),
					Err(err) => {
						tracing::warn!(index, error = %err, "Failed to create task in batch.");
					},
				}
			}

			created
		})
	}

	fn get_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Task>>;

	fn update_task<'a>(&'a self, id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>>;

	fn list_tasks<'a>(&'a self, opts: &'a ListTasksOptions) -> BoxFuture<'a, Result<Vec<Task>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn embed_task<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<()>>;

	fn search_tasks<'a>(&'a self, query: &'a VectorQuery)
	-> BoxFuture<'a, Result<Vec<SearchResult>>>;

	/// Payload-only lookup. No embedding is computed.
	fn search_tasks_with_filter<'a>(
		&'a self,
		filter: &'a PayloadFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchResult>>>;

	fn delete_task<'a>(&'a self, memo_id: &'a str) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWindow {
	pub calendar_id: Option<String>,
	pub time_min: DateTime<FixedOffset>,
	pub time_max: DateTime<FixedOffset>,
	pub max_results: u32,
}

pub trait CalendarApi
where
	Self: Send + Sync,
{
	fn create_event<'a>(&'a self, event: &'a NewEvent) -> BoxFuture<'a, Result<CalendarEvent>>;

	fn list_events<'a>(
		&'a self,
		window: &'a EventWindow,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>>;
}

pub trait Messenger
where
	Self: Send + Sync,
{
	fn send_message<'a>(&'a self, chat_id: i64, text: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Parses an IANA zone name, falling back to UTC with a warning.
pub fn load_timezone(name: &str) -> Tz {
	match name.trim().parse::<Tz>() {
		Ok(zone) => zone,
		Err(err) => {
			tracing::warn!(timezone = name, error = %err, "Unknown timezone. Falling back to UTC.");

			Tz::UTC
		},
	}
}

impl LanguageModel for ProviderManager {
	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, pilot_providers::Result<GenerateResponse>> {
		Box::pin(ProviderManager::generate(self, request))
	}
}

impl NoteStore for MemosClient {
	fn create_task<'a>(&'a self, opts: &'a CreateTaskOptions) -> BoxFuture<'a, Result<Task>> {
		Box::pin(async move {
			MemosClient::create_task(self, opts).await.map_err(Error::note_store)
		})
	}

	fn create_tasks_batch<'a>(
		&'a self,
		batch: &'a [CreateTaskOptions],
	) -> BoxFuture<'a, Vec<Task>> {
		Box::pin(MemosClient::create_tasks_batch(self, batch))
	}

	fn get_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Task>> {
		Box::pin(async move { MemosClient::get_task(self, id).await.map_err(Error::note_store) })
	}

	fn update_task<'a>(&'a self, id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			MemosClient::update_task(self, id, content).await.map_err(Error::note_store)
		})
	}

	fn list_tasks<'a>(&'a self, opts: &'a ListTasksOptions) -> BoxFuture<'a, Result<Vec<Task>>> {
		Box::pin(async move {
			MemosClient::list_tasks(self, opts).await.map_err(Error::note_store)
		})
	}
}

impl CalendarApi for CalendarClient {
	fn create_event<'a>(&'a self, event: &'a NewEvent) -> BoxFuture<'a, Result<CalendarEvent>> {
		Box::pin(async move {
			CalendarClient::create_event(self, event).await.map_err(Error::calendar)
		})
	}

	fn list_events<'a>(
		&'a self,
		window: &'a EventWindow,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>> {
		Box::pin(async move {
			CalendarClient::list_events(
				self,
				window.calendar_id.as_deref(),
				window.time_min,
				window.time_max,
				window.max_results,
			)
			.await
			.map_err(Error::calendar)
		})
	}
}

impl Messenger for TelegramClient {
	fn send_message<'a>(&'a self, chat_id: i64, text: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			TelegramClient::send_message(self, chat_id, text, None).await.map_err(Error::messenger)
		})
	}
}
