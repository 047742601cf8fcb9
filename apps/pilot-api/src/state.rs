use std::sync::Arc;

use color_eyre::eyre;

use pilot_providers::{embedding::Embedder, factory};
use pilot_service::{
	CalendarApi, LanguageModel, Messenger, NoteStore, VectorIndex,
	agent::{Agent, session::SessionStore},
	chat::ChatHandler,
	index::TaskIndex,
	reembed::{ReEmbedder, RetryPolicy},
	router::IntentRouter,
	scm::{AutoCompleter, MATCH_LIMIT},
	supervisor::Supervisor,
	tasks::TaskService,
	tools::{
		Tool, ToolRegistry,
		calendar::CheckCalendarTool,
		checklist::{ChecklistProgressTool, UpdateChecklistItemTool},
		search::SearchTasksTool,
	},
};
use pilot_storage::{
	calendar::CalendarClient, memos::MemosClient, qdrant::QdrantStore, telegram::TelegramClient,
};

use crate::security::WebhookGuard;

pub const TELEGRAM_WEBHOOK_PATH: &str = "/webhook/telegram";

#[derive(Clone)]
pub struct AppState {
	pub chat: Arc<ChatHandler>,
	/// Absent when no vector index is configured.
	pub reembedder: Option<Arc<ReEmbedder>>,
	pub completer: Arc<AutoCompleter>,
	pub guard: Arc<WebhookGuard>,
	pub supervisor: Supervisor,
}
impl AppState {
	pub async fn new(
		config: pilot_config::Config,
		supervisor: Supervisor,
	) -> color_eyre::Result<Self> {
		let timezone = pilot_service::load_timezone(&config.service.timezone);
		let llm: Arc<dyn LanguageModel> = Arc::new(factory::build_manager(&config.providers.llm)?);
		let notes: Arc<dyn NoteStore> = Arc::new(MemosClient::new(&config.storage.memos)?);
		let index = build_index(&config).await?;
		let calendar = build_calendar(&config);
		let telegram = TelegramClient::new(&config.telegram)?;

		if let Some(public_url) = config.service.public_url.as_deref() {
			let url = format!("{public_url}{TELEGRAM_WEBHOOK_PATH}");

			match telegram.set_webhook(&url).await {
				Ok(()) => tracing::info!(url = %url, "Messenger webhook registered."),
				Err(err) => {
					tracing::error!(
						url = %url,
						error = %err,
						"Failed to register messenger webhook."
					);
				},
			}
		}

		let messenger: Arc<dyn Messenger> = Arc::new(telegram);
		let tasks = Arc::new(TaskService::new(
			llm.clone(),
			notes.clone(),
			index.clone(),
			calendar.clone(),
			timezone,
		));
		let registry = ToolRegistry::new(tools(&tasks, &notes, calendar.as_ref()))?;
		let sessions = Arc::new(SessionStore::default());
		let agent = Arc::new(Agent::new(llm.clone(), registry, sessions, timezone));
		let sweeper = agent.clone();

		supervisor.spawn_service("session-sweeper", move |cancel| async move {
			sweeper.run_sweeper(cancel).await;
		});

		let chat = ChatHandler::new(messenger, IntentRouter::new(llm), agent, tasks, notes.clone());
		let reembedder = index
			.clone()
			.map(|index| Arc::new(ReEmbedder::new(notes.clone(), index, RetryPolicy::default())));
		let completer = AutoCompleter::new(notes, index, MATCH_LIMIT);

		tracing::info!(
			timezone = %timezone,
			vector_index = reembedder.is_some(),
			calendar = calendar.is_some(),
			"Service wired."
		);

		Ok(Self {
			chat: Arc::new(chat),
			reembedder,
			completer: Arc::new(completer),
			guard: Arc::new(WebhookGuard::from_config(&config.webhooks)),
			supervisor,
		})
	}
}

/// The agent's tool set. The calendar tool is only offered when a calendar is configured.
pub fn tools(
	tasks: &Arc<TaskService>,
	notes: &Arc<dyn NoteStore>,
	calendar: Option<&Arc<dyn CalendarApi>>,
) -> Vec<Arc<dyn Tool>> {
	let mut tools: Vec<Arc<dyn Tool>> = vec![
		Arc::new(SearchTasksTool::new(tasks.clone())),
		Arc::new(ChecklistProgressTool::new(notes.clone())),
		Arc::new(UpdateChecklistItemTool::new(notes.clone())),
	];

	if let Some(calendar) = calendar {
		tools.push(Arc::new(CheckCalendarTool::new(calendar.clone())));
	}

	tools
}

async fn build_index(
	config: &pilot_config::Config,
) -> color_eyre::Result<Option<Arc<dyn VectorIndex>>> {
	let Some(qdrant) = config.storage.qdrant.as_ref() else {
		tracing::warn!("No vector store configured. Semantic search is disabled.");

		return Ok(None);
	};
	let Some(embedding) = config.providers.embedding.as_ref() else {
		return Err(eyre::eyre!("storage.qdrant requires providers.embedding."));
	};
	let store = QdrantStore::new(qdrant)?;

	store.ensure_collection().await?;

	let index = TaskIndex::new(store, Embedder::new(embedding)?);

	Ok(Some(Arc::new(index)))
}

fn build_calendar(config: &pilot_config::Config) -> Option<Arc<dyn CalendarApi>> {
	let calendar = config.calendar.as_ref()?;

	match CalendarClient::new(calendar) {
		Ok(client) => Some(Arc::new(client)),
		Err(err) => {
			tracing::warn!(error = %err, "Calendar is unavailable. Continuing without it.");

			None
		},
	}
}
