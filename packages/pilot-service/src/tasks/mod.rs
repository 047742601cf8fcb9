//! Task use-cases: bulk creation from free text, semantic search, and grounded answers.

pub mod answer;
pub mod bulk_create;
pub mod search;

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;

use crate::{CalendarApi, LanguageModel, NoteStore, VectorIndex};

pub use answer::AnswerResponse;
pub use bulk_create::{CreateBulkRequest, CreateBulkResponse, CreatedTask};
pub use search::{SearchHit, SearchRequest, SearchResponse};

pub struct TaskService {
	llm: Arc<dyn LanguageModel>,
	notes: Arc<dyn NoteStore>,
	index: Option<Arc<dyn VectorIndex>>,
	calendar: Option<Arc<dyn CalendarApi>>,
	timezone: Tz,
}
impl TaskService {
	pub fn new(
		llm: Arc<dyn LanguageModel>,
		notes: Arc<dyn NoteStore>,
		index: Option<Arc<dyn VectorIndex>>,
		calendar: Option<Arc<dyn CalendarApi>>,
		timezone: Tz,
	) -> Self {
		Self { llm, notes, index, calendar, timezone }
	}

	pub fn timezone(&self) -> Tz {
		self.timezone
	}

	pub fn has_index(&self) -> bool {
		self.index.is_some()
	}

	fn now(&self) -> chrono::DateTime<Tz> {
		Utc::now().with_timezone(&self.timezone)
	}
}
