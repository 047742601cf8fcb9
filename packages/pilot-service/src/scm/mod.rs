//! Completes task checklists when source-control events reference them.

pub mod matcher;

use std::sync::Arc;

use serde::Serialize;

use pilot_domain::{
	checklist,
	scm::{MatchCriteria, WebhookEvent},
};

use crate::{NoteStore, Result, VectorIndex, scm::matcher::TaskMatcher};

pub use matcher::{MATCH_LIMIT, MatchReason, TaskMatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionReport {
	pub matched: Vec<TaskMatch>,
	pub written: Vec<String>,
	pub skipped: Vec<String>,
	pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScmOutcome {
	Ignored { reason: String },
	NoMatch,
	Processed(CompletionReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
	Written,
	NoChecklist,
	Unchanged,
}

pub struct AutoCompleter {
	notes: Arc<dyn NoteStore>,
	matcher: TaskMatcher,
}
impl AutoCompleter {
	pub fn new(
		notes: Arc<dyn NoteStore>,
		index: Option<Arc<dyn VectorIndex>>,
		match_limit: u32,
	) -> Self {
		if index.is_none() {
			tracing::warn!("No vector index configured. SCM matching uses exact tags only.");
		}

		Self { matcher: TaskMatcher::new(notes.clone(), index, match_limit), notes }
	}

	/// Matches the event against stored tasks and checks every box of each match.
	///
	/// Per-task failures are reported, never propagated.
	pub async fn process(&self, event: &WebhookEvent) -> Result<ScmOutcome> {
		if !event.should_process() {
			return Ok(ScmOutcome::Ignored {
				reason: format!("{:?} event with action {:?}", event.event_type, event.action),
			});
		}

		let criteria = MatchCriteria::from_event(event);

		if criteria.is_empty() {
			tracing::debug!(
				repository = %event.repository,
				"SCM event carries no task references."
			);

			return Ok(ScmOutcome::NoMatch);
		}

		let matched = self.matcher.find(&criteria).await;

		if matched.is_empty() {
			tracing::info!(
				repository = %event.repository,
				tags = ?criteria.tags,
				"No task matched the SCM event."
			);

			return Ok(ScmOutcome::NoMatch);
		}

		let mut report = CompletionReport::default();

		for found in &matched {
			match self.complete(&found.memo_id).await {
				Ok(Completion::Written) => report.written.push(found.memo_id.clone()),
				Ok(Completion::NoChecklist | Completion::Unchanged) => {
					report.skipped.push(found.memo_id.clone())
				},
				Err(err) => {
					tracing::warn!(
						memo_id = %found.memo_id,
						reason = found.reason.as_str(),
						error = %err,
						"Failed to complete matched task."
					);

					report.failed.push(found.memo_id.clone());
				},
			}
		}

		tracing::info!(
			repository = %event.repository,
			matched = matched.len(),
			written = report.written.len(),
			skipped = report.skipped.len(),
			failed = report.failed.len(),
			"SCM event processed."
		);

		report.matched = matched;

		Ok(ScmOutcome::Processed(report))
	}

	async fn complete(&self, memo_id: &str) -> Result<Completion> {
		let task = self.notes.get_task(memo_id).await?;

		if checklist::stats(&task.content).total == 0 {
			return Ok(Completion::NoChecklist);
		}

		let completed = checklist::update_all(&task.content, true);

		if completed == task.content {
			return Ok(Completion::Unchanged);
		}

		self.notes.update_task(memo_id, &completed).await?;

		tracing::info!(memo_id, "Task checklist completed from SCM event.");

		Ok(Completion::Written)
	}
}
