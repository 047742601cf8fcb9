use std::sync::Arc;

use serde_json::{Map, Value, json};

use pilot_domain::{
	checklist::{self, ChecklistStats},
	task::{self, Scope},
};

use crate::{
	BoxFuture, NoteStore, Result,
	tools::{self, Tool},
};

pub const PROGRESS_NAME: &str = "get_checklist_progress";
pub const UPDATE_NAME: &str = "update_checklist_item";

pub const NO_CHECKLIST: &str = "This task has no checklist.";

/// One-line progress description shared by the tools and chat commands.
pub fn progress_summary(stats: &ChecklistStats) -> String {
	if stats.total == 0 {
		return NO_CHECKLIST.to_string();
	}

	let summary = format!(
		"{}/{} items done ({:.0}%), {} pending.",
		stats.completed, stats.total, stats.progress, stats.pending
	);

	if stats.is_complete() { format!("✅ {summary} All done!") } else { summary }
}

pub struct ChecklistProgressTool {
	notes: Arc<dyn NoteStore>,
}
impl ChecklistProgressTool {
	pub fn new(notes: Arc<dyn NoteStore>) -> Self {
		Self { notes }
	}

	async fn run(&self, args: &Map<String, Value>) -> Result<Value> {
		let task_id = task::normalize_task_id(tools::required_str(args, "task_id")?);
		let stored = self.notes.get_task(&task_id).await?;
		let stats = checklist::stats(&stored.content);

		Ok(json!({
			"task_id": task_id,
			"stats": stats,
			"checkboxes": checklist::parse(&stored.content),
			"summary": progress_summary(&stats),
		}))
	}
}

impl Tool for ChecklistProgressTool {
	fn name(&self) -> &str {
		PROGRESS_NAME
	}

	fn description(&self) -> &str {
		"Reports how many checklist items of a task are done, with every item and its state."
	}

	fn parameters(&self) -> Value {
		json!({
			"type": "object",
			"properties": {
				"task_id": { "type": "string", "description": "Task id such as memos/abc or abc." }
			},
			"required": ["task_id"]
		})
	}

	fn invoke<'a>(
		&'a self,
		_scope: &'a Scope,
		args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.run(args))
	}
}

pub struct UpdateChecklistItemTool {
	notes: Arc<dyn NoteStore>,
}
impl UpdateChecklistItemTool {
	pub fn new(notes: Arc<dyn NoteStore>) -> Self {
		Self { notes }
	}

	async fn run(&self, args: &Map<String, Value>) -> Result<Value> {
		let task_id = task::normalize_task_id(tools::required_str(args, "task_id")?);
		let item_text = tools::required_str(args, "item_text")?;
		let checked = tools::required_bool(args, "checked")?;
		let stored = self.notes.get_task(&task_id).await?;
		let outcome = checklist::update_one(&stored.content, item_text, checked);
		let changed = outcome.content != stored.content;

		if changed {
			self.notes.update_task(&task_id, &outcome.content).await?;
		}

		let state = if checked { "checked" } else { "unchecked" };
		let summary = if outcome.updated {
			format!("Marked {} item(s) matching \"{item_text}\" as {state}.", outcome.count)
		} else {
			format!("No checklist item matches \"{item_text}\". Nothing changed.")
		};

		Ok(json!({
			"task_id": task_id,
			"updated": outcome.updated,
			"changed": changed,
			"count": outcome.count,
			"summary": summary,
		}))
	}
}

impl Tool for UpdateChecklistItemTool {
	fn name(&self) -> &str {
		UPDATE_NAME
	}

	fn description(&self) -> &str {
		"Checks or unchecks every checklist item of a task whose text contains item_text (case-insensitive)."
	}

	fn parameters(&self) -> Value {
		json!({
			"type": "object",
			"properties": {
				"task_id": { "type": "string", "description": "Task id such as memos/abc or abc." },
				"item_text": { "type": "string", "description": "Part of the item text." },
				"checked": { "type": "boolean", "description": "true to check, false to uncheck." }
			},
			"required": ["task_id", "item_text", "checked"]
		})
	}

	fn invoke<'a>(
		&'a self,
		_scope: &'a Scope,
		args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.run(args))
	}
}
