use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use serde_json::{Value, json};

use pilot_service::{
	Error,
	tools::{
		ToolRegistry,
		calendar::{self, CheckCalendarTool},
		checklist::{self as checklist_tools, UpdateChecklistItemTool},
		search::{self, SearchTasksTool},
	},
};
use pilot_storage::calendar::CalendarEvent;
use pilot_testkit::{FakeCalendar, Reply};

use super::{Harness, scope};

fn harness() -> Harness {
	Harness::new(Vec::<Reply>::new())
}

fn registry(harness: &Harness) -> ToolRegistry {
	let calendar = harness.calendar().expect("Calendar must be configured.");

	ToolRegistry::new(vec![
		Arc::new(SearchTasksTool::new(harness.tasks())),
		Arc::new(UpdateChecklistItemTool::new(harness.notes())),
		Arc::new(CheckCalendarTool::new(calendar)),
	])
	.expect("Tool names must be unique.")
}

async fn invoke(registry: &ToolRegistry, name: &str, args: Value) -> Result<Value, Error> {
	let Value::Object(args) = args else {
		panic!("Arguments must be an object.");
	};
	let tool = registry.get(name).expect("Tool must be registered.");

	tool.invoke(&scope(), &args).await
}

fn standup() -> CalendarEvent {
	let offset = FixedOffset::east_opt(7 * 3_600).expect("Offset must be valid.");
	let start = offset.with_ymd_and_hms(2026, 10, 22, 9, 0, 0).single();

	CalendarEvent {
		id: "evt-standup".to_string(),
		html_link: "https://calendar.test/event/evt-standup".to_string(),
		summary: "Standup".to_string(),
		start,
		end: start.map(|start| start + chrono::Duration::minutes(15)),
	}
}

#[tokio::test]
async fn calendar_events_flag_a_conflict() {
	let mut harness = harness();

	harness.calendar = Arc::new(FakeCalendar::with_events(vec![standup()]));

	let output = invoke(
		&registry(&harness),
		calendar::NAME,
		json!({ "start_date": "2026-10-22", "end_date": "2026-10-22" }),
	)
	.await
	.expect("Calendar lookup must succeed.");

	assert_eq!(output["has_conflict"], true);
	assert_eq!(output["event_count"], 1);
	assert_eq!(output["events"][0]["id"], "evt-standup");
	assert_eq!(output["summary"], "1 event(s) between 2026-10-22 and 2026-10-22.");

	let windows = harness.calendar.windows();

	assert_eq!(windows.len(), 1);
	assert_eq!(windows[0].time_min.to_rfc3339(), "2026-10-22T00:00:00+07:00");
	assert_eq!(windows[0].time_max.to_rfc3339(), "2026-10-22T23:59:59+07:00");
}

#[tokio::test]
async fn free_calendar_has_no_conflict() {
	let harness = harness();
	let output = invoke(
		&registry(&harness),
		calendar::NAME,
		json!({ "start_date": "2026-10-22", "end_date": "2026-10-23" }),
	)
	.await
	.expect("Calendar lookup must succeed.");

	assert_eq!(output["has_conflict"], false);
	assert_eq!(output["event_count"], 0);
	assert!(output["summary"].as_str().is_some_and(|summary| summary.contains("free")));
}

#[tokio::test]
async fn calendar_failures_are_reported_in_the_output() {
	let harness = harness();

	harness.calendar.fail(true);

	let output = invoke(
		&registry(&harness),
		calendar::NAME,
		json!({ "start_date": "2026-10-22", "end_date": "2026-10-22" }),
	)
	.await
	.expect("Calendar failures must not fail the tool.");

	assert_eq!(output["has_conflict"], false);
	assert_eq!(output["events"], json!([]));

	let summary = output["summary"].as_str().expect("Summary must be a string.");

	assert!(summary.starts_with("Could not read the calendar:"));
	assert!(summary.contains("Injected failure."));
}

#[tokio::test]
async fn calendar_arguments_are_validated() {
	let harness = harness();
	let registry = registry(&harness);
	let reversed = invoke(
		&registry,
		calendar::NAME,
		json!({ "start_date": "2026-10-23", "end_date": "2026-10-22" }),
	)
	.await;
	let bad_zone = invoke(
		&registry,
		calendar::NAME,
		json!({ "start_date": "2026-10-22", "end_date": "2026-10-22", "time_zone": "Mars/Base" }),
	)
	.await;

	assert!(matches!(reversed, Err(Error::InvalidRequest { .. })));
	assert!(matches!(bad_zone, Err(Error::InvalidRequest { .. })));
	assert!(harness.calendar.windows().is_empty());
}

#[tokio::test]
async fn unmatched_checklist_item_changes_nothing() {
	let harness = harness();
	let task = harness.notes.seed("## Release\n\n- [ ] build\n- [ ] publish");
	let output = invoke(
		&registry(&harness),
		checklist_tools::UPDATE_NAME,
		json!({ "task_id": task.uid, "item_text": "deploy", "checked": true }),
	)
	.await
	.expect("Unmatched items are not an error.");

	assert_eq!(
		output,
		json!({
			"task_id": task.id,
			"updated": false,
			"changed": false,
			"count": 0,
			"summary": "No checklist item matches \"deploy\". Nothing changed.",
		})
	);
	assert!(harness.notes.updates().is_empty());
}

#[tokio::test]
async fn already_checked_items_are_not_written_back() {
	let harness = harness();
	let task = harness.notes.seed("## Release\n\n- [x] build\n- [ ] publish");
	let output = invoke(
		&registry(&harness),
		checklist_tools::UPDATE_NAME,
		json!({ "task_id": task.id, "item_text": "Build", "checked": true }),
	)
	.await
	.expect("Update must succeed.");

	assert_eq!(output["updated"], true);
	assert_eq!(output["changed"], false);
	assert_eq!(output["count"], 1);
	assert!(harness.notes.updates().is_empty());
}

#[tokio::test]
async fn search_output_lists_hydrated_results() {
	let harness = harness();
	let report = harness.notes.seed("## SMAP report\n\n- [ ] draft #work/smap");
	let groceries = harness.notes.seed("## Buy groceries");

	harness.index.seed(&report);
	harness.index.seed(&groceries);

	let output = invoke(&registry(&harness), search::NAME, json!({ "query": "SMAP report" }))
		.await
		.expect("Search must succeed.");

	assert_eq!(output["count"], 1);
	assert_eq!(output["results"].as_array().map(Vec::len), Some(1));

	let hit = &output["results"][0];

	assert_eq!(hit["memo_id"], report.id.as_str());
	assert_eq!(hit["memo_url"], report.memo_url.as_str());
	assert_eq!(hit["content"], report.content.as_str());
	assert_eq!(hit["score"].as_f64(), Some(1.0));
	assert_eq!(harness.index.searches()[0].limit, 10);
}

#[tokio::test]
async fn search_limit_is_passed_through() {
	let harness = harness();
	let args = json!({ "query": "anything", "limit": 3 });
	let output =
		invoke(&registry(&harness), search::NAME, args).await.expect("Search must succeed.");

	assert_eq!(output, json!({ "count": 0, "results": [] }));
	assert_eq!(harness.index.searches()[0].limit, 3);
}
