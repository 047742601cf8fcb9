use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

use pilot_service::{
	Error,
	tasks::{CreateBulkRequest, bulk_create::MIN_EVENT_MINUTES},
};
use pilot_testkit::Reply;

use super::{Harness, ZONE, scope};

const TWO_TASKS: &str = r##"```json
[
  {"title": "Finish SMAP report", "description": "Final numbers for Q1.", "due_date_relative": "tomorrow", "priority": "p2", "tags": ["#project/smap", "#type/report"], "estimated_duration_minutes": 30},
  {"title": "Review Ahamove code", "description": "", "due_date_relative": "today", "priority": "p1", "tags": ["project/ahamove"], "estimated_duration_minutes": 0}
]
```"##;

fn tuesday_morning() -> DateTime<Tz> {
	ZONE.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single().expect("Valid local time.")
}

fn request(raw_text: &str) -> CreateBulkRequest {
	CreateBulkRequest { raw_text: raw_text.to_string(), chat_id: 7 }
}

#[tokio::test]
async fn creates_every_parsed_task_and_mirrors_to_calendar() {
	let harness = Harness::new([Reply::text(TWO_TASKS)]);
	let response = harness
		.tasks()
		.create_bulk_at(
			&scope(),
			&request("Finish SMAP report tomorrow, review Ahamove p1 today"),
			tuesday_morning(),
		)
		.await
		.expect("Bulk create must succeed.");

	assert_eq!(response.task_count, 2);
	assert_eq!(response.tasks[0].title, "Finish SMAP report");
	assert_eq!(response.tasks[0].due_date, "2026-03-11");
	assert_eq!(response.tasks[1].title, "Review Ahamove code");
	assert_eq!(response.tasks[1].due_date, "2026-03-10");
	assert_eq!(response.tasks[1].priority, "p1");

	let creates = harness.notes.creates();

	assert_eq!(creates.len(), 2);
	assert!(creates[0].content.starts_with("## Finish SMAP report"));
	assert!(creates[0].tags.contains(&"#priority/p2".to_string()));
	assert!(creates[1].tags.contains(&"#priority/p1".to_string()));
	assert!(creates[1].tags.contains(&"#project/ahamove".to_string()));

	let stored = harness.notes.task(&response.tasks[0].task.id).expect("Task must be stored.");

	assert!(stored.tags.contains(&"#project/smap".to_string()));
	assert!(stored.tags.contains(&"#type/report".to_string()));

	let events = harness.calendar.created();

	assert_eq!(events.len(), 2);

	for event in &events {
		let minutes = (event.end_time - event.start_time).num_minutes();

		assert_eq!(minutes, i64::from(MIN_EVENT_MINUTES));
		assert_eq!(event.timezone, "Asia/Ho_Chi_Minh");
	}

	assert!(events[0].description.starts_with("Final numbers for Q1."));
	assert!(events[0].description.contains(&format!("Memos: {}", stored.memo_url)));
	assert_eq!(response.tasks[0].calendar_link, "https://calendar.test/event/evt-1");
	assert_eq!(harness.index.embeds(), 0);
	assert!(harness.index.searches().is_empty());
}

#[tokio::test]
async fn failed_writes_are_skipped() {
	let harness = Harness::new([Reply::text(TWO_TASKS)]).without_calendar();

	harness.notes.fail_creates_containing("Review Ahamove");

	let response = harness
		.tasks()
		.create_bulk_at(&scope(), &request("two things"), tuesday_morning())
		.await
		.expect("Partial success is still success.");

	assert_eq!(response.task_count, 1);
	assert_eq!(response.tasks[0].title, "Finish SMAP report");
	assert!(response.tasks[0].calendar_link.is_empty());
	assert_eq!(harness.notes.tasks().len(), 1);
}

#[tokio::test]
async fn no_successful_write_is_an_error() {
	let harness = Harness::new([Reply::text(TWO_TASKS)]);

	harness.notes.fail_creates_containing("##");

	let result =
		harness.tasks().create_bulk_at(&scope(), &request("two things"), tuesday_morning()).await;

	assert!(matches!(result, Err(Error::NoteStore { .. })));
	assert!(harness.calendar.created().is_empty());
}

#[tokio::test]
async fn calendar_failure_keeps_the_task() {
	let harness = Harness::new([Reply::text(TWO_TASKS)]);

	harness.calendar.fail(true);

	let response = harness
		.tasks()
		.create_bulk_at(&scope(), &request("two things"), tuesday_morning())
		.await
		.expect("Calendar errors must not fail the batch.");

	assert_eq!(response.task_count, 2);
	assert!(response.tasks.iter().all(|created| created.calendar_link.is_empty()));
}

#[tokio::test]
async fn blank_input_has_no_side_effects() {
	let harness = Harness::new([Reply::text(TWO_TASKS)]);
	let result = harness.tasks().create_bulk(&scope(), &request("   ")).await;

	assert!(matches!(result, Err(Error::EmptyInput)));
	assert_eq!(harness.llm.calls(), 0);
	assert!(harness.notes.creates().is_empty());
}

#[tokio::test]
async fn conversational_input_parses_to_nothing() {
	let harness = Harness::new([Reply::text("[]")]);
	let question = "B\u{1ea1}n l\u{00e0}m \u{0111}\u{01b0}\u{1ee3}c g\u{00ec}?";
	let result = harness.tasks().create_bulk(&scope(), &request(question)).await;

	assert!(matches!(result, Err(Error::NoTasksParsed)));
	assert!(harness.notes.creates().is_empty());

	let requests = harness.llm.requests();

	assert_eq!(requests[0].temperature, 0.2);
	assert_eq!(requests[0].max_tokens, 2_048);
}
