use chrono::Utc;

use pilot_domain::task::{Task, Visibility};
use pilot_service::{Error, NoteStore, tasks::SearchRequest};
use pilot_testkit::{Reply, TEST_BASE_URL};

use super::{Harness, scope};

fn query(text: &str) -> SearchRequest {
	SearchRequest { query: text.to_string(), ..Default::default() }
}

fn ghost_task() -> Task {
	Task {
		id: "memos/ghost".to_string(),
		uid: "ghost".to_string(),
		content: "## Renew SMAP license".to_string(),
		tags: Vec::new(),
		memo_url: format!("{TEST_BASE_URL}/m/ghost"),
		visibility: Visibility::Private,
		create_time: Utc::now(),
		update_time: Utc::now(),
	}
}

#[tokio::test]
async fn hits_are_hydrated_from_the_note_store() {
	let harness = Harness::new(Vec::<Reply>::new());
	let report = harness.notes.seed("## SMAP report\n\n- [ ] draft");
	let unrelated = harness.notes.seed("## Buy groceries");

	harness.index.seed(&report);
	harness.index.seed(&unrelated);
	harness.index.seed(&ghost_task());
	harness
		.notes
		.update_task(&report.id, "## SMAP report\n\n- [x] draft")
		.await
		.expect("Update must succeed.");

	let response = harness
		.tasks()
		.search(&scope(), &query("SMAP report"))
		.await
		.expect("Search must succeed.");

	assert_eq!(response.count, 1);
	assert_eq!(response.results[0].memo_id, report.id);
	assert_eq!(response.results[0].content, "## SMAP report\n\n- [x] draft");
	assert_eq!(response.results[0].memo_url, report.memo_url);
	assert_eq!(harness.index.searches()[0].limit, 10);
}

#[tokio::test]
async fn search_requires_a_query_and_an_index() {
	let harness = Harness::new(Vec::<Reply>::new());
	let blank = harness.tasks().search(&scope(), &query("  ")).await;

	assert!(matches!(blank, Err(Error::InvalidRequest { .. })));

	let harness = harness.without_index();
	let unavailable = harness.tasks().search(&scope(), &query("SMAP")).await;

	assert!(matches!(unavailable, Err(Error::SearchUnavailable)));
}

#[tokio::test]
async fn answers_are_grounded_in_retrieved_tasks() {
	let harness = Harness::new([Reply::text("The SMAP report is due tomorrow.")]);
	let report = harness.notes.seed("## SMAP report\n\n- **Due:** 2026-03-11");

	harness.index.seed(&report);

	let response = harness
		.tasks()
		.answer_query(&scope(), "When is the SMAP report due?")
		.await
		.expect("Answer must succeed.");

	assert_eq!(response.answer, "The SMAP report is due tomorrow.");
	assert_eq!(response.source_count, 1);
	assert_eq!(harness.index.searches()[0].limit, 5);

	let prompt = harness.llm.requests()[0].messages[0].text().unwrap_or_default();

	assert!(prompt.contains("### Task 1"));
	assert!(prompt.contains(&report.memo_url));
	assert!(prompt.contains("Question: When is the SMAP report due?"));
}

#[tokio::test]
async fn blank_model_answer_is_an_error() {
	let harness = Harness::new([Reply::text("  ")]);
	let result = harness.tasks().answer_query(&scope(), "anything due today?").await;

	assert!(matches!(result, Err(Error::EmptyLlmResponse)));
}
