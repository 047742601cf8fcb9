use chrono::Utc;

use pilot_domain::scm::{ACTION_MERGED, EventSource, EventType, WebhookEvent};
use pilot_service::scm::{AutoCompleter, MATCH_LIMIT, MatchReason, ScmOutcome};
use pilot_testkit::Reply;

use super::Harness;

fn pull_request(action: &str) -> WebhookEvent {
	WebhookEvent {
		source: EventSource::Github,
		event_type: EventType::PullRequest,
		repository: "acme/api".to_string(),
		branch: "feat/x".to_string(),
		commit: "abc123".to_string(),
		author: "octocat".to_string(),
		message: "Add rate limiting".to_string(),
		pr_number: Some(42),
		issue_number: None,
		action: action.to_string(),
		received_at: Utc::now(),
	}
}

fn completer(harness: &Harness) -> AutoCompleter {
	AutoCompleter::new(harness.notes(), harness.index(), MATCH_LIMIT)
}

fn harness() -> Harness {
	Harness::new(Vec::<Reply>::new())
}

#[tokio::test]
async fn merged_pull_request_completes_tagged_task() {
	let harness = harness();
	let task = harness.notes.seed("## Ship rate limiting #pr/42\n\n- [ ] code\n- [ ] docs");

	harness.index.seed(&task);

	let outcome = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Processing must succeed.");
	let ScmOutcome::Processed(report) = &outcome else {
		panic!("Expected a processed outcome, got {outcome:?}.");
	};

	assert_eq!(report.written, vec![task.id.clone()]);
	assert_eq!(report.matched[0].reason, MatchReason::ExactTag);

	let updates = harness.notes.updates();

	assert_eq!(updates.len(), 1);
	assert_eq!(updates[0].1, "## Ship rate limiting #pr/42\n\n- [x] code\n- [x] docs");
	assert_eq!(harness.index.embeds(), 0);

	let again = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Processing must succeed.");

	assert!(
		matches!(again, ScmOutcome::Processed(report) if report.skipped == vec![task.id.clone()])
	);
	assert_eq!(harness.notes.updates().len(), 1);
}

#[tokio::test]
async fn closed_without_merge_is_ignored() {
	let harness = harness();
	let task = harness.notes.seed("## Ship rate limiting #pr/42\n\n- [ ] code");

	harness.index.seed(&task);

	let outcome = completer(&harness)
		.process(&pull_request("closed"))
		.await
		.expect("Processing must succeed.");

	assert!(matches!(outcome, ScmOutcome::Ignored { .. }));
	assert!(harness.index.searches().is_empty());
	assert!(harness.index.filter_searches().is_empty());
	assert!(harness.notes.updates().is_empty());
}

#[tokio::test]
async fn branch_mentions_match_semantically() {
	let harness = harness();
	let task = harness.notes.seed("## Review the feat/x branch\n\n- [ ] review");

	harness.index.seed(&task);

	let outcome = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Processing must succeed.");
	let ScmOutcome::Processed(report) = &outcome else {
		panic!("Expected a processed outcome, got {outcome:?}.");
	};

	assert_eq!(report.matched.len(), 1);
	assert_eq!(report.matched[0].reason, MatchReason::SemanticKeyword);
	assert_eq!(report.written, vec![task.id]);
}

#[tokio::test]
async fn tasks_without_checklists_are_skipped() {
	let harness = harness();
	let task = harness.notes.seed("## Talk about #pr/42 at standup");

	harness.index.seed(&task);

	let outcome = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Processing must succeed.");

	assert!(matches!(outcome, ScmOutcome::Processed(report) if report.skipped.len() == 1));
	assert!(harness.notes.updates().is_empty());
}

#[tokio::test]
async fn write_failures_are_reported_per_task() {
	let harness = harness();
	let task = harness.notes.seed("## Ship #pr/42\n\n- [ ] code");

	harness.index.seed(&task);
	harness.notes.fail_updates(true);

	let outcome = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Per-task failures must not fail the event.");

	assert!(
		matches!(outcome, ScmOutcome::Processed(report) if report.failed == vec![task.id.clone()])
	);
}

#[tokio::test]
async fn without_an_index_tags_are_listed_from_the_note_store() {
	let harness = harness().without_index();
	let matching = harness.notes.seed("## Ship #pr/42\n\n- [ ] code");
	let other = harness.notes.seed("## Ship #pr/420\n\n- [ ] code");
	let outcome = completer(&harness)
		.process(&pull_request(ACTION_MERGED))
		.await
		.expect("Processing must succeed.");

	let ScmOutcome::Processed(report) = &outcome else {
		panic!("Expected a processed outcome, got {outcome:?}.");
	};
	let untouched = harness.notes.task(&other.id).expect("Task must exist.");

	assert_eq!(report.written, vec![matching.id.clone()]);
	assert!(!harness.notes.lists().is_empty());
	assert!(untouched.content.contains("- [ ] code"));
	assert!(harness.index.searches().is_empty());
}

#[tokio::test]
async fn events_without_references_do_not_match() {
	let harness = harness();
	let mut event = pull_request(ACTION_MERGED);

	event.repository = String::new();
	event.branch = String::new();
	event.pr_number = None;
	event.event_type = EventType::Push;

	let outcome = completer(&harness).process(&event).await.expect("Processing must succeed.");

	assert_eq!(outcome, ScmOutcome::NoMatch);
}

#[tokio::test]
async fn keyword_matches_do_not_spill_into_longer_numbers() {
	let harness = harness();
	let neighbour = harness.notes.seed("## Follow up on PR #420\n\n- [ ] reply");
	let target = harness.notes.seed("## Land PR #42\n\n- [ ] merge");
	let mut event = pull_request(ACTION_MERGED);

	event.branch = String::new();

	harness.index.seed(&neighbour);
	harness.index.seed(&target);

	let outcome = completer(&harness).process(&event).await.expect("Processing must succeed.");
	let ScmOutcome::Processed(report) = &outcome else {
		panic!("Expected a processed outcome, got {outcome:?}.");
	};

	assert_eq!(report.written, vec![target.id.clone()]);

	let stored = harness.notes.task(&neighbour.id).expect("Task must exist.");

	assert_eq!(stored.content, "## Follow up on PR #420\n\n- [ ] reply");
}
