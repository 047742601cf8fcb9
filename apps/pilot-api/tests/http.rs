use std::{sync::Arc, time::Duration};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use chrono_tz::Tz;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use pilot_api::{
	routes,
	security::{self, IpAllowList, SourceRateLimiter, WebhookGuard},
	state::{self, AppState},
};
use pilot_service::{
	LanguageModel, Messenger, NoteStore, VectorIndex,
	agent::{Agent, session::SessionStore},
	chat::ChatHandler,
	reembed::{ReEmbedder, RetryPolicy},
	router::IntentRouter,
	scm::{AutoCompleter, MATCH_LIMIT},
	supervisor::Supervisor,
	tasks::TaskService,
	tools::ToolRegistry,
};
use pilot_testkit::{MemoryIndex, MemoryNotes, RecordingMessenger, Reply, ScriptedLlm};

const SECRET: &str = "webhook-secret";
const ZONE: Tz = chrono_tz::Asia::Ho_Chi_Minh;

struct Fixture {
	notes: Arc<MemoryNotes>,
	index: Arc<MemoryIndex>,
	messenger: Arc<RecordingMessenger>,
	state: AppState,
}
impl Fixture {
	fn new() -> Self {
		Self::build(guard(600, &[]), true)
	}

	fn without_index() -> Self {
		Self::build(guard(600, &[]), false)
	}

	fn with_guard(guard: WebhookGuard) -> Self {
		Self::build(guard, true)
	}

	fn build(guard: WebhookGuard, with_index: bool) -> Self {
		let llm = Arc::new(ScriptedLlm::new(Vec::<Reply>::new()));
		let notes = Arc::new(MemoryNotes::new());
		let index = Arc::new(MemoryIndex::new());
		let messenger = Arc::new(RecordingMessenger::new());
		let llm_dyn: Arc<dyn LanguageModel> = llm;
		let notes_dyn: Arc<dyn NoteStore> = notes.clone();
		let index_dyn: Option<Arc<dyn VectorIndex>> = {
			let index: Arc<dyn VectorIndex> = index.clone();

			with_index.then_some(index)
		};
		let messenger_dyn: Arc<dyn Messenger> = messenger.clone();
		let tasks = Arc::new(TaskService::new(
			llm_dyn.clone(),
			notes_dyn.clone(),
			index_dyn.clone(),
			None,
			ZONE,
		));
		let registry = ToolRegistry::new(state::tools(&tasks, &notes_dyn, None))
			.expect("Tool names must be unique.");
		let agent = Agent::new(llm_dyn.clone(), registry, Arc::new(SessionStore::default()), ZONE);
		let chat = ChatHandler::new(
			messenger_dyn,
			IntentRouter::new(llm_dyn),
			Arc::new(agent),
			tasks,
			notes_dyn.clone(),
		);
		let reembedder = index_dyn.clone().map(|index| {
			Arc::new(ReEmbedder::new(notes_dyn.clone(), index, RetryPolicy::default()))
		});
		let state = AppState {
			chat: Arc::new(chat),
			reembedder,
			completer: Arc::new(AutoCompleter::new(notes_dyn, index_dyn, MATCH_LIMIT)),
			guard: Arc::new(guard),
			supervisor: Supervisor::new(),
		};

		Self { notes, index, messenger, state }
	}

	fn app(&self) -> Router {
		routes::router(self.state.clone())
	}

	async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
		let response = self.app().oneshot(request).await.expect("Request must be served.");
		let status = response.status();
		let bytes = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Body must be readable.");
		let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

		(status, json)
	}

	async fn settle(&self) {
		for _ in 0..400 {
			if self.state.supervisor.in_flight() == 0 {
				return;
			}

			tokio::time::sleep(Duration::from_millis(5)).await;
		}

		panic!("Background work did not finish.");
	}
}

fn guard(per_minute: u32, allow: &[&str]) -> WebhookGuard {
	let allow = allow.iter().map(|entry| entry.to_string()).collect::<Vec<_>>();

	WebhookGuard::new(
		SECRET.to_string(),
		IpAllowList::new(&allow),
		SourceRateLimiter::per_minute(per_minute),
	)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.expect("Request must build.")
}

fn github_request(event: &str, body: &Value, signature: Option<&str>) -> Request<Body> {
	let raw = body.to_string();
	let signature = match signature {
		Some(signature) => signature.to_string(),
		None => security::sign(SECRET.as_bytes(), raw.as_bytes()).expect("Signing must succeed."),
	};

	Request::builder()
		.method("POST")
		.uri("/webhook/github")
		.header("content-type", "application/json")
		.header(security::GITHUB_EVENT_HEADER, event)
		.header(security::GITHUB_SIGNATURE_HEADER, signature)
		.header(security::FORWARDED_FOR_HEADER, "203.0.113.9")
		.body(Body::from(raw))
		.expect("Request must build.")
}

fn pull_request(merged: bool) -> Value {
	json!({
		"action": "closed",
		"number": 42,
		"pull_request": {
			"number": 42,
			"title": "Add rate limiting",
			"merged": merged,
			"head": { "ref": "feat/x", "sha": "abc123" },
			"user": { "login": "octocat" }
		},
		"repository": { "name": "api", "full_name": "acme/api" },
		"sender": { "login": "octocat" }
	})
}

#[tokio::test]
async fn probes_report_ok() {
	let fixture = Fixture::new();

	for uri in ["/health", "/ready", "/live"] {
		let request = Request::builder().uri(uri).body(Body::empty()).expect("Request must build.");
		let (status, body) = fixture.send(request).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "ok" }));
	}
}

#[tokio::test]
async fn telegram_updates_are_acknowledged_then_answered() {
	let fixture = Fixture::new();
	let update = json!({
		"update_id": 7,
		"message": {
			"message_id": 1,
			"from": { "id": 42, "username": "tester" },
			"chat": { "id": 1001, "type": "private" },
			"date": 1_773_100_000,
			"text": "/help"
		}
	});
	let (status, body) = fixture.send(post_json("/webhook/telegram", &update)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "status": "accepted" }));

	fixture.settle().await;

	let sent = fixture.messenger.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].0, 1001);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
	let fixture = Fixture::new();

	for uri in ["/webhook/telegram", "/webhook/memos"] {
		let request = Request::builder()
			.method("POST")
			.uri(uri)
			.body(Body::from("{not json"))
			.expect("Request must build.");
		let (status, body) = fixture.send(request).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error_code"], "invalid_payload");
	}

	assert!(fixture.messenger.sent().is_empty());
}

#[tokio::test]
async fn memo_changes_are_re_embedded_in_the_background() {
	let fixture = Fixture::new();
	let task = fixture.notes.seed("## Ship v2 #repo/api");
	let payload = json!({ "activityType": "memos.memo.updated", "memo": { "name": task.id } });
	let (status, body) = fixture.send(post_json("/webhook/memos", &payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "status": "accepted" }));

	fixture.settle().await;

	assert!(fixture.index.contains(&task.id));
	assert_eq!(fixture.index.embeds(), 1);
}

#[tokio::test]
async fn memo_deletes_remove_the_vector_point() {
	let fixture = Fixture::new();
	let task = fixture.notes.seed("## Old task");

	fixture.index.seed(&task);

	let payload = json!({ "activityType": "memos.memo.deleted", "memo": { "uid": task.uid } });
	let (status, body) = fixture.send(post_json("/webhook/memos", &payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "status": "accepted" }));

	fixture.settle().await;

	assert!(!fixture.index.contains(&task.id));
	assert_eq!(fixture.index.deletes(), 1);
}

#[tokio::test]
async fn memo_changes_are_ignored_without_an_index() {
	let fixture = Fixture::without_index();
	let payload = json!({ "activityType": "memos.memo.created", "memo": { "uid": "abc" } });
	let (status, body) = fixture.send(post_json("/webhook/memos", &payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "ignored");
	assert_eq!(fixture.notes.gets(), 0);
}

#[tokio::test]
async fn merged_pull_requests_complete_tagged_tasks() {
	let fixture = Fixture::new();
	let task = fixture.notes.seed("## Ship rate limiting #pr/42\n\n- [ ] code\n- [ ] docs");

	fixture.index.seed(&task);

	let (status, body) =
		fixture.send(github_request("pull_request", &pull_request(true), None)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "status": "accepted" }));

	fixture.settle().await;

	let updates = fixture.notes.updates();

	assert_eq!(updates.len(), 1);
	assert_eq!(updates[0].1, "## Ship rate limiting #pr/42\n\n- [x] code\n- [x] docs");
}

#[tokio::test]
async fn unmerged_and_unsupported_events_are_ignored() {
	let fixture = Fixture::new();
	let task = fixture.notes.seed("## Ship rate limiting #pr/42\n\n- [ ] code");

	fixture.index.seed(&task);

	let (status, body) =
		fixture.send(github_request("pull_request", &pull_request(false), None)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "ignored");

	let (status, body) =
		fixture.send(github_request("ping", &json!({ "zen": "Keep it simple." }), None)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "ignored");

	fixture.settle().await;

	assert!(fixture.notes.updates().is_empty());
}

#[tokio::test]
async fn bad_signatures_are_rejected_before_parsing() {
	let fixture = Fixture::new();
	let forged = "sha256=0000000000000000000000000000000000000000000000000000000000000000";
	let (status, body) =
		fixture.send(github_request("pull_request", &pull_request(true), Some(forged))).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error_code"], "unauthorized");

	let request = Request::builder()
		.method("POST")
		.uri("/webhook/github")
		.header(security::GITHUB_EVENT_HEADER, "pull_request")
		.body(Body::from(pull_request(true).to_string()))
		.expect("Request must build.");
	let (status, _) = fixture.send(request).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert!(fixture.notes.updates().is_empty());
}

#[tokio::test]
async fn signed_garbage_is_a_bad_request() {
	let fixture = Fixture::new();
	let raw = "{\"action\": ";
	let signature = security::sign(SECRET.as_bytes(), raw.as_bytes()).expect("Signing.");
	let request = Request::builder()
		.method("POST")
		.uri("/webhook/github")
		.header(security::GITHUB_EVENT_HEADER, "pull_request")
		.header(security::GITHUB_SIGNATURE_HEADER, signature)
		.body(Body::from(raw))
		.expect("Request must build.");
	let (status, body) = fixture.send(request).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_payload");
}

#[tokio::test]
async fn sources_over_budget_are_rate_limited() {
	let fixture = Fixture::with_guard(guard(10, &[]));
	let ping = json!({ "zen": "Design for failure." });
	let (first, _) = fixture.send(github_request("ping", &ping, None)).await;
	let (second, body) = fixture.send(github_request("ping", &ping, None)).await;

	assert_eq!(first, StatusCode::OK);
	assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(body["error_code"], "rate_limited");
}

#[tokio::test]
async fn allow_list_checks_the_forwarded_address() {
	let fixture = Fixture::with_guard(guard(600, &["10.0.0.0/8"]));
	let ping = json!({ "zen": "Approachable is better than simple." });
	let (status, _) = fixture.send(github_request("ping", &ping, None)).await;

	assert_eq!(status, StatusCode::FORBIDDEN);

	let mut request = github_request("ping", &ping, None);

	request.headers_mut().insert(
		security::FORWARDED_FOR_HEADER,
		"10.4.5.6, 198.51.100.1".parse().expect("Header must parse."),
	);

	let (status, _) = fixture.send(request).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gitlab_merges_require_the_shared_token() {
	let fixture = Fixture::new();
	let task = fixture.notes.seed("## Release notes #pr/7\n\n- [ ] write");

	fixture.index.seed(&task);

	let payload = json!({
		"object_kind": "merge_request",
		"user": { "username": "dev" },
		"project": { "name": "api", "path_with_namespace": "acme/api" },
		"object_attributes": {
			"iid": 7,
			"title": "Release notes",
			"action": "merge",
			"state": "merged",
			"source_branch": "docs/release"
		}
	});
	let request = |token: &str| {
		Request::builder()
			.method("POST")
			.uri("/webhook/gitlab")
			.header(security::GITLAB_EVENT_HEADER, "Merge Request Hook")
			.header(security::GITLAB_TOKEN_HEADER, token)
			.body(Body::from(payload.to_string()))
			.expect("Request must build.")
	};
	let (status, _) = fixture.send(request("wrong")).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, body) = fixture.send(request(SECRET)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "status": "accepted" }));

	fixture.settle().await;

	let stored = fixture.notes.task(&task.id).expect("Task must exist.");

	assert_eq!(stored.content, "## Release notes #pr/7\n\n- [x] write");
}
