use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value, json};

use pilot_domain::task::Scope;
use pilot_providers::{Message, Part, Role};
use pilot_service::{
	BoxFuture, Error, Result,
	agent::{
		MAX_STEPS, MAX_STEPS_REPLY, TOOL_NOT_FOUND,
		session::{SESSION_TTL, SessionStore},
	},
	tools::Tool,
};
use pilot_testkit::Reply;

use super::{Harness, scope};

struct NoopTool;
impl Tool for NoopTool {
	fn name(&self) -> &str {
		"noop"
	}

	fn description(&self) -> &str {
		"Does nothing."
	}

	fn parameters(&self) -> Value {
		json!({ "type": "object", "properties": {} })
	}

	fn invoke<'a>(
		&'a self,
		_scope: &'a Scope,
		_args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async { Ok(json!({ "ok": true })) })
	}
}

fn function_responses(messages: &[Message]) -> Vec<(String, Value)> {
	messages
		.iter()
		.flat_map(|message| message.parts.iter())
		.filter_map(|part| match part {
			Part::FunctionResponse { name, response } => Some((name.clone(), response.clone())),
			_ => None,
		})
		.collect()
}

#[tokio::test]
async fn step_limit_ends_with_polite_reply() {
	let harness = Harness::new([Reply::call("noop", json!({}))]);
	let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(NoopTool)];
	let agent = harness.agent_with(tools);
	let reply = agent.process_query(&scope(), "plan my week").await.expect("Loop must not fail.");

	assert_eq!(reply, MAX_STEPS_REPLY);
	assert_eq!(harness.llm.calls(), MAX_STEPS);

	let history = harness.sessions.history(&scope().user_id).await;

	assert_eq!(history.len(), 2);
	assert_eq!(history[1].text().as_deref(), Some(MAX_STEPS_REPLY));
}

#[tokio::test]
async fn tool_results_are_fed_back_to_the_model() {
	let harness = Harness::new(Vec::<Reply>::new());
	let task = harness.notes.seed("## Release\n\n- [x] build\n- [ ] publish");

	harness.llm.push(Reply::call("get_checklist_progress", json!({ "task_id": task.uid })));
	harness.llm.push(Reply::text("Release is half done."));

	let reply =
		harness.agent().process_query(&scope(), "how is the release going?").await.expect("Reply.");

	assert_eq!(reply, "Release is half done.");

	let requests = harness.llm.requests();

	assert_eq!(requests.len(), 2);
	assert!(requests[0].tools.iter().any(|tool| tool.name == "get_checklist_progress"));

	let responses = function_responses(&requests[1].messages);

	assert_eq!(responses.len(), 1);
	assert_eq!(responses[0].0, "get_checklist_progress");
	assert_eq!(responses[0].1["stats"]["total"], 2);
	assert_eq!(responses[0].1["stats"]["completed"], 1);
	assert!(
		requests[1]
			.system_instruction
			.as_deref()
			.is_some_and(|system| system.contains("Asia/Ho_Chi_Minh"))
	);
}

#[tokio::test]
async fn tool_failures_become_structured_errors() {
	let harness = Harness::new([
		Reply::call("does_not_exist", json!({})),
		Reply::call("get_checklist_progress", json!({})),
		Reply::text("Sorry, I could not find that."),
	]);
	let reply = harness.agent().process_query(&scope(), "check task").await.expect("Reply.");

	assert_eq!(reply, "Sorry, I could not find that.");

	let requests = harness.llm.requests();
	let responses = function_responses(&requests[2].messages);

	assert_eq!(responses.len(), 2);
	assert_eq!(responses[0].1, json!({ "error": TOOL_NOT_FOUND }));
	assert!(
		responses[1].1["error"]
			.as_str()
			.is_some_and(|message| message.contains("Missing required argument task_id"))
	);
}

#[tokio::test]
async fn provider_failure_surfaces_as_error() {
	let harness = Harness::new([Reply::fail("upstream down")]);
	let result = harness.agent().process_query(&scope(), "hello").await;

	assert!(matches!(result, Err(Error::Provider(_))));
}

#[tokio::test]
async fn empty_query_is_rejected_without_model_calls() {
	let harness = Harness::new([Reply::text("unused")]);
	let result = harness.agent().process_query(&scope(), "   ").await;

	assert!(matches!(result, Err(Error::EmptyInput)));
	assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn session_keeps_a_bounded_window_and_resets() {
	let harness = Harness::new([Reply::text("ok")]);
	let agent = harness.agent();

	for turn in 0..8 {
		agent.process_query(&scope(), &format!("message {turn}")).await.expect("Reply.");
	}

	let history = harness.sessions.history(&scope().user_id).await;

	assert_eq!(history.len(), 10);
	assert_eq!(history[0].role, Role::User);
	assert_eq!(history[0].text().as_deref(), Some("message 3"));
	assert!(agent.reset_session(&scope().user_id).await);
	assert!(harness.sessions.history(&scope().user_id).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_sessions_are_evicted_by_one_sweep() {
	let sessions = SessionStore::default();

	sessions.append("telegram_1", Message::user("old")).await;
	tokio::time::advance(SESSION_TTL + Duration::from_secs(60)).await;
	sessions.append("telegram_2", Message::user("fresh")).await;

	assert_eq!(sessions.sweep().await, 1);
	assert!(sessions.history("telegram_1").await.is_empty());
	assert_eq!(sessions.history("telegram_2").await.len(), 1);
}
