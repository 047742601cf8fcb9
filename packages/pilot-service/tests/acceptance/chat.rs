use serde_json::json;

use pilot_providers::Message;
use pilot_service::{
	chat::{EMPTY_TEXT_REPLY, FAILURE_REPLY, Update},
	tools::checklist::NO_CHECKLIST,
};
use pilot_testkit::Reply;

use super::{Harness, route, scope};

const CHAT_ID: i64 = 1_001;

fn harness() -> Harness {
	Harness::new(Vec::<Reply>::new())
}

fn text_update(text: &str) -> Update {
	serde_json::from_value(json!({
		"update_id": 1,
		"message": {
			"message_id": 10,
			"from": { "id": 42, "username": "tester" },
			"chat": { "id": CHAT_ID, "type": "private" },
			"date": 1_773_100_000,
			"text": text
		}
	}))
	.expect("Update must deserialize.")
}

#[tokio::test]
async fn help_lists_the_commands() {
	let harness = harness();
	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "/help@pilot_bot").await;

	for command in ["/search", "/ask", "/progress", "/complete", "/check", "/uncheck", "/reset"] {
		assert!(reply.contains(command), "Help must mention {command}.");
	}

	assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn checklist_commands_read_and_write_tasks() {
	let harness = harness();
	let task = harness.notes.seed("## Release\n\n- [x] build\n- [ ] publish\n- [ ] announce");
	let chat = harness.chat();
	let progress = chat.reply_for(&scope(), CHAT_ID, &format!("/progress {}", task.uid)).await;

	assert!(progress.contains("1/3 items done"));

	let checked = chat.reply_for(&scope(), CHAT_ID, &format!("/check {} Publish", task.id)).await;

	assert!(checked.starts_with("Checked 1 item(s)."));
	assert!(checked.contains("2/3 items done"));

	let unchecked =
		chat.reply_for(&scope(), CHAT_ID, &format!("/uncheck {} build", task.uid)).await;

	assert!(unchecked.starts_with("Unchecked 1 item(s)."));

	let completed = chat.reply_for(&scope(), CHAT_ID, &format!("/complete {}", task.uid)).await;

	assert!(completed.contains("All done!"));

	let stored = harness.notes.task(&task.id).expect("Task must exist.");

	assert_eq!(stored.content, "## Release\n\n- [x] build\n- [x] publish\n- [x] announce");
	assert_eq!(harness.notes.updates().len(), 3);
}

#[tokio::test]
async fn complete_without_checklist_changes_nothing() {
	let harness = harness();
	let task = harness.notes.seed("## Call the bank");
	let command = format!("/complete {}", task.uid);
	let reply = harness.chat().reply_for(&scope(), CHAT_ID, &command).await;

	assert_eq!(reply, NO_CHECKLIST);
	assert!(harness.notes.updates().is_empty());
}

#[tokio::test]
async fn commands_without_arguments_explain_usage() {
	let harness = harness();
	let chat = harness.chat();

	assert_eq!(chat.reply_for(&scope(), CHAT_ID, "/search").await, "Usage: /search <query>");
	assert_eq!(
		chat.reply_for(&scope(), CHAT_ID, "/check t1").await,
		"Usage: /check <task_id> <item text>"
	);
	assert!(
		chat.reply_for(&scope(), CHAT_ID, "/progress memos/missing").await.contains("not found")
	);
	assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn reset_clears_the_session() {
	let harness = harness();

	harness.sessions.append(&scope().user_id, Message::user("remember me")).await;

	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "/reset").await;

	assert!(reply.contains("cleared"));
	assert!(harness.sessions.history(&scope().user_id).await.is_empty());
}

#[tokio::test]
async fn task_messages_are_created_in_bulk() {
	let harness = Harness::new([
		route("CREATE_TASK"),
		Reply::text(
			r#"[{"title": "Call the bank", "due_date_relative": "today", "priority": "p1"}]"#,
		),
	]);
	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "call the bank today, urgent").await;

	assert!(reply.starts_with("\u{2705} Created 1 task(s):"));
	assert!(reply.contains("Call the bank (p1, due "));
	assert_eq!(harness.notes.creates().len(), 1);
}

#[tokio::test]
async fn unparseable_task_messages_fall_back_to_the_agent() {
	let harness = Harness::new([
		route("CREATE_TASK"),
		Reply::text("[]"),
		Reply::text("I can create, find and track tasks for you."),
	]);
	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "what can you do?").await;

	assert_eq!(reply, "I can create, find and track tasks for you.");
	assert!(harness.notes.creates().is_empty());
	assert_eq!(harness.sessions.history(&scope().user_id).await.len(), 2);
}

#[tokio::test]
async fn search_messages_use_the_index() {
	let harness = Harness::new([route("SEARCH_TASK")]);
	let task = harness.notes.seed("## SMAP report\n\n- [ ] draft");

	harness.index.seed(&task);

	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "SMAP report").await;

	assert!(reply.contains("Found 1 task(s)"));
	assert!(reply.contains(&task.memo_url));
}

#[tokio::test]
async fn upstream_failures_become_an_apology() {
	let harness = Harness::new([Reply::fail("provider down")]);
	let reply = harness.chat().reply_for(&scope(), CHAT_ID, "hello there").await;

	assert_eq!(reply, FAILURE_REPLY);
}

#[tokio::test]
async fn updates_reply_to_their_chat() {
	let harness = harness();
	let chat = harness.chat();

	chat.handle_update(&text_update("/start")).await.expect("Reply must be sent.");

	let empty: Update = serde_json::from_value(json!({ "update_id": 2 })).expect("Update.");

	chat.handle_update(&empty).await.expect("Empty updates are ignored.");

	let sent = harness.messenger.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].0, CHAT_ID);
	assert!(sent[0].1.contains("/search"));
}

#[tokio::test]
async fn blank_messages_get_guidance_without_model_calls() {
	let harness = harness();

	harness
		.chat()
		.handle_update(&text_update("   "))
		.await
		.expect("Guidance must be sent.");

	let sent = harness.messenger.sent();

	assert_eq!(sent, vec![(CHAT_ID, EMPTY_TEXT_REPLY.to_string())]);
	assert!(sent[0].1.contains("couldn't process"));
	assert_eq!(harness.llm.calls(), 0);
	assert!(harness.notes.creates().is_empty());
}
