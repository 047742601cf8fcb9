use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::time::Instant;

use pilot_domain::memo_webhook::MemoWebhookPayload;
use pilot_service::{
	Error,
	reembed::{ReEmbedder, ReembedOutcome, RetryPolicy},
};
use pilot_testkit::{MemoryIndex, MemoryNotes};

fn payload(activity: &str, uid: &str) -> MemoWebhookPayload {
	serde_json::from_value(json!({ "activityType": activity, "memo": { "uid": uid } }))
		.expect("Payload must deserialize.")
}

fn embedder(notes: &Arc<MemoryNotes>, index: &Arc<MemoryIndex>) -> ReEmbedder {
	ReEmbedder::new(notes.clone(), index.clone(), RetryPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn updates_re_embed_the_current_content() {
	let notes = Arc::new(MemoryNotes::new());
	let index = Arc::new(MemoryIndex::new());
	let task = notes.seed("## Ship v2\n\n- [ ] tag release #repo/api");
	let outcome = embedder(&notes, &index)
		.handle(&payload("memos.memo.updated", &task.uid))
		.await
		.expect("Re-embed must succeed.");

	assert_eq!(outcome, ReembedOutcome::Embedded { memo_id: task.id.clone() });
	assert_eq!(index.embeds(), 1);

	let stored = index.payload(&task.id).expect("Payload must be indexed.");

	assert_eq!(stored["memo_id"], json!(task.id));
	assert_eq!(stored["tags"], json!(["#repo/api"]));
}

#[tokio::test(start_paused = true)]
async fn deletes_remove_the_point() {
	let notes = Arc::new(MemoryNotes::new());
	let index = Arc::new(MemoryIndex::new());
	let task = notes.seed("## Old task");

	index.seed(&task);

	let outcome = embedder(&notes, &index)
		.handle(&payload("memos.memo.deleted", &task.uid))
		.await
		.expect("Delete must succeed.");

	assert_eq!(outcome, ReembedOutcome::Deleted { memo_id: task.id.clone() });
	assert_eq!(index.deletes(), 1);
	assert!(!index.contains(&task.id));
	assert_eq!(notes.gets(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_backoff() {
	let notes = Arc::new(MemoryNotes::new());
	let index = Arc::new(MemoryIndex::new());
	let task = notes.seed("## Flaky");

	notes.fail_next_gets(2);

	let started = Instant::now();
	let outcome = embedder(&notes, &index)
		.handle(&payload("memos.memo.created", &task.uid))
		.await
		.expect("Third attempt must succeed.");
	let waited = started.elapsed();

	assert!(matches!(outcome, ReembedOutcome::Embedded { .. }));
	assert_eq!(notes.gets(), 3);
	assert!(waited >= Duration::from_secs(6));
	assert!(waited < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_the_last_error() {
	let notes = Arc::new(MemoryNotes::new());
	let index = Arc::new(MemoryIndex::new());
	let task = notes.seed("## Never indexed");

	index.fail_next_embeds(10);

	let result = embedder(&notes, &index).handle(&payload("memos.memo.updated", &task.uid)).await;

	assert!(matches!(result, Err(Error::VectorStore { .. })));
	assert_eq!(index.embeds(), 3);
	assert!(!index.contains(&task.id));
}

#[tokio::test]
async fn unsupported_or_anonymous_payloads_do_nothing() {
	let notes = Arc::new(MemoryNotes::new());
	let index = Arc::new(MemoryIndex::new());
	let reembedder = embedder(&notes, &index);
	let ignored =
		reembedder.handle(&payload("memos.memo.commented", "abc")).await.expect("Ignored.");

	assert!(matches!(ignored, ReembedOutcome::Ignored { .. }));

	let anonymous: MemoWebhookPayload =
		serde_json::from_value(json!({ "activityType": "memos.memo.deleted" }))
			.expect("Payload must deserialize.");
	let result = reembedder.handle(&anonymous).await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	assert_eq!(index.deletes(), 0);
	assert_eq!(notes.gets(), 0);
}
