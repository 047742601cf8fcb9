pub mod checklist;
pub mod dates;
pub mod embedding_text;
pub mod ids;
pub mod markdown;
pub mod memo_webhook;
pub mod scm;
pub mod task;
pub mod text;
