use serde::Deserialize;

use crate::task::MEMO_NAME_PREFIX;

pub const ACTIVITY_CREATED: &str = "memos.memo.created";
pub const ACTIVITY_UPDATED: &str = "memos.memo.updated";
pub const ACTIVITY_DELETED: &str = "memos.memo.deleted";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoWebhookPayload {
	#[serde(default)]
	pub activity_type: String,
	#[serde(default)]
	pub memo: Option<MemoRef>,
}
impl MemoWebhookPayload {
	pub fn activity(&self) -> MemoActivity {
		match self.activity_type.as_str() {
			ACTIVITY_CREATED => MemoActivity::Created,
			ACTIVITY_UPDATED => MemoActivity::Updated,
			ACTIVITY_DELETED => MemoActivity::Deleted,
			_ => MemoActivity::Other,
		}
	}

	/// The full `memos/<uid>` name, derived from the uid when the name is absent.
	pub fn memo_id(&self) -> Option<String> {
		let memo = self.memo.as_ref()?;
		let name = memo.name.trim();

		if !name.is_empty() {
			return Some(name.to_string());
		}

		let uid = memo.uid.trim();

		(!uid.is_empty()).then(|| format!("{MEMO_NAME_PREFIX}{uid}"))
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoRef {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoActivity {
	Created,
	Updated,
	Deleted,
	Other,
}
