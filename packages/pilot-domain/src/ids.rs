use uuid::Uuid;

/// Maps a note-store id onto a deterministic vector point id.
pub fn vector_point_id(memo_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_DNS, memo_id.as_bytes())
}
