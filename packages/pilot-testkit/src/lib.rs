//! In-memory doubles for the service adapter traits.

mod llm;
mod outbound;
mod stores;

pub use llm::{Reply, ScriptedLlm};
pub use outbound::{FakeCalendar, RecordingMessenger};
pub use stores::{MemoryIndex, MemoryNotes, TEST_BASE_URL};

use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
