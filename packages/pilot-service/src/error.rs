pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Input text is empty.")]
	EmptyInput,
	#[error("No tasks could be parsed from the input.")]
	NoTasksParsed,
	#[error("Semantic search is currently unavailable.")]
	SearchUnavailable,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Empty LLM response.")]
	EmptyLlmResponse,
	#[error(transparent)]
	Provider(#[from] pilot_providers::Error),
	#[error("Note store error: {message}")]
	NoteStore { message: String },
	#[error("Vector store error: {message}")]
	VectorStore { message: String },
	#[error("Calendar error: {message}")]
	Calendar { message: String },
	#[error("Messenger error: {message}")]
	Messenger { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
}
impl Error {
	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn note_store(err: pilot_storage::Error) -> Self {
		match err {
			pilot_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::NoteStore { message: other.to_string() },
		}
	}

	pub(crate) fn vector_store(err: impl std::fmt::Display) -> Self {
		Self::VectorStore { message: err.to_string() }
	}

	pub(crate) fn calendar(err: pilot_storage::Error) -> Self {
		Self::Calendar { message: err.to_string() }
	}

	pub(crate) fn messenger(err: pilot_storage::Error) -> Self {
		Self::Messenger { message: err.to_string() }
	}
}
