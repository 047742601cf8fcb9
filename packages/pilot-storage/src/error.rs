#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("{service} returned HTTP {status}: {body}")]
	Status { service: &'static str, status: u16, body: String },
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
