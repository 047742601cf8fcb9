pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider {provider} returned HTTP {status}: {body}")]
	Http { provider: String, status: u16, body: String },
	#[error(transparent)]
	Request(#[from] reqwest::Error),
	#[error(transparent)]
	Decode(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("LLM generation timed out after trying {tried} provider(s).")]
	Timeout { tried: usize },
	#[error("All LLM providers failed. Last error: {last}")]
	AllProvidersFailed { last: Box<Error> },
	#[error("No LLM providers were initialized.")]
	NoProviders,
}
