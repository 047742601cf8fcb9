pub mod chat_completions;
pub mod embedding;
pub mod factory;
pub mod gemini;
pub mod manager;
pub mod openai_compatible;
pub mod types;

mod error;

pub use error::{Error, Result};
pub use manager::{ChainPolicy, ProviderManager};
pub use types::{
	GenerateRequest, GenerateResponse, Message, Part, Role, ToolDeclaration, Usage,
};

use std::{future::Future, pin::Pin, time::Duration};

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One LLM back-end speaking a specific wire format.
pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn model(&self) -> &str;

	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, Result<GenerateResponse>>;
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Reads the body of a non-success response into an [`Error::Http`].
pub(crate) async fn ensure_success(
	provider: &str,
	response: reqwest::Response,
) -> Result<reqwest::Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();

	Err(Error::Http { provider: provider.to_string(), status: status.as_u16(), body })
}
