//! Chat-completions servers reached through an explicit `base_url`.

use reqwest::Url;

use crate::{
	BoxFuture, Error, GenerateRequest, GenerateResponse, LlmProvider, Result,
	chat_completions::{ChatCompletionsProvider, Dialect},
};

pub struct OpenAiCompatibleProvider {
	inner: ChatCompletionsProvider,
}
impl OpenAiCompatibleProvider {
	pub fn new(cfg: &pilot_config::LlmProviderConfig) -> Result<Self> {
		let Some(base_url) = cfg.base_url.as_deref() else {
			return Err(Error::InvalidConfig {
				message: format!("Provider {} requires a base_url.", cfg.name),
			});
		};

		validate_base_url(base_url)?;

		Ok(Self { inner: ChatCompletionsProvider::new(cfg, base_url, Dialect::Compatible)? })
	}

	pub fn endpoint(&self) -> &str {
		self.inner.endpoint()
	}
}

impl LlmProvider for OpenAiCompatibleProvider {
	fn name(&self) -> &str {
		self.inner.name()
	}

	fn model(&self) -> &str {
		self.inner.model()
	}

	fn generate<'a>(
		&'a self,
		request: &'a GenerateRequest,
	) -> BoxFuture<'a, Result<GenerateResponse>> {
		self.inner.generate(request)
	}
}

/// HTTPS is required except for loopback hosts, which may use plain HTTP.
pub fn validate_base_url(base_url: &str) -> Result<()> {
	let parsed = Url::parse(base_url).map_err(|err| Error::InvalidConfig {
		message: format!("Invalid base_url {base_url:?}: {err}."),
	})?;
	let host = parsed.host_str().unwrap_or_default();

	match parsed.scheme() {
		"https" => Ok(()),
		"http" if matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1") => {
			tracing::warn!(base_url, "Using plain HTTP for a local LLM server.");

			Ok(())
		},
		"http" => Err(Error::InvalidConfig {
			message: format!("Plain HTTP is only allowed for loopback hosts, got {base_url:?}."),
		}),
		scheme => Err(Error::InvalidConfig {
			message: format!("Unsupported URL scheme {scheme:?} in base_url {base_url:?}."),
		}),
	}
}
