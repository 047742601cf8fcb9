use std::sync::Arc;

use crate::{
	ChainPolicy, Error, LlmProvider, ProviderManager, Result,
	chat_completions::{ChatCompletionsProvider, Dialect},
	gemini::GeminiProvider,
	openai_compatible::OpenAiCompatibleProvider,
};

/// Builds the provider chain. Entries that fail to initialize are logged and skipped.
pub fn build_manager(cfg: &pilot_config::LlmChain) -> Result<ProviderManager> {
	let mut entries: Vec<&pilot_config::LlmProviderConfig> =
		cfg.providers.iter().filter(|provider| provider.enabled).collect();

	entries.sort_by_key(|provider| provider.priority);

	let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

	for entry in entries {
		match build_provider(entry) {
			Ok(provider) => {
				tracing::info!(
					provider = %entry.name,
					model = %entry.model,
					priority = entry.priority,
					"LLM provider initialized."
				);

				providers.push(provider);
			},
			Err(err) => {
				tracing::error!(provider = %entry.name, error = %err, "Skipping LLM provider.");
			},
		}
	}

	if providers.is_empty() {
		return Err(Error::NoProviders);
	}

	ProviderManager::new(providers, ChainPolicy::from_config(cfg))
}

/// Picks the adapter family from the provider name.
pub fn build_provider(cfg: &pilot_config::LlmProviderConfig) -> Result<Arc<dyn LlmProvider>> {
	let name = cfg.name.trim().to_lowercase();

	if name == "gemini" || name == "google" {
		return Ok(Arc::new(GeminiProvider::new(cfg)?));
	}
	if let Some(default_base) = default_chat_completions_base(&name) {
		let base_url = cfg.base_url.as_deref().unwrap_or(default_base);

		return Ok(Arc::new(ChatCompletionsProvider::new(cfg, base_url, Dialect::Native)?));
	}

	Ok(Arc::new(OpenAiCompatibleProvider::new(cfg)?))
}

fn default_chat_completions_base(name: &str) -> Option<&'static str> {
	match name {
		"openai" => Some("https://api.openai.com/v1"),
		"deepseek" => Some("https://api.deepseek.com/v1"),
		"groq" => Some("https://api.groq.com/openai/v1"),
		"mistral" => Some("https://api.mistral.ai/v1"),
		_ => None,
	}
}
