mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Calendar, Config, DEFAULT_TIMEZONE, EmbeddingProviderConfig, LlmChain, LlmProviderConfig,
	Memos, Providers, Qdrant, Service, Storage, Telegram, Webhooks,
};

use std::{fs, net::IpAddr, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if !cfg.providers.llm.providers.iter().any(|provider| provider.enabled) {
		return Err(Error::Validation {
			message: "providers.llm.providers must contain at least one enabled provider."
				.to_string(),
		});
	}

	for provider in cfg.providers.llm.providers.iter().filter(|provider| provider.enabled) {
		if provider.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.llm.providers.name must be non-empty.".to_string(),
			});
		}
		if provider.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {} api_key must be non-empty.", provider.name),
			});
		}
		if provider.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {} model must be non-empty.", provider.name),
			});
		}
		if provider.timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!(
					"Provider {} timeout_ms must be greater than zero.",
					provider.name
				),
			});
		}
	}

	if cfg.providers.llm.retry_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.llm.retry_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("storage.memos.base_url", &cfg.storage.memos.base_url),
		("storage.memos.token", &cfg.storage.memos.token),
		("telegram.bot_token", &cfg.telegram.bot_token),
		("webhooks.secret", &cfg.webhooks.secret),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if let Some(qdrant) = cfg.storage.qdrant.as_ref() {
		let Some(embedding) = cfg.providers.embedding.as_ref() else {
			return Err(Error::Validation {
				message: "storage.qdrant requires providers.embedding.".to_string(),
			});
		};

		if qdrant.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.qdrant.collection must be non-empty.".to_string(),
			});
		}
		if embedding.dimensions == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must be greater than zero.".to_string(),
			});
		}
		if embedding.dimensions != qdrant.vector_dim {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
					.to_string(),
			});
		}
		if embedding.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "Provider embedding api_key must be non-empty.".to_string(),
			});
		}
	}

	if cfg.webhooks.rate_limit_per_minute == 0 {
		return Err(Error::Validation {
			message: "webhooks.rate_limit_per_minute must be greater than zero.".to_string(),
		});
	}

	for entry in &cfg.webhooks.ip_allow_list {
		if !is_valid_allow_entry(entry) {
			return Err(Error::Validation {
				message: format!("webhooks.ip_allow_list entry {entry:?} is not an IP or CIDR."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.public_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.service.public_url = None;
	}
	if let Some(url) = cfg.service.public_url.as_mut() {
		*url = url.trim_end_matches('/').to_string();
	}

	for provider in &mut cfg.providers.llm.providers {
		if provider.base_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
			provider.base_url = None;
		}
	}

	if let Some(qdrant) = cfg.storage.qdrant.as_mut()
		&& qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		qdrant.api_key = None;
	}
	if cfg.storage.qdrant.as_ref().map(|qdrant| qdrant.url.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant = None;
	}
	if cfg
		.calendar
		.as_ref()
		.map(|calendar| calendar.credentials_path.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.calendar = None;
	}

	cfg.storage.memos.base_url = cfg.storage.memos.base_url.trim_end_matches('/').to_string();
	cfg.webhooks.ip_allow_list.retain(|entry| !entry.trim().is_empty());
}

fn is_valid_allow_entry(entry: &str) -> bool {
	let entry = entry.trim();
	let Some((addr, prefix)) = entry.split_once('/') else {
		return entry.parse::<IpAddr>().is_ok();
	};
	let Ok(addr) = addr.parse::<IpAddr>() else {
		return false;
	};
	let Ok(prefix) = prefix.parse::<u8>() else {
		return false;
	};

	match addr {
		IpAddr::V4(_) => prefix <= 32,
		IpAddr::V6(_) => prefix <= 128,
	}
}
