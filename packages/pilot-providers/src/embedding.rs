use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Error, Result};

/// Client for an OpenAI-style `/embeddings` endpoint.
pub struct Embedder {
	url: String,
	model: String,
	dimensions: u32,
	headers: HeaderMap,
	client: Client,
}
impl Embedder {
	pub fn new(cfg: &pilot_config::EmbeddingProviderConfig) -> Result<Self> {
		Ok(Self {
			url: format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path),
			model: cfg.model.clone(),
			dimensions: cfg.dimensions,
			headers: crate::auth_headers(&cfg.api_key, &cfg.default_headers)?,
			client: crate::http_client(cfg.timeout_ms)?,
		})
	}

	pub fn dimensions(&self) -> u32 {
		self.dimensions
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let body = serde_json::json!({
			"model": self.model,
			"input": texts,
			"dimensions": self.dimensions,
		});
		let response =
			self.client.post(&self.url).headers(self.headers.clone()).json(&body).send().await?;
		let json: Value = crate::ensure_success("embedding", response).await?.json().await?;
		let vectors = parse_embedding_response(json)?;

		if vectors.len() != texts.len() {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding response returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}

		Ok(vectors)
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			let message = "Embedding item missing embedding array.".to_string();

			Error::InvalidResponse { message }
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
