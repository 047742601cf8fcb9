use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub storage: Storage,
	pub calendar: Option<Calendar>,
	pub telegram: Telegram,
	pub webhooks: Webhooks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	#[serde(default = "default_timezone")]
	pub timezone: String,
	/// Public base URL used to register the messenger webhook at startup.
	#[serde(default)]
	pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub llm: LlmChain,
	pub embedding: Option<EmbeddingProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmChain {
	#[serde(default = "default_true")]
	pub fallback_enabled: bool,
	#[serde(default = "default_retry_attempts")]
	pub retry_attempts: u32,
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Deadline across the whole fallback chain. Zero disables it.
	#[serde(default)]
	pub max_total_timeout_ms: u64,
	pub providers: Vec<LlmProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub name: String,
	#[serde(default = "default_true")]
	pub enabled: bool,
	pub priority: i32,
	pub api_key: String,
	pub model: String,
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub memos: Memos,
	pub qdrant: Option<Qdrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Memos {
	pub base_url: String,
	pub token: String,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default)]
	pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Calendar {
	pub credentials_path: String,
	#[serde(default = "default_calendar_id")]
	pub calendar_id: String,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Telegram {
	pub bot_token: String,
	#[serde(default = "default_telegram_api_base")]
	pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Webhooks {
	pub secret: String,
	#[serde(default = "default_rate_limit_per_minute")]
	pub rate_limit_per_minute: u32,
	/// Exact addresses or CIDR ranges. Empty allows every source.
	#[serde(default)]
	pub ip_allow_list: Vec<String>,
}

fn default_timezone() -> String {
	DEFAULT_TIMEZONE.to_string()
}

fn default_true() -> bool {
	true
}

fn default_retry_attempts() -> u32 {
	3
}

fn default_retry_delay_ms() -> u64 {
	1_000
}

fn default_provider_timeout_ms() -> u64 {
	30_000
}

fn default_calendar_id() -> String {
	"primary".to_string()
}

fn default_telegram_api_base() -> String {
	"https://api.telegram.org".to_string()
}

fn default_rate_limit_per_minute() -> u32 {
	60
}
