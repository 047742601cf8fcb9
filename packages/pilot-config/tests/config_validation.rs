use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use pilot_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn table_mut<'a>(root: &'a mut toml::Table, path: &[&str]) -> &'a mut toml::Table {
	let mut current = root;

	for key in path {
		current = current
			.get_mut(*key)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{}].", path.join(".")));
	}

	current
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("pilot_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> pilot_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = pilot_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	load_payload(sample_toml_with(|_| {})).expect("Sample config must load.")
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = base_config();

	assert_eq!(cfg.storage.memos.base_url, "http://127.0.0.1:5230");
	assert_eq!(cfg.storage.memos.timeout_ms, 30_000);
	assert_eq!(cfg.providers.llm.providers.len(), 2);
	assert!(cfg.providers.llm.providers.iter().all(|provider| provider.enabled));
	assert_eq!(cfg.telegram.api_base, "https://api.telegram.org");
	assert!(cfg.calendar.is_none());
	assert!(cfg.service.public_url.is_none());
}

#[test]
fn timezone_defaults_when_missing() {
	let payload = sample_toml_with(|root| {
		table_mut(root, &["service"]).remove("timezone");
	});
	let cfg = load_payload(payload).expect("Config without timezone must load.");

	assert_eq!(cfg.service.timezone, pilot_config::DEFAULT_TIMEZONE);
}

#[test]
fn blank_public_url_is_treated_as_unset() {
	let payload = sample_toml_with(|root| {
		table_mut(root, &["service"])
			.insert("public_url".to_string(), Value::String("   ".to_string()));
	});
	let cfg = load_payload(payload).expect("Config with blank public_url must load.");

	assert!(cfg.service.public_url.is_none());
}

#[test]
fn public_url_trailing_slash_is_trimmed() {
	let payload = sample_toml_with(|root| {
		table_mut(root, &["service"]).insert(
			"public_url".to_string(),
			Value::String("https://bot.example.com/".to_string()),
		);
	});
	let cfg = load_payload(payload).expect("Config with public_url must load.");

	assert_eq!(cfg.service.public_url.as_deref(), Some("https://bot.example.com"));
}

#[test]
fn at_least_one_enabled_provider_is_required() {
	let mut cfg = base_config();

	for provider in &mut cfg.providers.llm.providers {
		provider.enabled = false;
	}

	let err = pilot_config::validate(&cfg).expect_err("Expected provider validation error.");

	assert!(
		err.to_string()
			.contains("providers.llm.providers must contain at least one enabled provider."),
		"Unexpected error: {err}"
	);
}

#[test]
fn disabled_provider_may_have_empty_key() {
	let mut cfg = base_config();

	cfg.providers.llm.providers[1].enabled = false;
	cfg.providers.llm.providers[1].api_key = String::new();

	assert!(pilot_config::validate(&cfg).is_ok());
}

#[test]
fn enabled_provider_requires_api_key() {
	let mut cfg = base_config();

	cfg.providers.llm.providers[0].api_key = "  ".to_string();

	let err = pilot_config::validate(&cfg).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("Provider gemini api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut cfg = base_config();

	if let Some(qdrant) = cfg.storage.qdrant.as_mut() {
		qdrant.vector_dim = 1536;
	}

	let err = pilot_config::validate(&cfg).expect_err("Expected dimension validation error.");

	assert!(
		err.to_string()
			.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn vector_index_requires_embedding_provider() {
	let mut cfg = base_config();

	cfg.providers.embedding = None;

	let err = pilot_config::validate(&cfg).expect_err("Expected embedding validation error.");

	assert!(
		err.to_string().contains("storage.qdrant requires providers.embedding."),
		"Unexpected error: {err}"
	);
}

#[test]
fn vector_index_is_optional() {
	let mut cfg = base_config();

	cfg.storage.qdrant = None;
	cfg.providers.embedding = None;

	assert!(pilot_config::validate(&cfg).is_ok());
}

#[test]
fn webhook_secret_must_be_set() {
	let mut cfg = base_config();

	cfg.webhooks.secret = String::new();

	let err = pilot_config::validate(&cfg).expect_err("Expected webhook secret validation error.");

	assert!(
		err.to_string().contains("webhooks.secret must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rate_limit_must_be_positive() {
	let mut cfg = base_config();

	cfg.webhooks.rate_limit_per_minute = 0;

	let err = pilot_config::validate(&cfg).expect_err("Expected rate limit validation error.");

	assert!(
		err.to_string().contains("webhooks.rate_limit_per_minute must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn allow_list_entries_must_be_addresses_or_cidrs() {
	let mut cfg = base_config();

	cfg.webhooks.ip_allow_list = vec!["10.0.0.0/33".to_string()];

	let err = pilot_config::validate(&cfg).expect_err("Expected allow list validation error.");

	assert!(err.to_string().contains("is not an IP or CIDR."), "Unexpected error: {err}");

	cfg.webhooks.ip_allow_list = vec!["::1".to_string(), "fd00::/8".to_string()];

	assert!(pilot_config::validate(&cfg).is_ok());
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("pilot_config_test_missing_file.toml");
	let err = pilot_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let err =
		load_payload("[service\nhttp_bind = 1".to_string()).expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err}");
}
