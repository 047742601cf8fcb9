//! Google Calendar v3 client authenticated with a stored OAuth token.

use std::{path::Path, time::Duration};

use chrono::{DateTime, FixedOffset};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_MAX_RESULTS: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
	pub access_token: String,
	#[serde(default)]
	pub refresh_token: Option<String>,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<String>,
	#[serde(default = "default_token_uri")]
	pub token_uri: String,
}
impl Credentials {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path)?;

		Ok(serde_json::from_str(&raw)?)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
	pub calendar_id: Option<String>,
	pub summary: String,
	pub description: String,
	pub start_time: DateTime<FixedOffset>,
	pub end_time: DateTime<FixedOffset>,
	pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
	pub id: String,
	pub html_link: String,
	pub summary: String,
	pub start: Option<DateTime<FixedOffset>>,
	pub end: Option<DateTime<FixedOffset>>,
}

pub struct CalendarClient {
	api_base: String,
	calendar_id: String,
	credentials: Credentials,
	access_token: RwLock<String>,
	client: Client,
}
impl CalendarClient {
	pub fn new(cfg: &pilot_config::Calendar) -> Result<Self> {
		let credentials = Credentials::load(Path::new(&cfg.credentials_path))?;

		Self::with_credentials(credentials, &cfg.calendar_id, DEFAULT_API_BASE, cfg.timeout_ms)
	}

	pub fn with_credentials(
		credentials: Credentials,
		calendar_id: &str,
		api_base: &str,
		timeout_ms: u64,
	) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;

		Ok(Self {
			api_base: api_base.trim_end_matches('/').to_string(),
			calendar_id: calendar_id.to_string(),
			access_token: RwLock::new(credentials.access_token.clone()),
			credentials,
			client,
		})
	}

	pub async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
		if event.end_time < event.start_time {
			return Err(Error::InvalidArgument("Event ends before it starts.".to_string()));
		}

		let calendar_id = event.calendar_id.as_deref().unwrap_or(&self.calendar_id);
		let url = format!("{}/calendars/{}/events", self.api_base, encode_segment(calendar_id));
		let body = serde_json::json!({
			"summary": event.summary,
			"description": event.description,
			"start": { "dateTime": event.start_time.to_rfc3339(), "timeZone": event.timezone },
			"end": { "dateTime": event.end_time.to_rfc3339(), "timeZone": event.timezone },
		});
		let response =
			self.send(|token| self.client.post(&url).bearer_auth(token).json(&body)).await?;
		let raw: RawEvent = crate::ensure_success("calendar", response).await?.json().await?;

		Ok(raw.into_event())
	}

	pub async fn list_events(
		&self,
		calendar_id: Option<&str>,
		time_min: DateTime<FixedOffset>,
		time_max: DateTime<FixedOffset>,
		max_results: u32,
	) -> Result<Vec<CalendarEvent>> {
		let calendar_id = calendar_id.unwrap_or(&self.calendar_id);
		let url = format!("{}/calendars/{}/events", self.api_base, encode_segment(calendar_id));
		let query = [
			("timeMin", time_min.to_rfc3339()),
			("timeMax", time_max.to_rfc3339()),
			("maxResults", max_results.max(1).to_string()),
			("singleEvents", "true".to_string()),
			("orderBy", "startTime".to_string()),
		];
		let response =
			self.send(|token| self.client.get(&url).bearer_auth(token).query(&query)).await?;
		let list: RawEventList = crate::ensure_success("calendar", response).await?.json().await?;

		Ok(list.items.into_iter().map(RawEvent::into_event).collect())
	}

	/// Sends a request, refreshing the access token once on HTTP 401.
	async fn send<F>(&self, build: F) -> Result<Response>
	where
		F: Fn(&str) -> RequestBuilder,
	{
		let token = self.access_token.read().await.clone();
		let response = build(&token).send().await?;

		if response.status() != StatusCode::UNAUTHORIZED || self.credentials.refresh_token.is_none()
		{
			return Ok(response);
		}

		tracing::info!("Calendar access token rejected. Refreshing.");

		let token = self.refresh().await?;

		Ok(build(&token).send().await?)
	}

	async fn refresh(&self) -> Result<String> {
		let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
			self.credentials.refresh_token.as_deref(),
			self.credentials.client_id.as_deref(),
			self.credentials.client_secret.as_deref(),
		) else {
			return Err(Error::InvalidArgument(
				"Calendar credentials cannot refresh without client_id and client_secret."
					.to_string(),
			));
		};
		let form = [
			("grant_type", "refresh_token"),
			("refresh_token", refresh_token),
			("client_id", client_id),
			("client_secret", client_secret),
		];
		let response = self.client.post(&self.credentials.token_uri).form(&form).send().await?;
		let refreshed: TokenResponse =
			crate::ensure_success("oauth", response).await?.json().await?;
		let mut guard = self.access_token.write().await;

		*guard = refreshed.access_token.clone();

		Ok(refreshed.access_token)
	}
}

fn default_token_uri() -> String {
	DEFAULT_TOKEN_URI.to_string()
}

fn encode_segment(segment: &str) -> String {
	segment.replace('%', "%25").replace('/', "%2F").replace('#', "%23").replace('@', "%40")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEventList {
	items: Vec<RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEvent {
	id: String,
	html_link: String,
	summary: String,
	start: Option<RawEventTime>,
	end: Option<RawEventTime>,
}
impl RawEvent {
	fn into_event(self) -> CalendarEvent {
		CalendarEvent {
			id: self.id,
			html_link: self.html_link,
			summary: self.summary,
			start: self.start.and_then(|time| time.date_time),
			end: self.end.and_then(|time| time.date_time),
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEventTime {
	date_time: Option<DateTime<FixedOffset>>,
}
