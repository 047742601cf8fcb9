use std::net::SocketAddr;

use axum::{
	Json, Router,
	body::{self, Body, Bytes},
	extract::{ConnectInfo, Request, State},
	http::{StatusCode, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pilot_domain::{
	memo_webhook::MemoWebhookPayload,
	scm::{self, WebhookEvent},
};
use pilot_service::{chat::Update, supervisor::BACKGROUND_DEADLINE};

use crate::{
	security::{GITHUB_EVENT_HEADER, Platform, Rejection, header_str},
	state::AppState,
};

/// Upper bound for a buffered webhook body.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/ready", get(health))
		.route("/live", get(health))
		.route("/webhook/telegram", post(telegram))
		.route("/webhook/memos", post(memos))
		.route("/webhook/github", post(github))
		.route("/webhook/gitlab", post(gitlab))
		.with_state(state)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
	pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookAck {
	Accepted,
	Ignored { reason: String },
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok".to_string() })
}

async fn telegram(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
	let update: Update = serde_json::from_slice(&body).map_err(invalid_payload)?;
	let chat = state.chat.clone();

	state.supervisor.spawn_detached("telegram-update", BACKGROUND_DEADLINE, async move {
		if let Err(err) = chat.handle_update(&update).await {
			tracing::error!(
				update_id = update.update_id,
				error = %err,
				"Failed to handle messenger update."
			);
		}
	});

	Ok(Json(WebhookAck::Accepted))
}

async fn memos(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
	let payload: MemoWebhookPayload = serde_json::from_slice(&body).map_err(invalid_payload)?;
	let Some(reembedder) = state.reembedder.clone() else {
		tracing::debug!(activity = %payload.activity_type, "No vector index. Skipping re-embed.");

		return Ok(Json(WebhookAck::Ignored {
			reason: "vector index is not configured".to_string(),
		}));
	};

	state.supervisor.spawn_detached("memos-reembed", BACKGROUND_DEADLINE, async move {
		match reembedder.handle(&payload).await {
			Ok(outcome) => tracing::info!(?outcome, "Note-store webhook processed."),
			Err(err) => {
				tracing::error!(
					activity = %payload.activity_type,
					error = %err,
					"Note-store webhook processing failed."
				);
			},
		}
	});

	Ok(Json(WebhookAck::Accepted))
}

async fn github(
	State(state): State<AppState>,
	request: Request,
) -> Result<Json<WebhookAck>, ApiError> {
	let (parts, body) = admitted(&state, Platform::Github, request).await?;
	let kind = header_str(&parts.headers, GITHUB_EVENT_HEADER).unwrap_or_default().to_string();
	let event = scm::parse_github(&kind, &body, Utc::now()).map_err(invalid_payload)?;
	let Some(event) = event else {
		return Ok(Json(WebhookAck::Ignored { reason: format!("unsupported event {kind:?}") }));
	};

	Ok(Json(dispatch_scm(&state, event)))
}

async fn gitlab(
	State(state): State<AppState>,
	request: Request,
) -> Result<Json<WebhookAck>, ApiError> {
	let (_, body) = admitted(&state, Platform::Gitlab, request).await?;
	let event = scm::parse_gitlab(&body, Utc::now()).map_err(invalid_payload)?;
	let Some(event) = event else {
		return Ok(Json(WebhookAck::Ignored { reason: "unsupported object kind".to_string() }));
	};

	Ok(Json(dispatch_scm(&state, event)))
}

/// Buffers the body and runs the webhook guard over it.
async fn admitted(
	state: &AppState,
	platform: Platform,
	request: Request,
) -> Result<(Parts, Bytes), ApiError> {
	let (parts, body) = request.into_parts();
	let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
	let body = read_body(body).await?;

	state.guard.admit(platform, &parts.headers, peer, &body)?;

	Ok((parts, body))
}

async fn read_body(body: Body) -> Result<Bytes, ApiError> {
	body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|err| {
		ApiError::new(StatusCode::BAD_REQUEST, "invalid_body", format!("Unreadable body: {err}."))
	})
}

fn dispatch_scm(state: &AppState, event: WebhookEvent) -> WebhookAck {
	if !event.should_process() {
		tracing::info!(
			repository = %event.repository,
			action = %event.action,
			"Ignoring source-control event that is not a merge."
		);

		return WebhookAck::Ignored {
			reason: format!("action {:?} does not complete tasks", event.action),
		};
	}

	let completer = state.completer.clone();

	state.supervisor.spawn_detached("scm-complete", BACKGROUND_DEADLINE, async move {
		match completer.process(&event).await {
			Ok(outcome) => tracing::info!(
				repository = %event.repository,
				?outcome,
				"Source-control webhook processed."
			),
			Err(err) => {
				tracing::error!(
					repository = %event.repository,
					error = %err,
					"Source-control webhook processing failed."
				);
			},
		}
	});

	WebhookAck::Accepted
}

fn invalid_payload(err: serde_json::Error) -> ApiError {
	ApiError::new(StatusCode::BAD_REQUEST, "invalid_payload", format!("Invalid JSON: {err}."))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<Rejection> for ApiError {
	fn from(rejection: Rejection) -> Self {
		match rejection {
			Rejection::Forbidden =>
				Self::new(StatusCode::FORBIDDEN, "forbidden", "Source address is not allowed."),
			Rejection::Unauthorized => Self::new(
				StatusCode::UNAUTHORIZED,
				"unauthorized",
				"Webhook signature or token is invalid.",
			),
			Rejection::RateLimited => Self::new(
				StatusCode::TOO_MANY_REQUESTS,
				"rate_limited",
				"Too many webhook deliveries from this source.",
			),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
