pub mod calendar;
pub mod memos;
pub mod qdrant;
pub mod telegram;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reads the body of a non-success response into an [`Error::Status`].
pub(crate) async fn ensure_success(
	service: &'static str,
	response: reqwest::Response,
) -> Result<reqwest::Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();

	if status == reqwest::StatusCode::NOT_FOUND {
		return Err(Error::NotFound(format!("{service}: {body}")));
	}

	Err(Error::Status { service, status: status.as_u16(), body })
}
