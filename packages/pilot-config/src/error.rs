use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cannot read pilot config {path:?}: {source}.")]
	ReadConfig { path: PathBuf, source: std::io::Error },
	#[error("Cannot parse pilot config {path:?}: {source}")]
	ParseConfig { path: PathBuf, source: toml::de::Error },
	#[error("Invalid pilot config: {message}")]
	Validation { message: String },
}
