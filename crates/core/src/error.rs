use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
	/// Session identifier contains characters that are not allowed.
	#[error("invalid session id: {0:?}")]
	InvalidSessionId(String),

	/// Computed storage path resolved outside the sessions root.
	///
	/// Always fatal to the operation that triggered the check; never
	/// downgraded to a warning.
	#[error("session path escapes sessions root: {path}")]
	InvalidPath { path: PathBuf },

	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	/// Failure reported by the messaging client collaborator.
	#[error("client error: {0}")]
	Client(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl HubError {
	/// Wraps an arbitrary collaborator failure as a client error.
	pub fn client(err: impl std::fmt::Display) -> Self {
		HubError::Client(err.to_string())
	}
}
