use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Directory-name prefix for persisted session storage.
pub const SESSION_DIR_PREFIX: &str = "session-";

/// Opaque session identifier, unique per session.
///
/// Derived 1:1 from a `session-<id>` storage directory name. Construction
/// rejects anything outside `[A-Za-z0-9_-]` so an id can never carry a
/// path-separator sequence that escapes the sessions root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
	pub fn new(id: impl Into<String>) -> Result<Self> {
		let id = id.into();
		if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
			return Err(HubError::InvalidSessionId(id));
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Storage directory name for this session (`session-<id>`).
	pub fn dir_name(&self) -> String {
		format!("{SESSION_DIR_PREFIX}{}", self.0)
	}

	/// Parses a storage directory name back into an id.
	///
	/// Returns `None` when the name does not match the `session-<id>`
	/// pattern or the embedded id fails validation.
	pub fn from_dir_name(name: &str) -> Option<Self> {
		let id = name.strip_prefix(SESSION_DIR_PREFIX)?;
		Self::new(id).ok()
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for SessionId {
	type Err = HubError;

	fn from_str(s: &str) -> Result<Self> {
		Self::new(s)
	}
}

impl TryFrom<String> for SessionId {
	type Error = HubError;

	fn try_from(value: String) -> Result<Self> {
		Self::new(value)
	}
}

impl From<SessionId> for String {
	fn from(id: SessionId) -> Self {
		id.0
	}
}

/// Connectivity state reported by the messaging client.
///
/// Treated as an opaque string; the core only ever compares it against the
/// single fully-connected sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectivityState(String);

impl ConnectivityState {
	/// Sentinel value the client reports once fully connected.
	pub const CONNECTED: &'static str = "CONNECTED";

	pub fn new(state: impl Into<String>) -> Self {
		Self(state.into())
	}

	pub fn connected() -> Self {
		Self(Self::CONNECTED.to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_connected(&self) -> bool {
		self.0 == Self::CONNECTED
	}
}

impl fmt::Display for ConnectivityState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ConnectivityState {
	fn from(state: &str) -> Self {
		Self::new(state)
	}
}
