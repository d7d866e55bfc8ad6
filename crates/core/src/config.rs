//! Gateway configuration with file, env, and default layering.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SessionId;

fn default_sessions_dir() -> PathBuf {
	PathBuf::from("./sessions")
}

fn default_max_inline_media_bytes() -> u64 {
	10_000_000
}

fn default_surface_wait_ms() -> u64 {
	30_000
}

fn default_eval_retry_delay_ms() -> u64 {
	100
}

fn default_eval_retry_budget() -> u32 {
	600
}

/// Configuration consumed by the session lifecycle subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
	/// Root directory holding one `session-<id>` subdirectory per session.
	pub sessions_dir: PathBuf,
	/// Media at or above this declared size is forwarded as a placeholder
	/// (mimetype + size) instead of an inline payload.
	pub max_inline_media_bytes: u64,
	/// Bounded wait for a client's automation surface to appear.
	pub surface_wait_ms: u64,
	/// Delay between trivial-evaluation attempts while the surface settles.
	pub eval_retry_delay_ms: u64,
	/// Maximum trivial-evaluation attempts before validation reports a
	/// timeout instead of waiting indefinitely.
	pub eval_retry_budget: u32,
}

impl Default for HubConfig {
	fn default() -> Self {
		Self {
			sessions_dir: default_sessions_dir(),
			max_inline_media_bytes: default_max_inline_media_bytes(),
			surface_wait_ms: default_surface_wait_ms(),
			eval_retry_delay_ms: default_eval_retry_delay_ms(),
			eval_retry_budget: default_eval_retry_budget(),
		}
	}
}

impl HubConfig {
	/// Loads configuration from a JSON file, then applies env overrides.
	///
	/// A missing file yields defaults; a malformed file is an error.
	pub fn load(path: &Path) -> Result<Self> {
		let mut config = match fs::read_to_string(path) {
			Ok(content) => serde_json::from_str(&content)?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
			Err(err) => return Err(err.into()),
		};
		config.apply_env();
		Ok(config)
	}

	/// Applies `CHATHUB_*` environment overrides in place.
	pub fn apply_env(&mut self) {
		if let Some(dir) = std::env::var_os("CHATHUB_SESSIONS_DIR") {
			self.sessions_dir = PathBuf::from(dir);
		}
		if let Ok(v) = std::env::var("CHATHUB_MAX_INLINE_MEDIA_BYTES") {
			if let Ok(bytes) = v.parse() {
				self.max_inline_media_bytes = bytes;
			}
		}
		if let Ok(v) = std::env::var("CHATHUB_SURFACE_WAIT_MS") {
			if let Ok(ms) = v.parse() {
				self.surface_wait_ms = ms;
			}
		}
	}

	/// Storage directory for one session (`sessions_dir/session-<id>`).
	pub fn session_dir(&self, id: &SessionId) -> PathBuf {
		self.sessions_dir.join(id.dir_name())
	}

	pub fn surface_wait(&self) -> Duration {
		Duration::from_millis(self.surface_wait_ms)
	}

	pub fn eval_retry_delay(&self) -> Duration {
		Duration::from_millis(self.eval_retry_delay_ms)
	}
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[test]
	fn defaults_are_sensible() {
		let config = HubConfig::default();
		assert_eq!(config.max_inline_media_bytes, 10_000_000);
		assert_eq!(config.eval_retry_delay_ms, 100);
		assert!(config.surface_wait_ms >= 10_000);
	}

	#[test]
	fn missing_file_yields_defaults() {
		let dir = tempdir().unwrap();
		let config = HubConfig::load(&dir.path().join("absent.json")).unwrap();
		assert_eq!(config.max_inline_media_bytes, HubConfig::default().max_inline_media_bytes);
	}

	#[test]
	fn partial_file_fills_remaining_defaults() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, r#"{"sessions_dir": "/var/lib/chathub", "max_inline_media_bytes": 1048576}"#).unwrap();

		let config = HubConfig::load(&path).unwrap();
		assert_eq!(config.sessions_dir, PathBuf::from("/var/lib/chathub"));
		assert_eq!(config.max_inline_media_bytes, 1_048_576);
		assert_eq!(config.eval_retry_budget, HubConfig::default().eval_retry_budget);
	}

	#[test]
	fn malformed_file_is_an_error() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, "{not json").unwrap();
		assert!(HubConfig::load(&path).is_err());
	}

	#[test]
	fn session_dir_uses_naming_template() {
		let config = HubConfig {
			sessions_dir: PathBuf::from("/data"),
			..Default::default()
		};
		let id = SessionId::new("abc").unwrap();
		assert_eq!(config.session_dir(&id), PathBuf::from("/data/session-abc"));
	}
}
