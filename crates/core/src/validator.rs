//! Readiness/health classification for registered sessions.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::client::{AutomationSurface, ClientHandle};
use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::registry::SessionRegistry;
use crate::types::{ConnectivityState, SessionId};

/// Classification reason carried in a [`ValidationResult`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReasonCode {
	SessionNotFound,
	SessionNotConnected,
	SessionConnected,
	/// Timeout or collaborator failure; carries the error detail.
	Error(String),
}

impl ReasonCode {
	pub fn as_str(&self) -> &str {
		match self {
			ReasonCode::SessionNotFound => "session_not_found",
			ReasonCode::SessionNotConnected => "session_not_connected",
			ReasonCode::SessionConnected => "session_connected",
			ReasonCode::Error(detail) => detail,
		}
	}
}

impl fmt::Display for ReasonCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for ReasonCode {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

/// Outcome of one validation pass. Computed fresh on every call, never
/// persisted.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationResult {
	pub success: bool,
	pub state: Option<ConnectivityState>,
	pub message: ReasonCode,
}

impl ValidationResult {
	pub fn not_found() -> Self {
		Self {
			success: false,
			state: None,
			message: ReasonCode::SessionNotFound,
		}
	}

	pub fn not_connected(state: ConnectivityState) -> Self {
		Self {
			success: false,
			state: Some(state),
			message: ReasonCode::SessionNotConnected,
		}
	}

	pub fn connected(state: ConnectivityState) -> Self {
		Self {
			success: true,
			state: Some(state),
			message: ReasonCode::SessionConnected,
		}
	}

	pub fn error(err: &HubError) -> Self {
		Self {
			success: false,
			state: None,
			message: ReasonCode::Error(err.to_string()),
		}
	}
}

/// Polls a session's client handle until it can be classified.
pub struct SessionValidator {
	registry: Arc<SessionRegistry>,
}

impl SessionValidator {
	pub fn new(registry: Arc<SessionRegistry>) -> Self {
		Self { registry }
	}

	/// Classifies the current connectivity of `id`.
	///
	/// Never returns an error: collaborator failures and timeouts are
	/// folded into the result's reason code.
	pub async fn validate(&self, id: &SessionId) -> ValidationResult {
		let Some(handle) = self.registry.get(id) else {
			debug!(target = "chathub.validator", session = %id, "no registered handle");
			return ValidationResult::not_found();
		};

		match self.classify(id, handle.as_ref()).await {
			Ok(result) => result,
			Err(err) => {
				debug!(target = "chathub.validator", session = %id, error = %err, "validation failed");
				ValidationResult::error(&err)
			}
		}
	}

	async fn classify(&self, id: &SessionId, handle: &dyn ClientHandle) -> Result<ValidationResult> {
		let config = self.registry.config();

		let surface = self.wait_for_surface(id, handle, &config).await?;
		self.wait_for_evaluation(id, surface.as_ref(), &config).await?;

		let state = handle.state().await?;
		if state.is_connected() {
			Ok(ValidationResult::connected(state))
		} else {
			Ok(ValidationResult::not_connected(state))
		}
	}

	/// Bounded poll for the automation surface to appear.
	async fn wait_for_surface(&self, id: &SessionId, handle: &dyn ClientHandle, config: &HubConfig) -> Result<Arc<dyn AutomationSurface>> {
		let wait = config.surface_wait();
		let poll = std::time::Duration::from_millis(200);

		let surface = tokio::time::timeout(wait, async {
			loop {
				if let Some(surface) = handle.surface() {
					return surface;
				}
				tokio::time::sleep(poll).await;
			}
		})
		.await
		.map_err(|_| HubError::Timeout {
			ms: config.surface_wait_ms,
			condition: "automation surface".to_string(),
		})?;

		debug!(target = "chathub.validator", session = %id, "automation surface available");
		Ok(surface)
	}

	/// Retries a trivial evaluation until the surface answers.
	///
	/// The surface may be mid-navigation, so individual attempts are
	/// expected to fail. Attempts are capped by `eval_retry_budget` rather
	/// than looping forever; exhausting the budget reports a timeout.
	async fn wait_for_evaluation(&self, id: &SessionId, surface: &dyn AutomationSurface, config: &HubConfig) -> Result<()> {
		let delay = config.eval_retry_delay();

		for attempt in 1..=config.eval_retry_budget {
			match surface.evaluate("1").await {
				Ok(_) => {
					debug!(target = "chathub.validator", session = %id, attempt, "surface responsive");
					return Ok(());
				}
				Err(_) => tokio::time::sleep(delay).await,
			}
		}

		Err(HubError::Timeout {
			ms: u64::from(config.eval_retry_budget) * config.eval_retry_delay_ms,
			condition: "surface evaluation".to_string(),
		})
	}
}
