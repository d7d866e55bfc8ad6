//! Concurrency-safe mapping from session id to live client handle.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::bridge::EventBridge;
use crate::client::{ClientFactory, ClientHandle, ClientOptions};
use crate::config::HubConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::guard::checked_session_dir;
use crate::types::SessionId;
use crate::validator::{ReasonCode, ValidationResult};

/// Outcome of a create request.
pub struct CreateOutcome {
	/// `false` when an entry already existed; the existing handle is
	/// returned either way.
	pub created: bool,
	pub handle: Arc<dyn ClientHandle>,
}

/// Owned, injectable session registry.
///
/// Exactly one handle exists per id at any time; the map is mutated only
/// through [`create`](Self::create) and [`delete`](Self::delete).
pub struct SessionRegistry {
	config: Arc<HubConfig>,
	factory: Arc<dyn ClientFactory>,
	sink: Arc<dyn EventSink>,
	sessions: DashMap<SessionId, Arc<dyn ClientHandle>>,
}

impl SessionRegistry {
	pub fn new(config: Arc<HubConfig>, factory: Arc<dyn ClientFactory>, sink: Arc<dyn EventSink>) -> Self {
		Self {
			config,
			factory,
			sink,
			sessions: DashMap::new(),
		}
	}

	pub fn config(&self) -> Arc<HubConfig> {
		self.config.clone()
	}

	pub fn exists(&self, id: &SessionId) -> bool {
		self.sessions.contains_key(id)
	}

	pub fn get(&self, id: &SessionId) -> Option<Arc<dyn ClientHandle>> {
		self.sessions.get(id).map(|entry| entry.value().clone())
	}

	/// Currently registered session ids.
	pub fn ids(&self) -> Vec<SessionId> {
		self.sessions.iter().map(|entry| entry.key().clone()).collect()
	}

	/// Creates and registers a session, or reports the existing handle.
	///
	/// Construction failures propagate; initialization runs detached and
	/// its failures are only logged, since the client can recover from
	/// transient ones on its own.
	pub async fn create(&self, id: &SessionId) -> Result<CreateOutcome> {
		if let Some(existing) = self.get(id) {
			debug!(target = "chathub.registry", session = %id, "session already registered");
			return Ok(CreateOutcome { created: false, handle: existing });
		}

		let options = ClientOptions {
			session_id: id.clone(),
			data_dir: self.config.session_dir(id),
		};
		let handle = self.factory.create(options).await?;

		// Construction suspends, so a reentrant create may have inserted
		// meanwhile; the first inserted handle wins.
		let raced = match self.sessions.entry(id.clone()) {
			Entry::Occupied(entry) => Some(entry.get().clone()),
			Entry::Vacant(entry) => {
				entry.insert(handle.clone());
				None
			}
		};
		if let Some(existing) = raced {
			debug!(target = "chathub.registry", session = %id, "lost creation race; discarding new handle");
			let _ = handle.destroy().await;
			return Ok(CreateOutcome { created: false, handle: existing });
		}

		EventBridge::attach(id.clone(), &handle, self.sink.clone(), self.config.max_inline_media_bytes);

		let init_handle = handle.clone();
		let init_id = id.clone();
		tokio::spawn(async move {
			if let Err(err) = init_handle.initialize().await {
				warn!(target = "chathub.registry", session = %init_id, error = %err, "client initialization failed");
			}
		});

		info!(target = "chathub.registry", session = %id, "session registered");
		Ok(CreateOutcome { created: true, handle })
	}

	/// State-dependent teardown driven by a prior validation.
	///
	/// - connected: graceful logout only. The entry and its storage stay;
	///   the client's later disconnect event is what reconciles state.
	/// - not connected: force-destroy, remove storage (path-guarded), then
	///   drop the entry.
	/// - not found / error: nothing to tear down.
	///
	/// Teardown errors propagate so callers observe a failed delete.
	pub async fn delete(&self, id: &SessionId, validation: &ValidationResult) -> Result<()> {
		// Existence can have changed since the caller validated.
		let Some(handle) = self.get(id) else {
			debug!(target = "chathub.registry", session = %id, "delete: no registered handle");
			return Ok(());
		};

		if validation.success {
			info!(target = "chathub.registry", session = %id, "requesting graceful logout");
			handle.logout().await?;
			return Ok(());
		}

		match &validation.message {
			ReasonCode::SessionNotConnected => {
				info!(target = "chathub.registry", session = %id, "destroying inactive session");
				handle.destroy().await?;

				if let Some(dir) = checked_session_dir(&self.config.sessions_dir, id)? {
					tokio::fs::remove_dir_all(&dir).await?;
					debug!(target = "chathub.registry", session = %id, dir = %dir.display(), "session storage removed");
				}

				self.sessions.remove(id);
				Ok(())
			}
			reason => {
				debug!(target = "chathub.registry", session = %id, reason = %reason, "delete: nothing to tear down");
				Ok(())
			}
		}
	}
}
