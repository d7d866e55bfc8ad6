//! Bulk reconciliation between persisted storage and the registry.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::types::SessionId;
use crate::validator::SessionValidator;

/// Orchestrates restore-on-startup and flush passes over the sessions
/// root.
pub struct LifecycleManager {
	registry: Arc<SessionRegistry>,
	validator: SessionValidator,
}

impl LifecycleManager {
	pub fn new(registry: Arc<SessionRegistry>) -> Self {
		let validator = SessionValidator::new(registry.clone());
		Self { registry, validator }
	}

	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	pub fn validator(&self) -> &SessionValidator {
		&self.validator
	}

	/// Recreates registry entries for every persisted session directory.
	///
	/// Best-effort: scan and per-session failures are logged and
	/// swallowed so restoration can never prevent startup.
	pub async fn restore_all(&self) {
		let root = self.registry.config().sessions_dir.clone();
		if let Err(err) = fs::create_dir_all(&root) {
			warn!(target = "chathub.lifecycle", root = %root.display(), error = %err, "cannot ensure sessions root");
			return;
		}

		let ids = match scan_session_dirs(&root) {
			Ok(ids) => ids,
			Err(err) => {
				warn!(target = "chathub.lifecycle", root = %root.display(), error = %err, "session scan failed");
				return;
			}
		};

		info!(target = "chathub.lifecycle", count = ids.len(), "restoring persisted sessions");
		for id in ids {
			match self.registry.create(&id).await {
				Ok(outcome) if !outcome.created => {
					debug!(target = "chathub.lifecycle", session = %id, "already registered");
				}
				Ok(_) => {}
				Err(err) => {
					warn!(target = "chathub.lifecycle", session = %id, error = %err, "restore failed");
				}
			}
		}
	}

	/// Lists the session ids persisted under the sessions root.
	///
	/// A missing root means no sessions yet, not an error.
	pub fn scan(&self) -> Result<Vec<SessionId>> {
		let root = self.registry.config().sessions_dir.clone();
		match scan_session_dirs(&root) {
			Ok(ids) => Ok(ids),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(err) => Err(err.into()),
		}
	}

	/// Validates every persisted session and deletes per policy.
	///
	/// With `delete_only_inactive`, sessions that validate as connected
	/// are left alone; otherwise everything that validated (i.e. was
	/// found) is torn down. Sessions are processed strictly one at a time
	/// so graceful logouts and forced destructions never race on registry
	/// state. The first delete error propagates and stops the batch.
	pub async fn flush(&self, delete_only_inactive: bool) -> Result<()> {
		let root = self.registry.config().sessions_dir.clone();
		let ids = match scan_session_dirs(&root) {
			Ok(ids) => ids,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(err) => return Err(err.into()),
		};

		info!(target = "chathub.lifecycle", count = ids.len(), delete_only_inactive, "flushing sessions");
		for id in ids {
			let validation = self.validator.validate(&id).await;
			if !delete_only_inactive || !validation.success {
				self.registry.delete(&id, &validation).await?;
			} else {
				debug!(target = "chathub.lifecycle", session = %id, "connected; kept");
			}
		}
		Ok(())
	}
}

/// Lists `session-<id>` children of the sessions root.
///
/// Entries that do not match the naming pattern are skipped; a listed
/// directory may already be gone by the time it is processed, which later
/// steps treat as not-found rather than fatal.
fn scan_session_dirs(root: &Path) -> std::io::Result<Vec<SessionId>> {
	let mut ids = Vec::new();
	for entry in fs::read_dir(root)? {
		let entry = entry?;
		let name = entry.file_name();
		let Some(name) = name.to_str() else { continue };
		match SessionId::from_dir_name(name) {
			Some(id) => ids.push(id),
			None => debug!(target = "chathub.lifecycle", name, "skipping non-session entry"),
		}
	}
	ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
	Ok(ids)
}
