//! Path containment check guarding destructive storage operations.

use std::path::{Path, PathBuf};

use crate::error::{HubError, Result};
use crate::types::SessionId;

/// Resolves the storage directory for `id` and proves it lives inside
/// `root` before any recursive delete touches it.
///
/// Both paths go through filesystem canonicalization so symlinks and
/// relative segments cannot smuggle the target outside the root. Returns
/// `Ok(None)` when the root or the target does not exist (nothing to
/// delete); returns [`HubError::InvalidPath`] when the resolved target is
/// not a strict subdirectory of the resolved root.
pub fn checked_session_dir(root: &Path, id: &SessionId) -> Result<Option<PathBuf>> {
	let resolved_root = match root.canonicalize() {
		Ok(p) => p,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err.into()),
	};

	let target = resolved_root.join(id.dir_name());
	let resolved_target = match target.canonicalize() {
		Ok(p) => p,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err.into()),
	};

	if resolved_target == resolved_root || !resolved_target.starts_with(&resolved_root) {
		return Err(HubError::InvalidPath { path: resolved_target });
	}

	Ok(Some(resolved_target))
}
