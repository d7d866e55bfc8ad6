//! Collaborator traits for the external messaging client library.
//!
//! The core never speaks the messaging wire protocol itself; it drives a
//! [`ClientHandle`] produced by an injected [`ClientFactory`] and observes
//! the handle through its event stream and automation surface.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::{ClientEvent, MediaPayload};
use crate::types::{ConnectivityState, SessionId};

/// Construction parameters for one session-scoped client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
	pub session_id: SessionId,
	/// Session-scoped credential/auth storage directory
	/// (`sessions_dir/session-<id>`). Contents are opaque to the core.
	pub data_dir: PathBuf,
}

/// Automation surface the client exposes once its internals are loaded.
///
/// Becomes available asynchronously after construction, at an
/// unpredictable delay; callers poll [`ClientHandle::surface`] for it.
#[async_trait]
pub trait AutomationSurface: Send + Sync {
	/// Evaluates an expression against the surface.
	///
	/// Fails while the surface is mid-navigation; validation retries a
	/// trivial expression until the first success.
	async fn evaluate(&self, expression: &str) -> Result<Value>;
}

/// One live messaging-client connection.
#[async_trait]
pub trait ClientHandle: Send + Sync {
	/// Begins asynchronous connection/authentication.
	///
	/// May fail transiently; the registry logs failures instead of
	/// unregistering the handle.
	async fn initialize(&self) -> Result<()>;

	/// Current connectivity state as reported by the client.
	async fn state(&self) -> Result<ConnectivityState>;

	/// Requests a graceful logout. Completion is signalled later via a
	/// disconnect event, not by this call returning.
	async fn logout(&self) -> Result<()>;

	/// Forcibly tears down the connection and releases client resources.
	async fn destroy(&self) -> Result<()>;

	/// Subscribes to this session's event stream.
	fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;

	/// Returns the automation surface once it exists.
	fn surface(&self) -> Option<Arc<dyn AutomationSurface>>;

	/// Downloads and decodes the media attached to a message.
	async fn fetch_media(&self, message: &Value) -> Result<MediaPayload>;
}

/// Constructs client handles for the registry.
#[async_trait]
pub trait ClientFactory: Send + Sync {
	async fn create(&self, options: ClientOptions) -> Result<Arc<dyn ClientHandle>>;
}
