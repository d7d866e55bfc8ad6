//! Closed event model shared between client handles and the event sink.
//!
//! The client collaborator surfaces a tagged enum rather than string-keyed
//! callbacks so forwarding stays exhaustiveness-checked: adding a category
//! fails to compile until every match arm is updated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{ConnectivityState, SessionId};

/// Reference to media attached to an incoming message.
///
/// Carries only declared metadata; the payload itself is fetched on demand
/// so large attachments are never buffered eagerly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
	pub mimetype: String,
	/// Size in bytes as advertised by the client, before download.
	pub size: u64,
}

/// Decoded media payload fetched from the client.
#[derive(Clone, Debug)]
pub struct MediaPayload {
	pub mimetype: String,
	pub data: Vec<u8>,
	pub filename: Option<String>,
}

/// An incoming message plus optional attached-media metadata.
#[derive(Clone, Debug)]
pub struct MessageEnvelope {
	/// Raw message payload as produced by the client collaborator.
	pub data: Value,
	pub media: Option<MediaRef>,
}

/// One event category per listener the bridge attaches.
#[derive(Clone, Debug)]
pub enum ClientEvent {
	AuthFailure { message: String },
	Authenticated,
	Call { call: Value },
	StateChange { state: ConnectivityState },
	Disconnected { reason: String },
	GroupJoin { notification: Value },
	GroupLeave { notification: Value },
	GroupUpdate { notification: Value },
	LoadingScreen { percent: u32, message: String },
	MediaUploaded { message: Value },
	Message { message: MessageEnvelope },
	MessageAck { message: Value, ack: i32 },
	MessageCreate { message: Value },
	MessageReaction { reaction: Value },
	MessageRevokedEveryone { message: Value, revoked: Option<Value> },
	Qr { qr: String },
	PairingCode { code: String },
	Ready,
	ContactChanged { message: Value, old_id: String, new_id: String },
}

impl ClientEvent {
	/// Wire name used in forwarded webhook events.
	pub fn name(&self) -> &'static str {
		match self {
			ClientEvent::AuthFailure { .. } => "auth_failure",
			ClientEvent::Authenticated => "authenticated",
			ClientEvent::Call { .. } => "call",
			ClientEvent::StateChange { .. } => "change_state",
			ClientEvent::Disconnected { .. } => "disconnected",
			ClientEvent::GroupJoin { .. } => "group_join",
			ClientEvent::GroupLeave { .. } => "group_leave",
			ClientEvent::GroupUpdate { .. } => "group_update",
			ClientEvent::LoadingScreen { .. } => "loading_screen",
			ClientEvent::MediaUploaded { .. } => "media_uploaded",
			ClientEvent::Message { .. } => "message",
			ClientEvent::MessageAck { .. } => "message_ack",
			ClientEvent::MessageCreate { .. } => "message_create",
			ClientEvent::MessageReaction { .. } => "message_reaction",
			ClientEvent::MessageRevokedEveryone { .. } => "message_revoke_everyone",
			ClientEvent::Qr { .. } => "qr",
			ClientEvent::PairingCode { .. } => "code",
			ClientEvent::Ready => "ready",
			ClientEvent::ContactChanged { .. } => "contact_changed",
		}
	}
}

/// Structured event as delivered to the webhook collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
	pub session_id: SessionId,
	pub event: String,
	pub payload: Value,
}

/// Delivery boundary for forwarded events.
///
/// Implementations own queueing, transport, and retry policy; the bridge
/// treats dispatch as fire-and-forget and swallows delivery failures.
#[async_trait]
pub trait EventSink: Send + Sync {
	async fn dispatch(&self, session_id: &SessionId, event: &str, payload: Value) -> Result<()>;
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn event_names_match_wire_format() {
		assert_eq!(ClientEvent::Ready.name(), "ready");
		assert_eq!(ClientEvent::Qr { qr: "code".into() }.name(), "qr");
		assert_eq!(
			ClientEvent::StateChange {
				state: ConnectivityState::connected(),
			}
			.name(),
			"change_state"
		);
		assert_eq!(
			ClientEvent::MessageRevokedEveryone {
				message: json!({}),
				revoked: None,
			}
			.name(),
			"message_revoke_everyone"
		);
	}

	#[test]
	fn webhook_event_serializes_flat() {
		let event = WebhookEvent {
			session_id: SessionId::new("abc").unwrap(),
			event: "message".into(),
			payload: json!({"body": "hi"}),
		};
		let value = serde_json::to_value(&event).unwrap();
		assert_eq!(value, json!({"session_id": "abc", "event": "message", "payload": {"body": "hi"}}));
	}
}
