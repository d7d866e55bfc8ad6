//! Forwards session events to the webhook collaborator.

use std::sync::{Arc, Weak};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ClientHandle;
use crate::events::{ClientEvent, EventSink, MessageEnvelope};
use crate::types::SessionId;

/// Per-session event forwarding task.
///
/// Consumes the handle's event stream and dispatches each event to the
/// sink, fire-and-forget. The task ends when the handle drops its event
/// sender; a delete racing with in-flight delivery is tolerated by the
/// sink, not prevented here.
pub struct EventBridge;

impl EventBridge {
	/// Attaches forwarding for one session and returns the task handle.
	///
	/// Only a weak reference to the handle is retained so the task cannot
	/// keep a destroyed client alive; it exits once the stream closes.
	pub fn attach(
		session_id: SessionId,
		handle: &Arc<dyn ClientHandle>,
		sink: Arc<dyn EventSink>,
		max_inline_media_bytes: u64,
	) -> JoinHandle<()> {
		let mut events = handle.subscribe();
		let handle: Weak<dyn ClientHandle> = Arc::downgrade(handle);
		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(event) => {
						let Some(handle) = handle.upgrade() else { break };
						forward(&session_id, handle.as_ref(), sink.as_ref(), max_inline_media_bytes, event).await;
					}
					Err(RecvError::Lagged(skipped)) => {
						warn!(target = "chathub.bridge", session = %session_id, skipped, "event stream lagged");
					}
					Err(RecvError::Closed) => break,
				}
			}
			debug!(target = "chathub.bridge", session = %session_id, "event stream closed");
		})
	}
}

async fn forward(session_id: &SessionId, handle: &dyn ClientHandle, sink: &dyn EventSink, max_inline_media_bytes: u64, event: ClientEvent) {
	let name = event.name();
	match event {
		ClientEvent::AuthFailure { message } => dispatch(sink, session_id, name, json!({ "message": message })).await,
		ClientEvent::Authenticated | ClientEvent::Ready => dispatch(sink, session_id, name, Value::Null).await,
		ClientEvent::Call { call } => dispatch(sink, session_id, name, call).await,
		ClientEvent::StateChange { state } => dispatch(sink, session_id, name, json!({ "state": state })).await,
		ClientEvent::Disconnected { reason } => dispatch(sink, session_id, name, json!({ "reason": reason })).await,
		ClientEvent::GroupJoin { notification }
		| ClientEvent::GroupLeave { notification }
		| ClientEvent::GroupUpdate { notification } => dispatch(sink, session_id, name, notification).await,
		ClientEvent::LoadingScreen { percent, message } => {
			dispatch(sink, session_id, name, json!({ "percent": percent, "message": message })).await;
		}
		ClientEvent::MediaUploaded { message } | ClientEvent::MessageCreate { message } => {
			dispatch(sink, session_id, name, message).await;
		}
		ClientEvent::Message { message } => forward_message(session_id, handle, sink, max_inline_media_bytes, message).await,
		ClientEvent::MessageAck { message, ack } => {
			dispatch(sink, session_id, name, json!({ "message": message, "ack": ack })).await;
		}
		ClientEvent::MessageReaction { reaction } => dispatch(sink, session_id, name, reaction).await,
		ClientEvent::MessageRevokedEveryone { message, revoked } => {
			dispatch(sink, session_id, name, json!({ "message": message, "revoked": revoked })).await;
		}
		ClientEvent::Qr { qr } => dispatch(sink, session_id, name, json!({ "qr": qr })).await,
		ClientEvent::PairingCode { code } => dispatch(sink, session_id, name, json!({ "code": code })).await,
		ClientEvent::ContactChanged { message, old_id, new_id } => {
			dispatch(sink, session_id, name, json!({ "message": message, "old_id": old_id, "new_id": new_id })).await;
		}
	}
}

/// Forwards the message itself, then its media as a second event.
///
/// Media below the threshold is fetched and inlined (base64). At or above
/// it, only the declared mimetype and size are forwarded; the payload is
/// never downloaded or buffered.
async fn forward_message(session_id: &SessionId, handle: &dyn ClientHandle, sink: &dyn EventSink, max_inline_media_bytes: u64, message: MessageEnvelope) {
	dispatch(sink, session_id, "message", message.data.clone()).await;

	let Some(media) = message.media else { return };

	if media.size < max_inline_media_bytes {
		match handle.fetch_media(&message.data).await {
			Ok(payload) => {
				let body = json!({
					"mimetype": payload.mimetype,
					"data": BASE64.encode(&payload.data),
					"filename": payload.filename,
				});
				dispatch(sink, session_id, "media", body).await;
			}
			Err(err) => {
				debug!(target = "chathub.bridge", session = %session_id, error = %err, "media fetch failed");
			}
		}
	} else {
		let body = json!({ "mimetype": media.mimetype, "size": media.size });
		dispatch(sink, session_id, "media", body).await;
	}
}

async fn dispatch(sink: &dyn EventSink, session_id: &SessionId, event: &str, payload: Value) {
	if let Err(err) = sink.dispatch(session_id, event, payload).await {
		debug!(target = "chathub.bridge", session = %session_id, event, error = %err, "dispatch failed");
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use tokio::sync::broadcast;

	use super::*;
	use crate::error::{HubError, Result};
	use crate::events::{MediaPayload, MediaRef, WebhookEvent};
	use crate::types::ConnectivityState;

	struct RecordingSink {
		events: Mutex<Vec<WebhookEvent>>,
	}

	impl RecordingSink {
		fn new() -> Arc<Self> {
			Arc::new(Self { events: Mutex::new(Vec::new()) })
		}

		fn events(&self) -> Vec<WebhookEvent> {
			self.events.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl EventSink for RecordingSink {
		async fn dispatch(&self, session_id: &SessionId, event: &str, payload: Value) -> Result<()> {
			self.events.lock().unwrap().push(WebhookEvent {
				session_id: session_id.clone(),
				event: event.to_string(),
				payload,
			});
			Ok(())
		}
	}

	struct MediaClient {
		tx: broadcast::Sender<ClientEvent>,
		fetches: AtomicUsize,
	}

	impl MediaClient {
		fn new() -> Arc<Self> {
			let (tx, _) = broadcast::channel(16);
			Arc::new(Self { tx, fetches: AtomicUsize::new(0) })
		}
	}

	#[async_trait]
	impl ClientHandle for MediaClient {
		async fn initialize(&self) -> Result<()> {
			Ok(())
		}

		async fn state(&self) -> Result<ConnectivityState> {
			Ok(ConnectivityState::connected())
		}

		async fn logout(&self) -> Result<()> {
			Ok(())
		}

		async fn destroy(&self) -> Result<()> {
			Ok(())
		}

		fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
			self.tx.subscribe()
		}

		fn surface(&self) -> Option<Arc<dyn crate::client::AutomationSurface>> {
			None
		}

		async fn fetch_media(&self, _message: &Value) -> Result<MediaPayload> {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			Ok(MediaPayload {
				mimetype: "image/png".into(),
				data: vec![1, 2, 3],
				filename: Some("photo.png".into()),
			})
		}
	}

	fn sid() -> SessionId {
		SessionId::new("abc").unwrap()
	}

	fn media_message(size: u64) -> ClientEvent {
		ClientEvent::Message {
			message: MessageEnvelope {
				data: json!({"body": "look at this"}),
				media: Some(MediaRef {
					mimetype: "image/png".into(),
					size,
				}),
			},
		}
	}

	#[tokio::test]
	async fn large_media_forwards_placeholder_without_fetching() {
		let sink = RecordingSink::new();
		let client = MediaClient::new();

		forward(&sid(), client.as_ref(), sink.as_ref(), 1_000_000, media_message(5_000_000)).await;

		let events = sink.events();
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].event, "message");
		assert_eq!(events[1].event, "media");
		assert_eq!(events[1].payload, json!({"mimetype": "image/png", "size": 5_000_000u64}));
		assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn small_media_forwards_decoded_payload() {
		let sink = RecordingSink::new();
		let client = MediaClient::new();

		forward(&sid(), client.as_ref(), sink.as_ref(), 10_000_000, media_message(5_000_000)).await;

		let events = sink.events();
		assert_eq!(events.len(), 2);
		assert_eq!(events[1].event, "media");
		assert_eq!(events[1].payload["data"], json!(BASE64.encode([1u8, 2, 3])));
		assert_eq!(events[1].payload["filename"], json!("photo.png"));
		assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn size_equal_to_threshold_is_not_inlined() {
		let sink = RecordingSink::new();
		let client = MediaClient::new();

		forward(&sid(), client.as_ref(), sink.as_ref(), 5_000_000, media_message(5_000_000)).await;

		assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
		assert_eq!(sink.events()[1].payload["size"], json!(5_000_000u64));
	}

	#[tokio::test]
	async fn message_without_media_forwards_single_event() {
		let sink = RecordingSink::new();
		let client = MediaClient::new();

		let event = ClientEvent::Message {
			message: MessageEnvelope {
				data: json!({"body": "plain"}),
				media: None,
			},
		};
		forward(&sid(), client.as_ref(), sink.as_ref(), 1_000_000, event).await;

		let events = sink.events();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].event, "message");
	}

	#[tokio::test]
	async fn failed_media_fetch_is_swallowed() {
		struct FailingClient(Arc<MediaClient>);

		#[async_trait]
		impl ClientHandle for FailingClient {
			async fn initialize(&self) -> Result<()> {
				Ok(())
			}

			async fn state(&self) -> Result<ConnectivityState> {
				self.0.state().await
			}

			async fn logout(&self) -> Result<()> {
				Ok(())
			}

			async fn destroy(&self) -> Result<()> {
				Ok(())
			}

			fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
				self.0.subscribe()
			}

			fn surface(&self) -> Option<Arc<dyn crate::client::AutomationSurface>> {
				None
			}

			async fn fetch_media(&self, _message: &Value) -> Result<MediaPayload> {
				Err(HubError::client("media gone"))
			}
		}

		let sink = RecordingSink::new();
		let client = FailingClient(MediaClient::new());

		forward(&sid(), &client, sink.as_ref(), 10_000_000, media_message(100)).await;

		// Message still forwarded; failed media event dropped silently.
		let events = sink.events();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].event, "message");
	}

	#[tokio::test]
	async fn bridge_task_forwards_from_stream_and_ends_on_close() {
		let sink = RecordingSink::new();
		let client = MediaClient::new();
		let dyn_client: Arc<dyn ClientHandle> = client.clone();

		let task = EventBridge::attach(sid(), &dyn_client, sink.clone(), 1_000_000);
		drop(dyn_client);

		client.tx.send(ClientEvent::Ready).unwrap();
		client
			.tx
			.send(ClientEvent::Qr { qr: "scan-me".into() })
			.unwrap();

		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		let events = sink.events();
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].event, "ready");
		assert_eq!(events[1].event, "qr");

		drop(client);
		task.await.unwrap();
	}
}
