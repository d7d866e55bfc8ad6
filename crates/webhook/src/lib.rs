//! HTTP webhook delivery for session events.
//!
//! Implements the core's [`EventSink`] boundary: dispatch is a
//! non-blocking enqueue onto a bounded queue drained by one worker task
//! that POSTs each event as JSON. A full queue sheds the newest event.
//! Delivery retries and authentication beyond a static header are out of
//! scope.

use std::time::Duration;

use async_trait::async_trait;
use chathub::{EventSink, Result, SessionId, WebhookEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn default_queue_capacity() -> usize {
	1_024
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
	/// Endpoint receiving event POSTs.
	pub url: String,
	/// Optional shared key sent as `x-api-key` with every request.
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_queue_capacity")]
	pub queue_capacity: usize,
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

impl WebhookConfig {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			api_key: None,
			queue_capacity: default_queue_capacity(),
			request_timeout_ms: default_request_timeout_ms(),
		}
	}
}

/// Bounded-queue HTTP event sink.
pub struct HttpDispatcher {
	tx: mpsc::Sender<WebhookEvent>,
	worker: JoinHandle<()>,
}

impl HttpDispatcher {
	pub fn new(config: WebhookConfig) -> Self {
		let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
		let worker = tokio::spawn(deliver_loop(config, rx));
		Self { tx, worker }
	}

	/// Stops accepting events and waits for queued ones to drain.
	pub async fn shutdown(self) {
		drop(self.tx);
		let _ = self.worker.await;
	}
}

#[async_trait]
impl EventSink for HttpDispatcher {
	/// Enqueues without blocking; a full queue drops the event.
	///
	/// Never returns an error for delivery problems: those surface in the
	/// worker's logs, per the fire-and-forget contract.
	async fn dispatch(&self, session_id: &SessionId, event: &str, payload: Value) -> Result<()> {
		let event = WebhookEvent {
			session_id: session_id.clone(),
			event: event.to_string(),
			payload,
		};
		if let Err(err) = self.tx.try_send(event) {
			warn!(target = "chathub.webhook", error = %err, "queue full or closed; event dropped");
		}
		Ok(())
	}
}

async fn deliver_loop(config: WebhookConfig, mut rx: mpsc::Receiver<WebhookEvent>) {
	let client = match reqwest::Client::builder().timeout(Duration::from_millis(config.request_timeout_ms)).build() {
		Ok(client) => client,
		Err(err) => {
			warn!(target = "chathub.webhook", error = %err, "http client construction failed; deliveries disabled");
			while rx.recv().await.is_some() {}
			return;
		}
	};

	while let Some(event) = rx.recv().await {
		let mut request = client.post(&config.url).json(&event);
		if let Some(key) = &config.api_key {
			request = request.header("x-api-key", key);
		}

		match request.send().await {
			Ok(response) if response.status().is_success() => {
				debug!(target = "chathub.webhook", session = %event.session_id, event = %event.event, "delivered");
			}
			Ok(response) => {
				warn!(
					target = "chathub.webhook",
					session = %event.session_id,
					event = %event.event,
					status = %response.status(),
					"endpoint rejected event"
				);
			}
			Err(err) => {
				warn!(target = "chathub.webhook", session = %event.session_id, event = %event.event, error = %err, "delivery failed");
			}
		}
	}
	debug!(target = "chathub.webhook", "dispatch queue drained");
}

#[cfg(test)]
mod tests {
	use std::net::SocketAddr;
	use std::sync::Arc;
	use std::time::Instant;

	use axum::Json;
	use axum::extract::State;
	use axum::routing::post;
	use serde_json::json;
	use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

	use super::*;

	async fn spawn_receiver() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<Value>) {
		let (tx, rx) = unbounded_channel::<Value>();

		async fn receive(State(tx): State<Arc<UnboundedSender<Value>>>, Json(body): Json<Value>) -> &'static str {
			tx.send(body).unwrap();
			"ok"
		}

		let app = axum::Router::new().route("/hook", post(receive)).with_state(Arc::new(tx));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		(addr, rx)
	}

	fn sid(s: &str) -> SessionId {
		SessionId::new(s).unwrap()
	}

	#[tokio::test]
	async fn delivers_event_as_json_post() {
		let (addr, mut rx) = spawn_receiver().await;
		let dispatcher = HttpDispatcher::new(WebhookConfig::new(format!("http://{addr}/hook")));

		dispatcher.dispatch(&sid("abc"), "message", json!({"body": "hi"})).await.unwrap();

		let body = rx.recv().await.unwrap();
		assert_eq!(body["session_id"], json!("abc"));
		assert_eq!(body["event"], json!("message"));
		assert_eq!(body["payload"]["body"], json!("hi"));

		dispatcher.shutdown().await;
	}

	#[tokio::test]
	async fn sends_api_key_header_when_configured() {
		let (tx, mut rx) = unbounded_channel::<Option<String>>();

		async fn receive(State(tx): State<Arc<UnboundedSender<Option<String>>>>, headers: axum::http::HeaderMap) -> &'static str {
			let key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string);
			tx.send(key).unwrap();
			"ok"
		}

		let app = axum::Router::new().route("/hook", post(receive)).with_state(Arc::new(tx));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		let mut config = WebhookConfig::new(format!("http://{addr}/hook"));
		config.api_key = Some("secret".into());
		let dispatcher = HttpDispatcher::new(config);

		dispatcher.dispatch(&sid("abc"), "ready", Value::Null).await.unwrap();

		assert_eq!(rx.recv().await.unwrap(), Some("secret".to_string()));
		dispatcher.shutdown().await;
	}

	#[tokio::test]
	async fn unreachable_endpoint_never_fails_dispatch() {
		let dispatcher = HttpDispatcher::new(WebhookConfig {
			url: "http://127.0.0.1:1/hook".into(),
			api_key: None,
			queue_capacity: 8,
			request_timeout_ms: 500,
		});

		for i in 0..4 {
			dispatcher.dispatch(&sid("abc"), "message", json!({"i": i})).await.unwrap();
		}
		dispatcher.shutdown().await;
	}

	#[tokio::test]
	async fn full_queue_sheds_events_instead_of_blocking() {
		// Worker stalls on a dead endpoint while the queue overfills.
		let dispatcher = HttpDispatcher::new(WebhookConfig {
			url: "http://127.0.0.1:1/hook".into(),
			api_key: None,
			queue_capacity: 1,
			request_timeout_ms: 500,
		});

		let started = Instant::now();
		for i in 0..64 {
			dispatcher.dispatch(&sid("abc"), "message", json!({"i": i})).await.unwrap();
		}
		assert!(started.elapsed() < Duration::from_secs(2), "dispatch must not block on a full queue");
		dispatcher.shutdown().await;
	}

	#[tokio::test]
	async fn events_preserve_enqueue_order_per_worker() {
		let (addr, mut rx) = spawn_receiver().await;
		let dispatcher = HttpDispatcher::new(WebhookConfig::new(format!("http://{addr}/hook")));

		for i in 0..5 {
			dispatcher.dispatch(&sid("abc"), "message", json!({"seq": i})).await.unwrap();
		}

		for i in 0..5 {
			let body = rx.recv().await.unwrap();
			assert_eq!(body["payload"]["seq"], json!(i));
		}
		dispatcher.shutdown().await;
	}
}
