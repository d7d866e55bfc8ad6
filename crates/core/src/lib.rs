//! Session lifecycle core for messaging-client gateways.
//!
//! Tracks many concurrent, independently-authenticated messaging sessions,
//! each backed by a long-running external client handle: creation and
//! idempotent registration, readiness/health validation against a client
//! whose automation surface appears only after unpredictable delay,
//! state-dependent teardown (graceful logout vs. forced destroy with
//! path-guarded storage cleanup), and bulk restore/flush reconciliation.
//!
//! The messaging protocol itself, webhook HTTP delivery, and any request
//! handling layer live behind the [`client`] and [`events`] collaborator
//! traits.

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod lifecycle;
pub mod registry;
pub mod types;
pub mod validator;

pub use bridge::EventBridge;
pub use client::{AutomationSurface, ClientFactory, ClientHandle, ClientOptions};
pub use config::HubConfig;
pub use error::{HubError, Result};
pub use events::{ClientEvent, EventSink, MediaPayload, MediaRef, MessageEnvelope, WebhookEvent};
pub use lifecycle::LifecycleManager;
pub use registry::{CreateOutcome, SessionRegistry};
pub use types::{ConnectivityState, SESSION_DIR_PREFIX, SessionId};
pub use validator::{ReasonCode, SessionValidator, ValidationResult};
