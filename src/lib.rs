//! Bidirectional JSON-RPC 2.0 correlation engine
//!
//! `twine` implements the client/server plumbing of a JSON-RPC 2.0
//! connection over an arbitrary text transport (WebSocket, stdio pipe,
//! socket - supplied by the host behind the [`Transport`] trait): it
//! classifies inbound envelopes, routes them to registered method and
//! notification handlers, and correlates outbound calls with their
//! responses, delivering exactly one of success, protocol error or
//! timeout per call. In-flight calls are individually cancellable.
//!
//! ## Components
//!
//! - [`types`]: JSON-RPC 2.0 envelope and outcome types
//! - [`emitter`]: broadcast channel fanning classified messages out to
//!   handlers and pending calls
//! - [`transport`]: the transport collaborator interface
//! - [`pending`]: pending call retirement state and cancellation handles
//! - [`engine`]: the engine itself - classifier, router, outbound API
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use twine::{Engine, ErrorObject, Outcome, Reply, Transport};
//!
//! struct Stdout;
//!
//! impl Transport for Stdout {
//!     fn send(&self, message: String) {
//!         println!("{message}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::new(Arc::new(Stdout));
//!
//!     // Server side: answer inbound "sum" calls
//!     engine.on_call("sum", |params: Option<Vec<i64>>| {
//!         Reply::<i64, ErrorObject>::Success(params.unwrap_or_default().iter().sum())
//!     });
//!
//!     // Client side: issue a call, observe its outcome asynchronously
//!     let handle = engine
//!         .call("ping", Some(1), |outcome: Outcome<i64, ErrorObject>| {
//!             if let Outcome::Success(value) = outcome {
//!                 println!("pong: {value}");
//!             }
//!         })
//!         .unwrap();
//!
//!     // Inbound direction: the host's read loop feeds complete messages
//!     // engine.receive(&line);
//!     handle.cancel();
//! }
//! ```

pub mod emitter;
pub mod engine;
pub mod pending;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use emitter::{Emitter, SubscriberId};
pub use engine::{Engine, RequestEvent, ResponseEvent, RpcError, RpcResult};
pub use pending::{CallHandle, CallOptions};
pub use transport::Transport;
pub use types::{ErrorCode, ErrorObject, Outcome, Reply, RequestId};
