use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::time::sleep;

use crate::emitter::Emitter;
use crate::pending::{CallHandle, CallOptions, Waiter};
use crate::transport::Transport;
use crate::types::{
    CallEnvelope, ErrorCode, ErrorObject, FailureBody, FailureEnvelope, IncomingParams,
    NotificationEnvelope, Outcome, Reply, RequestId, SuccessBody, SuccessEnvelope, VERSION,
};

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// RPC error types
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified inbound request or notification, published on the requests
/// topic; `raw` carries the full message for lazy typed decoding by
/// whichever registered handler claims it
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub method: String,
    pub id: Option<RequestId>,
    pub raw: Arc<str>,
}

/// Classified inbound response, published on the responses topic and
/// matched against pending calls by id
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub id: RequestId,
    pub raw: Arc<str>,
}

/// Minimal envelope probe: just enough of the message to classify it.
/// `params` and `result` stay unparsed - their concrete types are known
/// only to the consumer that claims the message.
#[derive(Debug, Deserialize)]
struct Probe {
    jsonrpc: String,
    method: Option<String>,
    // An explicit `"id": null` folds into None, same as an absent field
    id: Option<RequestId>,
}

/// Bidirectional JSON-RPC 2.0 engine that can act as both client and server
///
/// One engine owns one connection's registries; multiple engines share no
/// state. Inbound classification and routing run synchronously on the
/// thread calling [`receive`](Engine::receive); deadline timers run on the
/// ambient tokio runtime, so a call's completion fires either on the
/// receive thread or on a timer task - never assume call-site delivery.
pub struct Engine {
    transport: Arc<dyn Transport>,
    requests: Arc<Emitter<RequestEvent>>,
    responses: Arc<Emitter<ResponseEvent>>,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            requests: Arc::new(Emitter::new()),
            responses: Arc::new(Emitter::new()),
        }
    }

    /// Feed one complete inbound message into the engine
    ///
    /// Classifies the envelope and fans it out to registered handlers and
    /// pending calls. Anything violating the JSON-RPC 2.0 contract is
    /// logged and dropped; nothing propagates back to the transport.
    pub fn receive(&self, payload: &str) {
        let probe: Probe = match serde_json::from_str(payload) {
            Ok(probe) => probe,
            Err(e) => {
                warn!("received invalid JSON-RPC message: {}", e);
                return;
            }
        };
        if probe.jsonrpc != VERSION {
            warn!("received message with unsupported version: {}", probe.jsonrpc);
            return;
        }

        let raw: Arc<str> = Arc::from(payload);
        match probe.method {
            Some(method) => {
                debug!("inbound request: {} (id: {:?})", method, probe.id);
                self.requests.emit(&RequestEvent {
                    method,
                    id: probe.id,
                    raw,
                });
            }
            None => match probe.id {
                Some(id) => {
                    debug!("inbound response (id: {:?})", id);
                    self.responses.emit(&ResponseEvent { id, raw });
                }
                None => warn!("received message with neither method nor id"),
            },
        }
    }

    /// Register a handler for call-style inbound requests (server
    /// functionality)
    ///
    /// On each inbound request whose method matches, the typed params are
    /// decoded and the handler's [`Reply`] is serialized into a success or
    /// error response tagged with the inbound id. A call-shaped message
    /// with no id is invalid and dropped. When the params fail to decode,
    /// the engine replies with a standard `-32602 Invalid params` error so
    /// the remote caller is not left to time out.
    ///
    /// Handlers live for the engine's lifetime. Registering more than one
    /// handler for the same call method makes all of them fire and reply,
    /// which violates the one-response-per-id contract; keeping call
    /// registrations unique per method is the caller's responsibility.
    pub fn on_call<P, R, E, F>(&self, method: &str, handler: F)
    where
        P: DeserializeOwned,
        R: Serialize,
        E: Serialize,
        F: Fn(Option<P>) -> Reply<R, E> + Send + Sync + 'static,
    {
        let method = method.to_string();
        let transport = self.transport.clone();
        self.requests.subscribe(move |event: &RequestEvent| {
            if event.method != method {
                return;
            }
            let Some(id) = event.id.clone() else {
                warn!("invalid call with no id for method: {}", method);
                return;
            };
            match serde_json::from_str::<IncomingParams<P>>(&event.raw) {
                Ok(shell) => send_reply(&*transport, &id, &handler(shell.params)),
                Err(e) => {
                    warn!("unable to decode params for method {}: {}", method, e);
                    let invalid = ErrorObject::new(ErrorCode::InvalidParams, None);
                    send_reply(&*transport, &id, &Reply::<R, ErrorObject>::Error(invalid));
                }
            }
        });
    }

    /// Register a handler for notification-style inbound requests
    ///
    /// Same matching and decoding as [`on_call`](Engine::on_call), but no
    /// reply is ever sent and any id on the message is ignored. Params
    /// that fail to decode are logged and dropped.
    pub fn on_notification<P, F>(&self, method: &str, handler: F)
    where
        P: DeserializeOwned,
        F: Fn(Option<P>) + Send + Sync + 'static,
    {
        let method = method.to_string();
        self.requests.subscribe(move |event: &RequestEvent| {
            if event.method != method {
                return;
            }
            match serde_json::from_str::<IncomingParams<P>>(&event.raw) {
                Ok(shell) => handler(shell.params),
                Err(e) => warn!("unable to decode params for method {}: {}", method, e),
            }
        });
    }

    /// Issue an outbound call with a generated text id and the transport's
    /// default deadline (client functionality)
    ///
    /// Non-blocking: returns a cancellation handle immediately, and the
    /// completion is invoked later with exactly one of success, protocol
    /// error or timeout - or never, if the call is cancelled first or no
    /// deadline applies and the peer stays silent.
    pub fn call<P, R, E, F>(
        &self,
        method: &str,
        params: Option<P>,
        completion: F,
    ) -> RpcResult<CallHandle>
    where
        P: Serialize,
        R: DeserializeOwned + Send + 'static,
        E: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<R, E>) + Send + 'static,
    {
        self.call_with(method, params, CallOptions::default(), completion)
    }

    /// Issue an outbound call with explicit per-call options
    ///
    /// The caller is responsible for the uniqueness of a self-supplied id:
    /// at most one pending call may be registered per id value at any
    /// instant.
    pub fn call_with<P, R, E, F>(
        &self,
        method: &str,
        params: Option<P>,
        options: CallOptions,
        completion: F,
    ) -> RpcResult<CallHandle>
    where
        P: Serialize,
        R: DeserializeOwned + Send + 'static,
        E: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<R, E>) + Send + 'static,
    {
        let id = options.id.unwrap_or_else(RequestId::generate);
        let encoded = serde_json::to_string(&CallEnvelope {
            jsonrpc: VERSION,
            method,
            params: params.as_ref(),
            id: &id,
        })?;

        debug!("sending call: {} (id: {:?})", method, id);
        let waiter = Waiter::new(Box::new(completion));

        // The watcher is registered before the request goes out, so a
        // response racing back on another thread cannot slip past it.
        let subscriber = {
            let waiter = waiter.clone();
            let responses = self.responses.clone();
            let id = id.clone();
            let method = method.to_string();
            self.responses.subscribe(move |event: &ResponseEvent| {
                if event.id != id {
                    return;
                }
                let outcome = match serde_json::from_str::<SuccessBody<R>>(&event.raw) {
                    Ok(body) => Outcome::Success(body.result),
                    Err(_) => match serde_json::from_str::<FailureBody<E>>(&event.raw) {
                        Ok(body) => Outcome::Error(body.error),
                        Err(e) => {
                            // The call stays pending: it resolves through
                            // its deadline if one is armed, or never.
                            warn!("unable to decode response for method {}: {}", method, e);
                            return;
                        }
                    },
                };
                if let Some(complete) = waiter.take() {
                    waiter.unregister(&responses);
                    complete(outcome);
                }
            })
        };
        waiter.attach_watcher(&self.responses, subscriber);

        self.transport.send(encoded);

        let deadline = options.timeout.or_else(|| self.transport.default_timeout());
        if let Some(duration) = deadline {
            match Handle::try_current() {
                Ok(runtime) => {
                    let timer_waiter = waiter.clone();
                    let responses = self.responses.clone();
                    let task = runtime.spawn(async move {
                        sleep(duration).await;
                        if let Some(complete) = timer_waiter.take() {
                            timer_waiter.unregister(&responses);
                            complete(Outcome::Timeout);
                        }
                    });
                    waiter.arm_timer(task.abort_handle());
                }
                Err(_) => {
                    warn!(
                        "no tokio runtime available, deadline for method {} not armed",
                        method
                    );
                }
            }
        }

        Ok(CallHandle::new(waiter, self.responses.clone()))
    }

    /// Send a fire-and-forget notification: no id, no registry entry, no
    /// reply expected or possible
    pub fn notify<P: Serialize>(&self, method: &str, params: Option<P>) -> RpcResult<()> {
        let encoded = serde_json::to_string(&NotificationEnvelope {
            jsonrpc: VERSION,
            method,
            params: params.as_ref(),
        })?;

        debug!("sending notification: {}", method);
        self.transport.send(encoded);
        Ok(())
    }
}

/// Serialize a handler's reply into a response envelope and push it to the
/// transport; encoding failures are absorbed and logged, never raised
fn send_reply<R: Serialize, E: Serialize>(
    transport: &dyn Transport,
    id: &RequestId,
    reply: &Reply<R, E>,
) {
    let encoded = match reply {
        Reply::Success(result) => serde_json::to_string(&SuccessEnvelope {
            jsonrpc: VERSION,
            result,
            id,
        }),
        Reply::Error(error) => serde_json::to_string(&FailureEnvelope {
            jsonrpc: VERSION,
            error,
            id,
        }),
    };
    match encoded {
        Ok(text) => transport.send(text),
        Err(e) => warn!("unable to encode response for id {:?}: {}", id, e),
    }
}
