// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module-side RPC client.
//!
//! Flow of one call:
//! 1. `call()` mints a correlation id and registers a oneshot sender under it
//! 2. the request envelope is posted to the host window
//! 3. `handle_message()` (usually driven by [`RpcClient::listen`]) takes the
//!    entry for a matching response and completes the caller
//! 4. if the deadline passes first, the caller removes its own entry and
//!    fails with [`RpcCallError::Timeout`]; a call future dropped mid-flight
//!    removes its entry as well
//!
//! Whichever side removes the entry owns the outcome, so a call ends exactly
//! once and late responses find nothing to complete.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    envelope::{RpcErrorBody, RpcRequest, RpcResponse},
    transport::{MessageTarget, PostedMessage, TargetOrigin},
};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcConfigError {
    #[error("RPC timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcCallError {
    #[error("RPC call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
    #[error("RPC transport failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Config(#[from] RpcConfigError),
}

impl RpcCallError {
    pub fn code(&self) -> &str {
        match self {
            RpcCallError::Timeout(_) => "TIMEOUT",
            RpcCallError::Remote { code, .. } => code,
            RpcCallError::Transport(_) => "TRANSPORT",
            RpcCallError::Config(_) => "CONFIG",
        }
    }
}

impl From<RpcErrorBody> for RpcCallError {
    fn from(body: RpcErrorBody) -> Self {
        RpcCallError::Remote {
            code: body.code,
            message: body.message,
        }
    }
}

/// Construction options for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientOptions {
    /// Origin requests are posted to; wins over `referrer`.
    pub target_origin: Option<String>,
    /// URL of the embedding page, used to derive the target origin.
    pub referrer: Option<String>,
    pub timeout: Duration,
}

impl Default for RpcClientOptions {
    fn default() -> Self {
        Self {
            target_origin: None,
            referrer: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RpcClientOptions {
    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = Some(origin.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

type Completion = oneshot::Sender<Result<Value, RpcCallError>>;

/// Drops a call's pending entry however the call future ends, including
/// when the caller stops polling it.
struct PendingEntry<'a> {
    client: &'a RpcClient,
    id: &'a str,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.client.lock_pending().remove(self.id);
    }
}

/// Issues correlated, deadline-bound requests to the host window.
///
/// Pending calls live in this instance only; several clients (one per
/// embedded module) never see each other's entries.
pub struct RpcClient {
    module_id: String,
    transport: Arc<dyn MessageTarget>,
    target_origin: TargetOrigin,
    default_timeout: Duration,
    pending: Mutex<HashMap<String, Completion>>,
}

impl RpcClient {
    pub fn new(
        module_id: impl Into<String>,
        transport: Arc<dyn MessageTarget>,
        options: RpcClientOptions,
    ) -> Result<Self, RpcConfigError> {
        if options.timeout.is_zero() {
            return Err(RpcConfigError::ZeroTimeout);
        }

        let target_origin = TargetOrigin::resolve(
            options.target_origin.as_deref(),
            options.referrer.as_deref(),
        );
        let module_id = module_id.into();
        if target_origin.is_wildcard() {
            warn!(module_id = %module_id, "RPC client has no target origin; posting to any origin");
        }

        Ok(Self {
            module_id,
            transport,
            target_origin,
            default_timeout: options.timeout,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn target_origin(&self) -> &TargetOrigin {
        &self.target_origin
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Call `action` on the host with the default deadline.
    pub async fn call(&self, action: &str, payload: Option<Value>) -> Result<Value, RpcCallError> {
        self.call_with_timeout(action, payload, self.default_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        action: &str,
        payload: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcCallError> {
        if timeout.is_zero() {
            return Err(RpcConfigError::ZeroTimeout.into());
        }

        let id = Uuid::new_v4().to_string();
        let request = RpcRequest::new(&id, &self.module_id, action, payload);

        let (tx, mut rx) = oneshot::channel();
        self.lock_pending().insert(id.clone(), tx);
        let _entry = PendingEntry { client: self, id: &id };

        if let Err(e) = self
            .transport
            .post_message(request.to_message(), self.target_origin.as_str())
        {
            warn!(module_id = %self.module_id, action, error = %e, "Failed to post RPC request");
            return Err(RpcCallError::Transport(e.to_string()));
        }

        debug!(
            module_id = %self.module_id,
            correlation_id = %id,
            action,
            timeout_ms = timeout.as_millis(),
            "Posted RPC request"
        );

        match time::timeout(timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RpcCallError::Transport("response channel closed".to_string())),
            Err(_) => {
                if self.lock_pending().remove(&id).is_some() {
                    warn!(
                        module_id = %self.module_id,
                        correlation_id = %id,
                        action,
                        timeout_ms = timeout.as_millis(),
                        "RPC call timed out"
                    );
                    return Err(RpcCallError::Timeout(timeout));
                }
                // A response took the entry at the deadline; its value is in flight.
                rx.await.unwrap_or(Err(RpcCallError::Timeout(timeout)))
            }
        }
    }

    /// Offer an inbound message to the client.
    ///
    /// Returns `true` if it completed a pending call. Foreign traffic and
    /// responses for unknown or expired ids are ignored.
    pub fn handle_message(&self, message: &Value) -> bool {
        let Some(response) = RpcResponse::from_message(message) else {
            return false;
        };

        let Some(completion) = self.lock_pending().remove(&response.id) else {
            debug!(
                module_id = %self.module_id,
                correlation_id = %response.id,
                "Ignoring RPC response for unknown or expired call"
            );
            return false;
        };

        let outcome = if response.ok {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(response.error.unwrap_or_else(RpcErrorBody::unspecified).into())
        };

        // The caller may have stopped waiting; nothing to do then.
        let _ = completion.send(outcome);
        true
    }

    /// Feed messages from `inbound` into [`handle_message`](Self::handle_message)
    /// until the channel closes or `shutdown` fires.
    ///
    /// ```rust,ignore
    /// tokio::spawn(client.clone().listen(window.inbox, shutdown.clone()));
    /// ```
    pub async fn listen(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<PostedMessage>,
        shutdown: CancellationToken,
    ) {
        debug!(module_id = %self.module_id, "RPC client listening");
        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle_message(&message.data);
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        info!(module_id = %self.module_id, "RPC client stopped listening");
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, Completion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
