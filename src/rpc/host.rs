// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Host-side RPC dispatcher.
//!
//! One [`RpcHost`] serves one embedded module: it answers requests carrying
//! its module id and ignores everything else on the channel.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    pin::Pin,
    sync::Arc,
};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    envelope::{RpcErrorBody, RpcRequest, RpcResponse, UNKNOWN_ACTION},
    transport::{MessageTarget, PostedMessage},
};

/// What a handler knows about the request it is serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub id: String,
    pub module_id: String,
    pub action: String,
    /// Origin of the posting window, when received through [`RpcHost::serve`].
    pub origin: Option<String>,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, RpcErrorBody>> + Send>>;
type Handler = Arc<dyn Fn(Value, RequestContext) -> HandlerFuture + Send + Sync>;

pub struct RpcHost {
    module_id: String,
    handlers: HashMap<String, Handler>,
    allowed_origins: HashSet<String>,
}

impl RpcHost {
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            handlers: HashMap::new(),
            allowed_origins: HashSet::new(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Register the handler for `action`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, action: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcErrorBody>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |payload, ctx| Box::pin(handler(payload, ctx)));
        self.handlers.insert(action.into(), handler);
        self
    }

    /// Only serve requests posted from `origin`. With no allowed origins
    /// configured, [`serve`](Self::serve) accepts any sender.
    pub fn allow_origin(&mut self, origin: impl Into<String>) -> &mut Self {
        self.allowed_origins.insert(origin.into());
        self
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Answer one message.
    ///
    /// `None` for anything that is not a request for this module.
    pub async fn handle_message(&self, message: &Value) -> Option<RpcResponse> {
        let request = self.accept(message)?;
        Some(self.dispatch(request, None).await)
    }

    /// Serve requests from `inbound` until it closes or `shutdown` fires.
    ///
    /// Each request runs on its own task; its response is posted through
    /// `reply` to the origin the request came from.
    pub async fn serve(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<PostedMessage>,
        reply: Arc<dyn MessageTarget>,
        shutdown: CancellationToken,
    ) {
        info!(
            module_id = %self.module_id,
            actions = self.handlers.len(),
            "RPC host serving"
        );

        loop {
            let message = tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            };

            if !self.allowed_origins.is_empty() && !self.allowed_origins.contains(&message.origin) {
                debug!(
                    module_id = %self.module_id,
                    origin = %message.origin,
                    "Ignoring message from disallowed origin"
                );
                continue;
            }

            let Some(request) = self.accept(&message.data) else {
                continue;
            };

            let host = self.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                let response = host.dispatch(request, Some(message.origin.clone())).await;
                if let Err(e) = reply.post_message(response.to_message(), &message.origin) {
                    warn!(
                        module_id = %host.module_id,
                        correlation_id = %response.id,
                        error = %e,
                        "Failed to post RPC response"
                    );
                }
            });
        }

        info!(module_id = %self.module_id, "RPC host stopped");
    }

    fn accept(&self, message: &Value) -> Option<RpcRequest> {
        RpcRequest::from_message(message).filter(|request| request.module_id == self.module_id)
    }

    async fn dispatch(&self, request: RpcRequest, origin: Option<String>) -> RpcResponse {
        let Some(handler) = self.handlers.get(&request.action).cloned() else {
            debug!(
                module_id = %self.module_id,
                action = %request.action,
                "No handler for RPC action"
            );
            return RpcResponse::failure(
                request.id,
                RpcErrorBody::new(
                    UNKNOWN_ACTION,
                    format!("Unknown action: {}", request.action),
                ),
            );
        };

        let ctx = RequestContext {
            id: request.id.clone(),
            module_id: request.module_id,
            action: request.action,
            origin,
        };
        let action = ctx.action.clone();

        match handler(request.payload.unwrap_or(Value::Null), ctx).await {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(error) => {
                debug!(
                    module_id = %self.module_id,
                    action = %action,
                    code = %error.code,
                    "RPC handler returned error"
                );
                RpcResponse::failure(request.id, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::transport::window_pair;
    use serde_json::json;

    fn echo_host() -> RpcHost {
        let mut host = RpcHost::new("m1");
        host.register("echo", |payload, _ctx| async move { Ok(payload) })
            .register("deny", |_payload, _ctx| async move {
                Err(RpcErrorBody::new("DENIED", "not allowed"))
            })
            .register("whoami", |_payload, ctx: RequestContext| async move {
                Ok(json!({"module": ctx.module_id, "origin": ctx.origin}))
            });
        host
    }

    #[tokio::test]
    async fn dispatches_to_handler() {
        let host = echo_host();
        let request = RpcRequest::new("r1", "m1", "echo", Some(json!({"v": 1}))).to_message();

        let response = host.handle_message(&request).await.unwrap();
        assert_eq!(response, RpcResponse::success("r1", json!({"v": 1})));
    }

    #[tokio::test]
    async fn missing_payload_is_null() {
        let host = echo_host();
        let request = RpcRequest::new("r1", "m1", "echo", None).to_message();
        let response = host.handle_message(&request).await.unwrap();
        assert_eq!(response.result, Some(Value::Null));
    }

    #[tokio::test]
    async fn handler_error_becomes_failed_response() {
        let host = echo_host();
        let request = RpcRequest::new("r2", "m1", "deny", None).to_message();

        let response = host.handle_message(&request).await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.id, "r2");
        assert_eq!(response.error, Some(RpcErrorBody::new("DENIED", "not allowed")));
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let host = echo_host();
        assert!(!host.has_action("launch"));
        let request = RpcRequest::new("r3", "m1", "launch", None).to_message();

        let response = host.handle_message(&request).await.unwrap();
        assert_eq!(response.error.unwrap().code, UNKNOWN_ACTION);
    }

    #[tokio::test]
    async fn ignores_other_modules_and_foreign_traffic() {
        let host = echo_host();
        let other_module = RpcRequest::new("r1", "m2", "echo", None).to_message();
        let response = RpcResponse::success("r1", json!(1)).to_message();

        assert!(host.handle_message(&other_module).await.is_none());
        assert!(host.handle_message(&response).await.is_none());
        assert!(host.handle_message(&json!("ping")).await.is_none());
    }

    #[tokio::test]
    async fn serve_replies_to_request_origin() {
        let (mut module, host_window) = window_pair("https://module.example.net", "https://portal.example.com");
        let host = Arc::new(echo_host());
        let shutdown = CancellationToken::new();

        let reply: Arc<dyn MessageTarget> = Arc::new(host_window.endpoint);
        let task = tokio::spawn(host.serve(host_window.inbox, reply, shutdown.clone()));

        module
            .endpoint
            .post_message(
                RpcRequest::new("r1", "m1", "whoami", None).to_message(),
                "https://portal.example.com",
            )
            .unwrap();

        let posted = module.inbox.recv().await.unwrap();
        assert_eq!(posted.origin, "https://portal.example.com");
        let response = RpcResponse::from_message(&posted.data).unwrap();
        assert_eq!(
            response.result,
            Some(json!({"module": "m1", "origin": "https://module.example.net"}))
        );

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn serve_ignores_disallowed_origins() {
        let (module, host_window) = window_pair("https://module.example.net", "https://portal.example.com");
        let mut host = echo_host();
        host.allow_origin("https://trusted.example.org");
        let host = Arc::new(host);

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Value>();
        struct Capture(mpsc::UnboundedSender<Value>);
        impl MessageTarget for Capture {
            fn post_message(
                &self,
                data: Value,
                _target_origin: &str,
            ) -> Result<(), crate::rpc::transport::TransportError> {
                let _ = self.0.send(data);
                Ok(())
            }
        }

        module
            .endpoint
            .post_message(RpcRequest::new("r1", "m1", "echo", None).to_message(), "*")
            .unwrap();
        drop(module);

        // Inbound closes after the single message, so serve returns on its own.
        host.serve(host_window.inbox, Arc::new(Capture(reply_tx)), CancellationToken::new())
            .await;
        assert!(reply_rx.try_recv().is_err());
    }
}
