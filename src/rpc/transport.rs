// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Window-messaging transport.
//!
//! [`MessageTarget`] is the `postMessage` seam: anything that can deliver a
//! JSON message to another window under a target-origin restriction. The
//! in-process [`window_pair`] implements it over tokio channels with the same
//! origin filtering a browser applies.

use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

/// Target origin meaning "deliver regardless of the receiver's origin".
pub const WILDCARD_ORIGIN: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("target window is closed")]
    Closed,
}

/// A message as seen by the receiving window.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    /// Origin of the sending window.
    pub origin: String,
    pub data: Value,
}

/// Something messages can be posted to.
pub trait MessageTarget: Send + Sync {
    /// Post `data`; it is only delivered if the receiver's origin matches
    /// `target_origin` (or `target_origin` is `"*"`).
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError>;
}

/// Where a client posts its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Configured by the module.
    Explicit(String),
    /// Origin of the embedding page's URL.
    Referrer(String),
    /// No restriction.
    Any,
}

impl TargetOrigin {
    /// Explicit option first, then the referrer's origin, then the wildcard.
    ///
    /// Referrers that do not parse, or whose origin is opaque (`about:`,
    /// `data:`), count as absent.
    pub fn resolve(explicit: Option<&str>, referrer: Option<&str>) -> Self {
        if let Some(origin) = explicit.filter(|o| !o.is_empty()) {
            return TargetOrigin::Explicit(origin.to_string());
        }

        referrer
            .and_then(|r| Url::parse(r).ok())
            .map(|url| url.origin())
            .filter(|origin| origin.is_tuple())
            .map(|origin| TargetOrigin::Referrer(origin.ascii_serialization()))
            .unwrap_or(TargetOrigin::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Explicit(origin) | TargetOrigin::Referrer(origin) => origin,
            TargetOrigin::Any => WILDCARD_ORIGIN,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD_ORIGIN
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Posting side of one window in a [`window_pair`].
#[derive(Debug, Clone)]
pub struct WindowEndpoint {
    origin: String,
    peer_origin: String,
    peer_inbox: mpsc::UnboundedSender<PostedMessage>,
}

impl WindowEndpoint {
    /// Origin of the window this endpoint posts from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin of the window this endpoint posts to.
    pub fn peer_origin(&self) -> &str {
        &self.peer_origin
    }
}

impl MessageTarget for WindowEndpoint {
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError> {
        if target_origin != WILDCARD_ORIGIN && target_origin != self.peer_origin {
            tracing::trace!(
                from = %self.origin,
                to = %self.peer_origin,
                target_origin,
                "Dropping message for mismatched target origin"
            );
            return Ok(());
        }

        self.peer_inbox
            .send(PostedMessage {
                origin: self.origin.clone(),
                data,
            })
            .map_err(|_| TransportError::Closed)
    }
}

/// One side of a [`window_pair`]: post through `endpoint`, receive on `inbox`.
#[derive(Debug)]
pub struct Window {
    pub endpoint: WindowEndpoint,
    pub inbox: mpsc::UnboundedReceiver<PostedMessage>,
}

/// Two connected in-process windows, e.g. a host page and an embedded module.
pub fn window_pair(origin_a: impl Into<String>, origin_b: impl Into<String>) -> (Window, Window) {
    let origin_a = origin_a.into();
    let origin_b = origin_b.into();
    let (to_a, inbox_a) = mpsc::unbounded_channel();
    let (to_b, inbox_b) = mpsc::unbounded_channel();

    let a = Window {
        endpoint: WindowEndpoint {
            origin: origin_a.clone(),
            peer_origin: origin_b.clone(),
            peer_inbox: to_b,
        },
        inbox: inbox_a,
    };
    let b = Window {
        endpoint: WindowEndpoint {
            origin: origin_b,
            peer_origin: origin_a,
            peer_inbox: to_a,
        },
        inbox: inbox_b,
    };
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOST: &str = "https://portal.example.com";
    const MODULE: &str = "https://module.example.net";

    #[test]
    fn resolve_prefers_explicit_origin() {
        let origin = TargetOrigin::resolve(Some(HOST), Some("https://other.example.org/page"));
        assert_eq!(origin, TargetOrigin::Explicit(HOST.to_string()));
    }

    #[test]
    fn resolve_uses_referrer_origin() {
        let origin = TargetOrigin::resolve(None, Some("https://portal.example.com:8443/m/1?x=y#z"));
        assert_eq!(
            origin,
            TargetOrigin::Referrer("https://portal.example.com:8443".to_string())
        );

        let default_port = TargetOrigin::resolve(Some(""), Some("https://portal.example.com:443/a"));
        assert_eq!(default_port.as_str(), HOST);
    }

    #[test]
    fn resolve_falls_back_to_wildcard() {
        for referrer in [None, Some(""), Some("not a url"), Some("about:blank")] {
            let origin = TargetOrigin::resolve(None, referrer);
            assert_eq!(origin, TargetOrigin::Any, "{referrer:?}");
            assert!(origin.is_wildcard());
            assert_eq!(origin.to_string(), "*");
        }
    }

    #[tokio::test]
    async fn delivers_to_matching_or_wildcard_origin() {
        let (host, mut module) = window_pair(HOST, MODULE);

        host.endpoint.post_message(json!(1), MODULE).unwrap();
        host.endpoint.post_message(json!(2), WILDCARD_ORIGIN).unwrap();

        let first = module.inbox.recv().await.unwrap();
        assert_eq!(first, PostedMessage { origin: HOST.to_string(), data: json!(1) });
        assert_eq!(module.inbox.recv().await.unwrap().data, json!(2));
    }

    #[tokio::test]
    async fn drops_mismatched_origin() {
        let (host, mut module) = window_pair(HOST, MODULE);

        host.endpoint.post_message(json!("lost"), "https://evil.example").unwrap();
        host.endpoint.post_message(json!("kept"), MODULE).unwrap();

        assert_eq!(module.inbox.recv().await.unwrap().data, json!("kept"));
        assert!(module.inbox.try_recv().is_err());
    }

    #[test]
    fn closed_peer_is_an_error() {
        let (host, module) = window_pair(HOST, MODULE);
        drop(module);
        assert!(matches!(
            host.endpoint.post_message(json!(1), MODULE),
            Err(TransportError::Closed)
        ));
    }
}
